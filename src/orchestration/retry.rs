use super::notifications::{Notification, NotificationType};
use super::transitions::TransitionPlan;
use super::EngineError;
use crate::catalog::{StepStatus, StepTypeId};
use crate::store::{ProcessRecord, StepRecord};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_RETRIGGERS: u32 = 3;
pub const DEFAULT_BACKOFF_BASE_SECS: u64 = 5;
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Failed attempts of one action after which transient failures stop
    /// producing retrigger steps.
    pub max_retriggers: u32,
    /// Delay before the first retry; doubles with every further attempt.
    pub backoff_base_secs: u64,
    pub backoff_max_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retriggers: DEFAULT_MAX_RETRIGGERS,
            backoff_base_secs: DEFAULT_BACKOFF_BASE_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
        }
    }
}

impl RetryPolicy {
    /// Seconds to wait before retrying after the `attempt`-th failure (1-based).
    pub fn retry_delay_secs(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1);
        self.backoff_base_secs
            .saturating_mul(2u64.saturating_pow(exponent))
            .min(self.backoff_max_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.backoff_max_secs < self.backoff_base_secs {
            return Err("retry.backoff_max_secs must be >= retry.backoff_base_secs".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transient,
    BusinessDecline,
}

/// Turns failed steps into new steps. Failed instances are never touched
/// again; recovery always appends.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryDeclineController {
    policy: RetryPolicy,
}

impl RetryDeclineController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// FAILED instances of `action`, counting both `X` and `RETRIGGER_X`.
    pub fn failed_attempts(action: StepTypeId, steps: &[StepRecord]) -> u32 {
        steps
            .iter()
            .filter(|step| step.status == StepStatus::Failed && step.step_type.action() == action)
            .count() as u32
    }

    pub fn plan_failure(
        &self,
        step: &StepRecord,
        kind: FailureKind,
        message: &str,
        steps: &[StepRecord],
    ) -> TransitionPlan {
        let mut plan = TransitionPlan::new();
        plan.yield_lease = true;

        match kind {
            FailureKind::Transient => {
                let attempts = Self::failed_attempts(step.step_type.action(), steps) + 1;
                match retry_target(step.step_type) {
                    Some(target) if attempts <= self.policy.max_retriggers => {
                        plan.update(step.id, StepStatus::Failed, Some(message.to_string()));
                        plan.append(target);
                        plan.retry_delay_secs = Some(self.policy.retry_delay_secs(attempts));
                    }
                    target => {
                        let reason = if target.is_some() {
                            format!("retries exhausted after {attempts} attempts: {message}")
                        } else {
                            format!("no retrigger available: {message}")
                        };
                        plan.update(step.id, StepStatus::Failed, Some(reason.clone()));
                        plan.notify(Notification::for_step(
                            NotificationType::RetriesExhausted,
                            step.process_id,
                            step.id,
                            Some(reason),
                        ));
                        if let Some(decline) = step.step_type.decline() {
                            plan.close_branch(decline, steps);
                        }
                    }
                }
            }
            FailureKind::BusinessDecline => {
                plan.update(step.id, StepStatus::Failed, Some(message.to_string()));
                plan.notify(Notification::for_step(
                    NotificationType::StepDeclined,
                    step.process_id,
                    step.id,
                    Some(message.to_string()),
                ));
                if let Some(decline) = step.step_type.decline() {
                    plan.close_branch(decline, steps);
                }
            }
        }
        plan
    }

    /// Appends the decline step for `step_type`'s branch on operator request.
    pub fn plan_operator_decline(
        &self,
        process: &ProcessRecord,
        step_type: StepTypeId,
        holder: &str,
        steps: &[StepRecord],
    ) -> Result<TransitionPlan, EngineError> {
        if step_type.process_type() != process.process_type {
            return Err(EngineError::StepTypeMismatch {
                step_type,
                process_type: process.process_type,
            });
        }
        let decline = if step_type.is_decline() {
            step_type
        } else {
            step_type
                .decline()
                .ok_or(EngineError::NoDeclinePath { step_type })?
        };

        let mut plan = TransitionPlan::new();
        plan.close_branch(decline, steps);
        plan.notify(Notification {
            notification_type: NotificationType::StepDeclined,
            subject_ids: vec![process.id.to_string()],
            message: Some(format!("{step_type} declined by {holder}")),
        });
        Ok(plan)
    }
}

/// Decline steps are retried as fresh decline steps; actions use their
/// `RETRIGGER_*` counterpart.
fn retry_target(step_type: StepTypeId) -> Option<StepTypeId> {
    if step_type.is_decline() {
        Some(step_type)
    } else {
        step_type.retrigger()
    }
}
