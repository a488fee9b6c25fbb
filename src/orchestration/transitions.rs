use super::notifications::Notification;
use crate::catalog::{StepStatus, StepTypeId};
use crate::shared::StepId;
use crate::store::{StepRecord, StepTransition};

/// Everything one step outcome changes: the step writes to commit atomically,
/// the notifications to emit once they are durable, and whether the worker
/// should hand the process back instead of continuing under its lease.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionPlan {
    pub transition: StepTransition,
    pub notifications: Vec<Notification>,
    pub yield_lease: bool,
    /// Appended steps wait this long after the commit before they may run.
    pub retry_delay_secs: Option<u64>,
}

impl TransitionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks every step in `step_ids` as DUPLICATE.
    pub fn mark_duplicates(step_ids: &[StepId]) -> Self {
        let mut plan = Self::new();
        for step_id in step_ids {
            plan.transition.update(
                *step_id,
                StepStatus::Duplicate,
                Some("superseded by an older pending step of the same type".to_string()),
            );
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.transition.is_empty() && self.notifications.is_empty()
    }

    pub fn update(&mut self, step_id: StepId, status: StepStatus, message: Option<String>) {
        self.transition.update(step_id, status, message);
    }

    pub fn append(&mut self, step_type: StepTypeId) {
        self.transition.append(step_type);
    }

    pub fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    fn touches(&self, step_id: StepId) -> bool {
        self.transition
            .updates
            .iter()
            .any(|update| update.step_id == step_id)
    }

    /// Closes the branch with `decline`: every other pending non-decline step
    /// is skipped and the decline step is appended unless one is already
    /// pending.
    pub fn close_branch(&mut self, decline: StepTypeId, steps: &[StepRecord]) {
        let pending_decline = steps.iter().any(|step| {
            step.status == StepStatus::Todo && step.step_type == decline && !self.touches(step.id)
        });
        for step in steps {
            if step.status != StepStatus::Todo || step.step_type.is_decline() {
                continue;
            }
            if self.touches(step.id) {
                continue;
            }
            self.update(
                step.id,
                StepStatus::Skipped,
                Some(format!("branch closed by {decline}")),
            );
        }
        if !pending_decline {
            self.append(decline);
        }
    }
}

/// True when a TODO step of `step_type` exists that this plan does not close.
pub(crate) fn has_pending(plan: &TransitionPlan, step_type: StepTypeId, steps: &[StepRecord]) -> bool {
    steps.iter().any(|step| {
        step.status == StepStatus::Todo && step.step_type == step_type && !plan.touches(step.id)
    })
}
