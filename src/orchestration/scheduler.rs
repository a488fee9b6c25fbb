use super::handlers::{HandlerRegistry, StepOutcome, StepSuccess};
use super::transitions::{has_pending, TransitionPlan};
use super::EngineError;
use crate::catalog::{StepStatus, StepTypeId};
use crate::shared::{EventLog, StepId};
use crate::store::{ProcessRecord, ProcessStore, StepRecord};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

/// All TODO steps of `process`, in creation order.
pub fn next_eligible_steps<'a>(
    process: &ProcessRecord,
    steps: &'a [StepRecord],
) -> Vec<&'a StepRecord> {
    steps
        .iter()
        .filter(|step| step.process_id == process.id && step.status == StepStatus::Todo)
        .collect()
}

/// TODO steps that repeat an older TODO step of the same type.
pub fn duplicate_todo_steps(steps: &[StepRecord]) -> Vec<StepId> {
    let mut seen = BTreeSet::<StepTypeId>::new();
    let mut duplicates = Vec::new();
    for step in steps.iter().filter(|step| step.status == StepStatus::Todo) {
        if !seen.insert(step.step_type) {
            duplicates.push(step.id);
        }
    }
    duplicates
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The step left TODO before its handler could run.
    Skipped { step_id: StepId, status: StepStatus },
    Completed { outcome: StepOutcome },
}

#[derive(Debug, Clone)]
pub struct StepScheduler {
    store: ProcessStore,
    registry: Arc<HandlerRegistry>,
    log: EventLog,
}

impl StepScheduler {
    pub fn new(store: ProcessStore, registry: Arc<HandlerRegistry>) -> Self {
        Self {
            store,
            registry,
            log: EventLog::disabled(),
        }
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = log;
        self
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Runs the handler for `step` unless the persisted step is no longer
    /// TODO. The handler only ever sees identifiers.
    pub fn dispatch(&self, step: &StepRecord) -> Result<Dispatch, EngineError> {
        let persisted = self.store.load_step(step.id)?;
        if persisted.status != StepStatus::Todo {
            self.log.info(
                "step.skipped",
                &[
                    ("processId", Value::from(step.process_id.to_string())),
                    ("stepId", Value::from(step.id.to_string())),
                    ("status", Value::from(persisted.status.label())),
                ],
            );
            return Ok(Dispatch::Skipped {
                step_id: step.id,
                status: persisted.status,
            });
        }

        let handler = self
            .registry
            .resolve(persisted.step_type)
            .ok_or_else(|| EngineError::UnknownStepType {
                step_type: persisted.step_type,
                step_id: step.id.to_string(),
            })?;

        self.log.info(
            "step.dispatched",
            &[
                ("processId", Value::from(step.process_id.to_string())),
                ("stepId", Value::from(step.id.to_string())),
                ("stepType", Value::from(persisted.step_type.label())),
            ],
        );
        let outcome = handler.handle(persisted.process_id, persisted.id);
        Ok(Dispatch::Completed { outcome })
    }
}

/// DONE for the step, SKIPPED for what the handler asked to skip, and the
/// declared plus requested follow-ons appended unless already pending.
///
/// Requested step types must belong to the step's own process type.
pub fn plan_success(
    step: &StepRecord,
    success: &StepSuccess,
    steps: &[StepRecord],
) -> Result<TransitionPlan, EngineError> {
    let process_type = step.step_type.process_type();
    if let Some(foreign) = success
        .schedule
        .iter()
        .chain(success.skip.iter())
        .find(|step_type| step_type.process_type() != process_type)
    {
        return Err(EngineError::StepTypeMismatch {
            step_type: *foreign,
            process_type,
        });
    }

    let mut plan = TransitionPlan::new();
    plan.update(step.id, StepStatus::Done, success.message.clone());

    for other in steps {
        if other.id != step.id
            && other.status == StepStatus::Todo
            && success.skip.contains(&other.step_type)
        {
            plan.update(
                other.id,
                StepStatus::Skipped,
                Some(format!("skipped by {}", step.step_type)),
            );
        }
    }

    let follow_ons = step
        .step_type
        .follow_on()
        .iter()
        .chain(success.schedule.iter())
        .copied()
        .collect::<Vec<_>>();
    for step_type in follow_ons {
        if success.skip.contains(&step_type) || has_pending(&plan, step_type, steps) {
            continue;
        }
        plan.append(step_type);
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ProcessTypeId;
    use crate::shared::{ProcessId, VersionToken};

    fn process() -> ProcessRecord {
        ProcessRecord {
            id: ProcessId::generate(),
            process_type: ProcessTypeId::ApplicationChecklist,
            version: VersionToken::generate(),
            lock_expiry_date: None,
            created_at: 0,
        }
    }

    fn step(process: &ProcessRecord, step_type: StepTypeId, status: StepStatus) -> StepRecord {
        StepRecord {
            id: StepId::generate(),
            process_id: process.id,
            step_type,
            status,
            message: None,
            retry_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn eligible_steps_keep_creation_order() {
        let process = process();
        let steps = vec![
            step(&process, StepTypeId::VerifyRegistration, StepStatus::Done),
            step(&process, StepTypeId::StartClearingHouse, StepStatus::Todo),
            step(&process, StepTypeId::CreateIdentityWallet, StepStatus::Todo),
        ];
        let eligible = next_eligible_steps(&process, &steps);
        assert_eq!(eligible.len(), 2);
        assert_eq!(eligible[0].step_type, StepTypeId::StartClearingHouse);
        assert_eq!(eligible[1].step_type, StepTypeId::CreateIdentityWallet);
    }

    #[test]
    fn later_todo_of_same_type_is_duplicate() {
        let process = process();
        let steps = vec![
            step(&process, StepTypeId::StartClearingHouse, StepStatus::Todo),
            step(&process, StepTypeId::StartClearingHouse, StepStatus::Done),
            step(&process, StepTypeId::StartClearingHouse, StepStatus::Todo),
        ];
        assert_eq!(duplicate_todo_steps(&steps), vec![steps[2].id]);
    }

    #[test]
    fn success_appends_follow_on_unless_pending() {
        let process = process();
        let current = step(&process, StepTypeId::VerifyRegistration, StepStatus::Todo);
        let plan = plan_success(&current, &StepSuccess::default(), &[current.clone()])
            .expect("plan success");
        assert_eq!(
            plan.transition.appends,
            vec![StepTypeId::CreateBusinessPartnerNumberPush]
        );

        let pending = step(
            &process,
            StepTypeId::CreateBusinessPartnerNumberPush,
            StepStatus::Todo,
        );
        let plan = plan_success(&current, &StepSuccess::default(), &[current.clone(), pending])
            .expect("plan success");
        assert!(plan.transition.appends.is_empty());
    }

    #[test]
    fn success_skips_requested_step_types() {
        let process = process();
        let current = step(&process, StepTypeId::TriggerProvider, StepStatus::Todo);
        let callback = step(
            &process,
            StepTypeId::TriggerProviderCallback,
            StepStatus::Todo,
        );
        let success = StepSuccess {
            schedule: Vec::new(),
            skip: vec![StepTypeId::TriggerProviderCallback, StepTypeId::StartAutosetup],
            message: None,
        };
        let plan = plan_success(&current, &success, &[current.clone(), callback.clone()])
            .expect("plan success");

        assert!(plan.transition.appends.is_empty());
        assert_eq!(plan.transition.updates.len(), 2);
        assert_eq!(plan.transition.updates[1].step_id, callback.id);
        assert_eq!(plan.transition.updates[1].status, StepStatus::Skipped);
    }

    #[test]
    fn success_rejects_step_types_of_another_process_type() {
        let process = process();
        let current = step(&process, StepTypeId::VerifyRegistration, StepStatus::Todo);
        for success in [
            StepSuccess {
                schedule: vec![StepTypeId::VerifyCertificate],
                ..StepSuccess::default()
            },
            StepSuccess {
                skip: vec![StepTypeId::TriggerProvider],
                ..StepSuccess::default()
            },
        ] {
            let err = plan_success(&current, &success, &[current.clone()])
                .expect_err("foreign step type");
            assert!(matches!(
                err,
                EngineError::StepTypeMismatch {
                    process_type: ProcessTypeId::ApplicationChecklist,
                    ..
                }
            ));
        }
    }
}
