use crate::catalog::StepStatus;
use crate::store::StepRecord;
use serde::Serialize;

/// A process is complete once none of its steps is TODO.
pub fn is_complete(steps: &[StepRecord]) -> bool {
    steps.iter().all(|step| step.status != StepStatus::Todo)
}

/// A process is declined once one of its decline steps has run.
pub fn is_declined(steps: &[StepRecord]) -> bool {
    steps
        .iter()
        .any(|step| step.step_type.is_decline() && step.status == StepStatus::Done)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessProgress {
    pub todo: usize,
    pub done: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duplicate: usize,
    pub complete: bool,
    pub declined: bool,
}

impl ProcessProgress {
    pub fn from_steps(steps: &[StepRecord]) -> Self {
        let mut progress = Self {
            complete: is_complete(steps),
            declined: is_declined(steps),
            ..Self::default()
        };
        for step in steps {
            match step.status {
                StepStatus::Todo => progress.todo += 1,
                StepStatus::Done => progress.done += 1,
                StepStatus::Failed => progress.failed += 1,
                StepStatus::Skipped => progress.skipped += 1,
                StepStatus::Duplicate => progress.duplicate += 1,
            }
        }
        progress
    }

    pub fn summary(&self) -> &'static str {
        if self.declined {
            "declined"
        } else if self.complete {
            "complete"
        } else {
            "pending"
        }
    }
}
