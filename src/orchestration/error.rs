use crate::catalog::{ProcessTypeId, StepTypeId};
use crate::lease::LeaseError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Lease(#[from] LeaseError),
    #[error("no handler registered for step type `{step_type}` (step `{step_id}`)")]
    UnknownStepType {
        step_type: StepTypeId,
        step_id: String,
    },
    #[error("step handlers missing for: {step_types}")]
    MissingHandlers { step_types: String },
    #[error("step type `{step_type}` has no decline counterpart")]
    NoDeclinePath { step_type: StepTypeId },
    #[error("step type `{step_type}` does not belong to process type `{process_type}`")]
    StepTypeMismatch {
        step_type: StepTypeId,
        process_type: ProcessTypeId,
    },
}

impl EngineError {
    /// Configuration faults must reach an operator; everything else is
    /// resolved inside the claim loop.
    pub fn is_configuration_error(&self) -> bool {
        match self {
            EngineError::UnknownStepType { .. } | EngineError::MissingHandlers { .. } => true,
            EngineError::Store(err) | EngineError::Lease(LeaseError::Store(err)) => {
                err.is_catalog_error()
            }
            _ => false,
        }
    }
}
