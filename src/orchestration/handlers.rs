use super::EngineError;
use crate::catalog::{ProcessTypeId, StepTypeId};
use crate::shared::{ProcessId, StepId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Result of running one step's business logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success(StepSuccess),
    /// A downstream dependency misbehaved; the action may be re-attempted.
    TransientFailure { message: String },
    /// A business rule rejected the work; the branch must be declined.
    BusinessDecline { message: String },
}

impl StepOutcome {
    pub fn success() -> Self {
        StepOutcome::Success(StepSuccess::default())
    }

    pub fn transient(message: impl Into<String>) -> Self {
        StepOutcome::TransientFailure {
            message: message.into(),
        }
    }

    pub fn decline(message: impl Into<String>) -> Self {
        StepOutcome::BusinessDecline {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepSuccess {
    /// Extra steps to append beyond the step type's declared follow-ons.
    pub schedule: Vec<StepTypeId>,
    /// Step types whose pending instances become SKIPPED.
    pub skip: Vec<StepTypeId>,
    pub message: Option<String>,
}

/// Business logic for one step type. Handlers only receive identity and must
/// look up whatever state they need themselves.
pub trait StepHandler: Send + Sync {
    fn handle(&self, process_id: ProcessId, step_id: StepId) -> StepOutcome;
}

impl<F> StepHandler for F
where
    F: Fn(ProcessId, StepId) -> StepOutcome + Send + Sync,
{
    fn handle(&self, process_id: ProcessId, step_id: StepId) -> StepOutcome {
        self(process_id, step_id)
    }
}

#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: BTreeMap<StepTypeId, Arc<dyn StepHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, step_type: StepTypeId, handler: H) -> &mut Self
    where
        H: StepHandler + 'static,
    {
        self.handlers.insert(step_type, Arc::new(handler));
        self
    }

    /// Registers one handler for an action and its `RETRIGGER_*` counterpart.
    pub fn register_action<H>(&mut self, action: StepTypeId, handler: H) -> &mut Self
    where
        H: StepHandler + 'static,
    {
        let handler: Arc<dyn StepHandler> = Arc::new(handler);
        if let Some(retrigger) = action.retrigger() {
            self.handlers.insert(retrigger, Arc::clone(&handler));
        }
        self.handlers.insert(action, handler);
        self
    }

    pub fn resolve(&self, step_type: StepTypeId) -> Option<Arc<dyn StepHandler>> {
        self.handlers.get(&step_type).cloned()
    }

    pub fn contains(&self, step_type: StepTypeId) -> bool {
        self.handlers.contains_key(&step_type)
    }

    pub fn registered(&self) -> Vec<StepTypeId> {
        self.handlers.keys().copied().collect()
    }

    pub fn missing_for(&self, process_types: &[ProcessTypeId]) -> Vec<StepTypeId> {
        let mut missing = process_types
            .iter()
            .flat_map(|process_type| process_type.step_types())
            .filter(|step_type| !self.contains(*step_type))
            .collect::<Vec<_>>();
        missing.sort();
        missing.dedup();
        missing
    }

    pub fn validate_coverage(&self, process_types: &[ProcessTypeId]) -> Result<(), EngineError> {
        let missing = self.missing_for(process_types);
        if missing.is_empty() {
            return Ok(());
        }
        Err(EngineError::MissingHandlers {
            step_types: missing
                .iter()
                .map(|step_type| step_type.label())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("step_types", &self.registered())
            .finish()
    }
}
