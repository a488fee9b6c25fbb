use crate::catalog::StepStatus;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite open failed at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to create process database parent {path}: {source}")]
    CreateParent {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sqlite statement failed: {source}")]
    Sql {
        #[source]
        source: rusqlite::Error,
    },
    #[error("process `{process_id}` was modified concurrently: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        process_id: String,
        expected: String,
        actual: String,
    },
    #[error("lease on process `{process_id}` is not held (lock expiry {lock_expiry_date:?})")]
    LeaseNotHeld {
        process_id: String,
        lock_expiry_date: Option<i64>,
    },
    #[error("process `{process_id}` not found")]
    ProcessNotFound { process_id: String },
    #[error("step `{step_id}` not found")]
    StepNotFound { step_id: String },
    #[error("step `{step_id}` does not belong to process `{process_id}`")]
    StepOwnership { step_id: String, process_id: String },
    #[error("step `{step_id}` cannot move from {from} to {to}")]
    InvalidStepTransition {
        step_id: String,
        from: StepStatus,
        to: StepStatus,
    },
    #[error("catalog integrity violated: {entity} `{value}` has no catalog entry")]
    CatalogIntegrity { entity: &'static str, value: String },
    #[error("catalog table `{table}` disagrees with the compiled catalog: {reason}")]
    CatalogMismatch { table: &'static str, reason: String },
    #[error("invalid {entity} `{value}` in database: {reason}")]
    InvalidId {
        entity: &'static str,
        value: String,
        reason: String,
    },
}

impl StoreError {
    /// Errors meaning another writer got there first; recoverable by re-reading.
    pub fn is_lost_update(&self) -> bool {
        matches!(
            self,
            StoreError::ConcurrencyConflict { .. }
                | StoreError::LeaseNotHeld { .. }
                | StoreError::InvalidStepTransition { .. }
        )
    }

    pub fn is_catalog_error(&self) -> bool {
        matches!(
            self,
            StoreError::CatalogIntegrity { .. } | StoreError::CatalogMismatch { .. }
        )
    }
}

pub(crate) fn sql_err(source: rusqlite::Error) -> StoreError {
    StoreError::Sql { source }
}
