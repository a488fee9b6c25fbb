pub mod error;
pub mod records;
pub mod repository;
pub mod schema;

pub use error::StoreError;
pub use records::{
    LeaseState, ProcessRecord, ProcessSnapshot, ProcessUpdate, StepRecord, StepStatusUpdate,
    StepTransition,
};
pub use repository::ProcessStore;
