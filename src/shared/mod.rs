pub mod clock;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod serde_ext;

pub use clock::{format_timestamp, Clock, ManualClock, SystemClock};
pub use errors::RuntimeError;
pub use ids::{ProcessId, StepId, VersionToken};
pub use logging::EventLog;
