//! Step execution on top of the store and lease layers: handler dispatch,
//! retry and decline planning, notifications and the claim loop.

pub mod engine;
pub mod error;
pub mod handlers;
pub mod notifications;
pub mod operator;
pub mod progress;
pub mod retry;
pub mod scheduler;
pub mod transitions;

pub use engine::{EngineSettings, ProcessEngine, RunReport};
pub use error::EngineError;
pub use handlers::{HandlerRegistry, StepHandler, StepOutcome, StepSuccess};
pub use notifications::{
    JsonlNotificationSink, NoopNotifications, Notification, NotificationSink, NotificationType,
    RecordingNotifications,
};
pub use operator::{OperatorActions, OperatorDecline};
pub use progress::{is_complete, is_declined, ProcessProgress};
pub use retry::{
    FailureKind, RetryDeclineController, RetryPolicy, DEFAULT_BACKOFF_BASE_SECS,
    DEFAULT_BACKOFF_MAX_SECS, DEFAULT_MAX_RETRIGGERS,
};
pub use scheduler::{duplicate_todo_steps, next_eligible_steps, plan_success, Dispatch, StepScheduler};
pub use transitions::TransitionPlan;
