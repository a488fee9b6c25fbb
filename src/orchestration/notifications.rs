use crate::shared::{ProcessId, StepId};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    StepDeclined,
    RetriesExhausted,
    ProcessCompleted,
    ProcessDeclined,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub notification_type: NotificationType,
    pub subject_ids: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Notification {
    pub fn for_process(notification_type: NotificationType, process_id: ProcessId) -> Self {
        Self {
            notification_type,
            subject_ids: vec![process_id.to_string()],
            message: None,
        }
    }

    pub fn for_step(
        notification_type: NotificationType,
        process_id: ProcessId,
        step_id: StepId,
        message: Option<String>,
    ) -> Self {
        Self {
            notification_type,
            subject_ids: vec![process_id.to_string(), step_id.to_string()],
            message,
        }
    }
}

/// Receiver of engine events. Delivery and routing belong to the sink.
pub trait NotificationSink: Send + Sync {
    fn emit(&self, notification: &Notification);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifications;

impl NotificationSink for NoopNotifications {
    fn emit(&self, _notification: &Notification) {}
}

/// Appends one JSON document per notification to a file.
#[derive(Debug, Clone)]
pub struct JsonlNotificationSink {
    path: PathBuf,
}

impl JsonlNotificationSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NotificationSink for JsonlNotificationSink {
    fn emit(&self, notification: &Notification) {
        let Ok(line) = serde_json::to_string(notification) else {
            return;
        };
        if let Some(parent) = self.path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let _ = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "{line}"));
    }
}

/// Keeps every notification in memory, for embedding applications that poll.
#[derive(Debug, Default)]
pub struct RecordingNotifications {
    events: Mutex<Vec<Notification>>,
}

impl RecordingNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(
            &mut *self
                .events
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}

impl NotificationSink for RecordingNotifications {
    fn emit(&self, notification: &Notification) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(notification.clone());
    }
}
