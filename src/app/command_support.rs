use crate::config::{load_settings, ConfigError, Settings};
use crate::orchestration::{JsonlNotificationSink, Notification, NotificationSink};
use crate::shared::EventLog;
use crate::store::{ProcessStore, StoreError};
use std::path::Path;

pub fn map_config_err(err: ConfigError) -> String {
    err.to_string()
}

pub fn map_store_err(err: StoreError) -> String {
    err.to_string()
}

pub fn load_cli_settings(config_path: &Path) -> Result<Settings, String> {
    load_settings(config_path).map_err(map_config_err)
}

pub fn open_store(settings: &Settings) -> Result<ProcessStore, String> {
    let store = ProcessStore::open(&settings.database_path)
        .map_err(map_store_err)?
        .with_busy_timeout(settings.busy_timeout());
    store.ensure_schema().map_err(map_store_err)?;
    Ok(store)
}

/// Opens the store and refuses to continue when the catalog tables drifted.
pub fn open_verified_store(settings: &Settings) -> Result<ProcessStore, String> {
    let store = open_store(settings)?;
    store.verify_catalog().map_err(|err| {
        format!("{err}\nrun `procflow setup` to provision the catalog tables")
    })?;
    Ok(store)
}

pub fn event_log(settings: &Settings) -> EventLog {
    match settings.log_path.as_ref() {
        Some(path) => EventLog::to_path(path),
        None => EventLog::disabled(),
    }
}

pub fn emit_notifications(settings: &Settings, notifications: &[Notification]) {
    let Some(path) = settings.notifications_path.as_ref() else {
        return;
    };
    let sink = JsonlNotificationSink::new(path);
    for notification in notifications {
        sink.emit(notification);
    }
}
