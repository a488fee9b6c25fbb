use super::ConfigError;
use crate::catalog::ProcessTypeId;
use crate::orchestration::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_workers() -> usize {
    4
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_lease_seconds() -> u64 {
    30
}

fn default_batch_size() -> usize {
    16
}

fn default_max_steps_per_lease() -> u32 {
    64
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub database_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications_path: Option<PathBuf>,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default)]
    pub worker: WorkerSettings,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Process types served by this deployment; empty means all of them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub process_types: Vec<ProcessTypeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerSettings {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_lease_seconds")]
    pub lease_seconds: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_steps_per_lease")]
    pub max_steps_per_lease: u32,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            poll_interval_ms: default_poll_interval_ms(),
            lease_seconds: default_lease_seconds(),
            batch_size: default_batch_size(),
            max_steps_per_lease: default_max_steps_per_lease(),
        }
    }
}

impl Settings {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            log_path: None,
            notifications_path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            worker: WorkerSettings::default(),
            retry: RetryPolicy::default(),
            process_types: Vec::new(),
        }
    }

    /// Parses the file and resolves relative paths against its directory.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut settings: Settings =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        if let Some(base) = path.parent() {
            settings.resolve_relative_to(base);
        }
        Ok(settings)
    }

    pub fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |candidate: &Path| {
            if candidate.is_absolute() {
                candidate.to_path_buf()
            } else {
                base.join(candidate)
            }
        };
        self.database_path = resolve(&self.database_path);
        self.log_path = self.log_path.as_deref().map(resolve);
        self.notifications_path = self.notifications_path.as_deref().map(resolve);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Settings(
                "`database_path` must be non-empty".to_string(),
            ));
        }
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::Settings(
                "`busy_timeout_ms` must be >= 1".to_string(),
            ));
        }
        self.worker.validate().map_err(ConfigError::Settings)?;
        self.retry.validate().map_err(ConfigError::Settings)?;
        Ok(())
    }

    pub fn enabled_process_types(&self) -> Vec<ProcessTypeId> {
        if self.process_types.is_empty() {
            return ProcessTypeId::ALL.to_vec();
        }
        let mut enabled = self.process_types.clone();
        enabled.sort();
        enabled.dedup();
        enabled
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl WorkerSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("worker.workers must be >= 1".to_string());
        }
        if self.poll_interval_ms == 0 {
            return Err("worker.poll_interval_ms must be >= 1".to_string());
        }
        if self.lease_seconds == 0 {
            return Err("worker.lease_seconds must be >= 1".to_string());
        }
        if self.batch_size == 0 {
            return Err("worker.batch_size must be >= 1".to_string());
        }
        if self.max_steps_per_lease == 0 {
            return Err("worker.max_steps_per_lease must be >= 1".to_string());
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_defaults_apply_to_missing_section() {
        let settings: Settings =
            serde_yaml::from_str("database_path: /tmp/procflow.db\n").expect("parse settings");
        assert_eq!(settings.worker, WorkerSettings::default());
        assert_eq!(settings.retry.max_retriggers, 3);
        assert_eq!(settings.enabled_process_types(), ProcessTypeId::ALL.to_vec());
    }

    #[test]
    fn zero_lease_seconds_is_rejected() {
        let mut settings = Settings::new("/tmp/procflow.db");
        settings.worker.lease_seconds = 0;
        let err = settings.validate().expect_err("zero lease must fail");
        assert!(err.to_string().contains("worker.lease_seconds"));
    }
}
