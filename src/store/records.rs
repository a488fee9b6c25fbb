use crate::catalog::{ProcessTypeId, StepStatus, StepTypeId};
use crate::shared::{ProcessId, StepId, VersionToken};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseState {
    Unleased,
    Leased { until: i64 },
    Expired { at: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRecord {
    pub id: ProcessId,
    pub process_type: ProcessTypeId,
    pub version: VersionToken,
    pub lock_expiry_date: Option<i64>,
    pub created_at: i64,
}

impl ProcessRecord {
    pub fn lease_state(&self, now: i64) -> LeaseState {
        match self.lock_expiry_date {
            None => LeaseState::Unleased,
            Some(until) if until > now => LeaseState::Leased { until },
            Some(at) => LeaseState::Expired { at },
        }
    }

    pub fn is_leased(&self, now: i64) -> bool {
        matches!(self.lease_state(now), LeaseState::Leased { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub id: StepId,
    pub process_id: ProcessId,
    pub step_type: StepTypeId,
    pub status: StepStatus,
    pub message: Option<String>,
    /// Earliest time a retry step may run; `None` means immediately.
    pub retry_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl StepRecord {
    pub fn is_ready(&self, now: i64) -> bool {
        self.retry_at.map_or(true, |retry_at| retry_at <= now)
    }
}

/// A process with its steps in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSnapshot {
    pub process: ProcessRecord,
    pub steps: Vec<StepRecord>,
}

impl ProcessSnapshot {
    pub fn step(&self, step_id: StepId) -> Option<&StepRecord> {
        self.steps.iter().find(|step| step.id == step_id)
    }
}

/// Version-guarded write of the process row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessUpdate {
    pub expected_version: VersionToken,
    pub lock_expiry_date: Option<i64>,
    pub new_version: VersionToken,
}

impl ProcessUpdate {
    pub fn new(expected_version: VersionToken, lock_expiry_date: Option<i64>) -> Self {
        Self {
            expected_version,
            lock_expiry_date,
            new_version: VersionToken::generate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepStatusUpdate {
    pub step_id: StepId,
    pub status: StepStatus,
    pub message: Option<String>,
}

/// Step writes committed together with one version bump of the owning process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepTransition {
    pub updates: Vec<StepStatusUpdate>,
    pub appends: Vec<StepTypeId>,
    /// Stamped on every appended step as its `retry_at`.
    pub appends_retry_at: Option<i64>,
}

impl StepTransition {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.appends.is_empty()
    }

    pub fn update(&mut self, step_id: StepId, status: StepStatus, message: Option<String>) {
        self.updates.push(StepStatusUpdate {
            step_id,
            status,
            message,
        });
    }

    pub fn append(&mut self, step_type: StepTypeId) {
        if !self.appends.contains(&step_type) {
            self.appends.push(step_type);
        }
    }
}
