//! Time-bounded exclusive claims on processes.
//!
//! A lease is nothing more than a future `lock_expiry_date` stamped through a
//! version-guarded update, so acquiring, renewing and releasing are all
//! optimistic-concurrency operations against the process row. A worker that
//! dies simply lets its lease run out.

use crate::shared::{EventLog, ProcessId, VersionToken};
use crate::store::{LeaseState, ProcessStore, ProcessUpdate, StoreError};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub process_id: ProcessId,
    pub holder: String,
    pub version: VersionToken,
    pub expires_at: i64,
    pub duration_secs: u64,
}

impl Lease {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    pub fn remaining_secs(&self, now: i64) -> i64 {
        self.expires_at.saturating_sub(now)
    }

    /// True once less than half of the lease window is left.
    pub fn needs_renewal(&self, now: i64) -> bool {
        self.remaining_secs(now).saturating_mul(2) < self.duration_secs as i64
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LeaseError {
    #[error("process `{process_id}` is leased until {expires_at}")]
    Denied { process_id: String, expires_at: i64 },
    #[error("process `{process_id}` changed while claiming it; re-read before retrying")]
    ConcurrencyConflict { process_id: String },
    #[error("lease on process `{process_id}` expired at {expired_at}")]
    Expired { process_id: String, expired_at: i64 },
    #[error("lease duration must be at least one second")]
    InvalidDuration,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LeaseError {
    /// Losing a race for a process is routine; callers move on to another one.
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            LeaseError::Denied { .. }
                | LeaseError::ConcurrencyConflict { .. }
                | LeaseError::Expired { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct LeaseManager {
    store: ProcessStore,
    log: EventLog,
}

impl LeaseManager {
    pub fn new(store: ProcessStore) -> Self {
        Self {
            store,
            log: EventLog::disabled(),
        }
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = log;
        self
    }

    pub fn try_acquire(
        &self,
        process_id: ProcessId,
        holder: &str,
        duration_secs: u64,
        now: i64,
    ) -> Result<Lease, LeaseError> {
        if duration_secs == 0 {
            return Err(LeaseError::InvalidDuration);
        }
        let snapshot = self.store.read_process(process_id)?;
        if let LeaseState::Leased { until } = snapshot.process.lease_state(now) {
            self.log.info(
                "lease.denied",
                &[
                    ("processId", Value::from(process_id.to_string())),
                    ("holder", Value::from(holder)),
                    ("expiresAt", Value::from(until)),
                ],
            );
            return Err(LeaseError::Denied {
                process_id: process_id.to_string(),
                expires_at: until,
            });
        }

        let expires_at = now.saturating_add(duration_secs as i64);
        let update = ProcessUpdate::new(snapshot.process.version, Some(expires_at));
        self.store
            .commit_process_update(process_id, &update)
            .map_err(|err| conflict_or_store(process_id, err))?;

        self.log.info(
            "lease.acquired",
            &[
                ("processId", Value::from(process_id.to_string())),
                ("holder", Value::from(holder)),
                ("expiresAt", Value::from(expires_at)),
                ("version", Value::from(update.new_version.to_string())),
            ],
        );
        Ok(Lease {
            process_id,
            holder: holder.to_string(),
            version: update.new_version,
            expires_at,
            duration_secs,
        })
    }

    /// Extends a still-valid lease by its original duration from `now`.
    pub fn renew(&self, lease: &mut Lease, now: i64) -> Result<(), LeaseError> {
        if lease.is_expired(now) {
            return Err(LeaseError::Expired {
                process_id: lease.process_id.to_string(),
                expired_at: lease.expires_at,
            });
        }
        let expires_at = now.saturating_add(lease.duration_secs as i64);
        let update = ProcessUpdate::new(lease.version, Some(expires_at));
        self.store
            .commit_process_update(lease.process_id, &update)
            .map_err(|err| conflict_or_store(lease.process_id, err))?;
        lease.version = update.new_version;
        lease.expires_at = expires_at;
        self.log.info(
            "lease.renewed",
            &[
                ("processId", Value::from(lease.process_id.to_string())),
                ("holder", Value::from(lease.holder.as_str())),
                ("expiresAt", Value::from(expires_at)),
            ],
        );
        Ok(())
    }

    pub fn release(&self, lease: &Lease) -> Result<VersionToken, LeaseError> {
        let version = self.release_lease(lease.process_id, lease.version)?;
        self.log.info(
            "process.released",
            &[
                ("processId", Value::from(lease.process_id.to_string())),
                ("holder", Value::from(lease.holder.as_str())),
                ("version", Value::from(version.to_string())),
            ],
        );
        Ok(version)
    }

    /// Clears `lock_expiry_date` and stamps a fresh version.
    pub fn release_lease(
        &self,
        process_id: ProcessId,
        expected_version: VersionToken,
    ) -> Result<VersionToken, LeaseError> {
        let update = ProcessUpdate::new(expected_version, None);
        self.store
            .commit_process_update(process_id, &update)
            .map_err(|err| conflict_or_store(process_id, err))?;
        Ok(update.new_version)
    }
}

fn conflict_or_store(process_id: ProcessId, err: StoreError) -> LeaseError {
    match err {
        StoreError::ConcurrencyConflict { .. } => LeaseError::ConcurrencyConflict {
            process_id: process_id.to_string(),
        },
        other => LeaseError::Store(other),
    }
}
