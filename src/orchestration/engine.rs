use super::handlers::{HandlerRegistry, StepOutcome};
use super::notifications::{Notification, NotificationSink, NotificationType, NoopNotifications};
use super::operator::{OperatorActions, OperatorDecline};
use super::progress::{is_complete, is_declined};
use super::retry::{FailureKind, RetryDeclineController, RetryPolicy};
use super::scheduler::{
    duplicate_todo_steps, next_eligible_steps, plan_success, Dispatch, StepScheduler,
};
use super::transitions::TransitionPlan;
use super::EngineError;
use crate::catalog::{ProcessTypeId, StepTypeId};
use crate::config::Settings;
use crate::lease::{Lease, LeaseError, LeaseManager};
use crate::shared::{Clock, EventLog, ProcessId, SystemClock};
use crate::store::{ProcessStore, ProcessUpdate, StoreError};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub lease_seconds: u64,
    pub batch_size: usize,
    pub max_steps_per_lease: u32,
    pub process_types: Vec<ProcessTypeId>,
    pub retry: RetryPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lease_seconds: 30,
            batch_size: 16,
            max_steps_per_lease: 64,
            process_types: ProcessTypeId::ALL.to_vec(),
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineSettings {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            lease_seconds: settings.worker.lease_seconds,
            batch_size: settings.worker.batch_size,
            max_steps_per_lease: settings.worker.max_steps_per_lease,
            process_types: settings.enabled_process_types(),
            retry: settings.retry,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub candidates: usize,
    pub claimed: usize,
    pub lease_denied: usize,
    pub conflicts: usize,
    pub steps_executed: usize,
    pub steps_skipped: usize,
    pub duplicates_marked: usize,
    pub abandoned: usize,
    pub deferred: usize,
    pub completed: usize,
}

impl RunReport {
    pub fn merge(&mut self, other: RunReport) {
        self.candidates += other.candidates;
        self.claimed += other.claimed;
        self.lease_denied += other.lease_denied;
        self.conflicts += other.conflicts;
        self.steps_executed += other.steps_executed;
        self.steps_skipped += other.steps_skipped;
        self.duplicates_marked += other.duplicates_marked;
        self.abandoned += other.abandoned;
        self.deferred += other.deferred;
        self.completed += other.completed;
    }

    pub fn is_idle(&self) -> bool {
        self.claimed == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LeasedRunEnd {
    /// No TODO step left.
    Idle,
    /// A failure outcome was recorded; the retry waits for its `retry_at`.
    Yielded,
    /// The first TODO step is not due yet.
    Deferred,
    /// `max_steps_per_lease` reached.
    Budget,
    /// Version or expiry no longer ours.
    Lost,
}

/// Drives leased processes through their steps.
#[derive(Clone)]
pub struct ProcessEngine {
    store: ProcessStore,
    leases: LeaseManager,
    scheduler: StepScheduler,
    controller: RetryDeclineController,
    notifications: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    log: EventLog,
    settings: EngineSettings,
}

impl ProcessEngine {
    /// Fails when a step type of an enabled process type has no handler.
    pub fn new(
        store: ProcessStore,
        registry: Arc<HandlerRegistry>,
        settings: EngineSettings,
    ) -> Result<Self, EngineError> {
        registry.validate_coverage(&settings.process_types)?;
        Ok(Self {
            leases: LeaseManager::new(store.clone()),
            scheduler: StepScheduler::new(store.clone(), registry),
            controller: RetryDeclineController::new(settings.retry),
            store,
            notifications: Arc::new(NoopNotifications),
            clock: Arc::new(SystemClock),
            log: EventLog::disabled(),
            settings,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notifications(mut self, notifications: Arc<dyn NotificationSink>) -> Self {
        self.notifications = notifications;
        self
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.leases = LeaseManager::new(self.store.clone()).with_log(log.clone());
        self.scheduler = self.scheduler.with_log(log.clone());
        self.log = log;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.settings.retry = policy;
        self.controller = RetryDeclineController::new(policy);
        self
    }

    pub fn store(&self) -> &ProcessStore {
        &self.store
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// One poll: claim up to `batch_size` processes and run each of them.
    pub fn run_once(&self, worker_id: &str) -> Result<RunReport, EngineError> {
        let now = self.clock.now();
        let candidates = self.store.find_claimable_processes(
            now,
            &self.settings.process_types,
            self.settings.batch_size,
        )?;
        let mut report = RunReport {
            candidates: candidates.len(),
            ..RunReport::default()
        };
        for process_id in candidates {
            self.claim_and_run(process_id, worker_id, &mut report)?;
        }
        Ok(report)
    }

    /// Claims and runs a single process regardless of its type filter.
    pub fn execute_process(
        &self,
        process_id: ProcessId,
        worker_id: &str,
    ) -> Result<RunReport, EngineError> {
        let mut report = RunReport {
            candidates: 1,
            ..RunReport::default()
        };
        self.claim_and_run(process_id, worker_id, &mut report)?;
        Ok(report)
    }

    pub fn request_decline(
        &self,
        process_id: ProcessId,
        step_type: StepTypeId,
        holder: &str,
    ) -> Result<OperatorDecline, EngineError> {
        let operator = OperatorActions::new(
            self.store.clone(),
            self.leases.clone(),
            self.controller,
            self.settings.lease_seconds,
        );
        let decline = operator.request_decline(process_id, step_type, holder, self.clock.now())?;
        self.emit(&decline.notifications);
        Ok(decline)
    }

    fn claim_and_run(
        &self,
        process_id: ProcessId,
        worker_id: &str,
        report: &mut RunReport,
    ) -> Result<(), EngineError> {
        let lease = match self.leases.try_acquire(
            process_id,
            worker_id,
            self.settings.lease_seconds,
            self.clock.now(),
        ) {
            Ok(lease) => lease,
            Err(LeaseError::Denied { .. }) => {
                report.lease_denied += 1;
                return Ok(());
            }
            Err(LeaseError::ConcurrencyConflict { .. }) => {
                report.conflicts += 1;
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        report.claimed += 1;
        self.run_leased(lease, report)
    }

    fn run_leased(&self, mut lease: Lease, report: &mut RunReport) -> Result<(), EngineError> {
        let mut progressed = false;
        let outcome = self.step_loop(&mut lease, report, &mut progressed);

        match outcome {
            Ok(LeasedRunEnd::Lost) => {
                report.abandoned += 1;
                self.log.warn(
                    "lease.lost",
                    &[
                        ("processId", Value::from(lease.process_id.to_string())),
                        ("holder", Value::from(lease.holder.as_str())),
                    ],
                );
                Ok(())
            }
            Ok(_) => {
                match self.leases.release(&lease) {
                    Ok(_) => {}
                    Err(err) if err.is_contention() => {
                        report.abandoned += 1;
                        return Ok(());
                    }
                    Err(err) => return Err(err.into()),
                }
                if progressed {
                    self.announce_completion(lease.process_id, report)?;
                }
                Ok(())
            }
            Err(err) => {
                let _ = self.leases.release(&lease);
                self.log.error(
                    "worker.error",
                    &[
                        ("processId", Value::from(lease.process_id.to_string())),
                        ("holder", Value::from(lease.holder.as_str())),
                        ("error", Value::from(err.to_string())),
                    ],
                );
                Err(err)
            }
        }
    }

    fn step_loop(
        &self,
        lease: &mut Lease,
        report: &mut RunReport,
        progressed: &mut bool,
    ) -> Result<LeasedRunEnd, EngineError> {
        let mut iterations = 0u32;
        loop {
            if iterations >= self.settings.max_steps_per_lease {
                return Ok(LeasedRunEnd::Budget);
            }
            iterations += 1;

            let snapshot = self.store.read_process(lease.process_id)?;
            let now = self.clock.now();
            if snapshot.process.version != lease.version || lease.is_expired(now) {
                return Ok(LeasedRunEnd::Lost);
            }

            let duplicates = duplicate_todo_steps(&snapshot.steps);
            if !duplicates.is_empty() {
                let plan = TransitionPlan::mark_duplicates(&duplicates);
                match self.commit_plan(lease, &plan) {
                    Ok(()) => {}
                    Err(err) if err.is_lost_update() => return Ok(LeasedRunEnd::Lost),
                    Err(err) => return Err(err.into()),
                }
                report.duplicates_marked += duplicates.len();
                *progressed = true;
                continue;
            }

            let Some(step) = next_eligible_steps(&snapshot.process, &snapshot.steps)
                .first()
                .map(|step| (*step).clone())
            else {
                return Ok(LeasedRunEnd::Idle);
            };
            if !step.is_ready(now) {
                report.deferred += 1;
                return Ok(LeasedRunEnd::Deferred);
            }

            if lease.needs_renewal(now) {
                match self.leases.renew(lease, now) {
                    Ok(()) => {}
                    Err(err) if err.is_contention() => return Ok(LeasedRunEnd::Lost),
                    Err(err) => return Err(err.into()),
                }
            }

            let plan = match self.scheduler.dispatch(&step)? {
                Dispatch::Skipped { .. } => {
                    report.steps_skipped += 1;
                    continue;
                }
                Dispatch::Completed { outcome } => match outcome {
                    StepOutcome::Success(success) => {
                        plan_success(&step, &success, &snapshot.steps)?
                    }
                    StepOutcome::TransientFailure { message } => self.controller.plan_failure(
                        &step,
                        FailureKind::Transient,
                        &message,
                        &snapshot.steps,
                    ),
                    StepOutcome::BusinessDecline { message } => self.controller.plan_failure(
                        &step,
                        FailureKind::BusinessDecline,
                        &message,
                        &snapshot.steps,
                    ),
                },
            };

            match self.commit_plan(lease, &plan) {
                Ok(()) => {}
                Err(err) if err.is_lost_update() => return Ok(LeasedRunEnd::Lost),
                Err(err) => return Err(err.into()),
            }
            report.steps_executed += 1;
            *progressed = true;
            self.emit(&plan.notifications);
            if plan.yield_lease {
                return Ok(LeasedRunEnd::Yielded);
            }
        }
    }

    /// Commits the plan with the lease's expiry kept and a fresh version.
    /// Retry steps are stamped with their earliest run time.
    fn commit_plan(&self, lease: &mut Lease, plan: &TransitionPlan) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut transition = plan.transition.clone();
        if let Some(delay) = plan.retry_delay_secs {
            transition.appends_retry_at = Some(now.saturating_add(delay as i64));
        }
        let update = ProcessUpdate::new(lease.version, Some(lease.expires_at));
        self.store
            .commit_step_transition(lease.process_id, &update, &transition, now)?;
        lease.version = update.new_version;
        self.log.info(
            "step.committed",
            &[
                ("processId", Value::from(lease.process_id.to_string())),
                ("holder", Value::from(lease.holder.as_str())),
                ("version", Value::from(lease.version.to_string())),
                ("updates", Value::from(plan.transition.updates.len())),
                ("appends", Value::from(plan.transition.appends.len())),
            ],
        );
        Ok(())
    }

    fn announce_completion(
        &self,
        process_id: ProcessId,
        report: &mut RunReport,
    ) -> Result<(), EngineError> {
        let snapshot = self.store.read_process(process_id)?;
        if !is_complete(&snapshot.steps) {
            return Ok(());
        }
        report.completed += 1;
        let notification_type = if is_declined(&snapshot.steps) {
            NotificationType::ProcessDeclined
        } else {
            NotificationType::ProcessCompleted
        };
        self.emit(&[Notification::for_process(notification_type, process_id)]);
        Ok(())
    }

    fn emit(&self, notifications: &[Notification]) {
        for notification in notifications {
            self.notifications.emit(notification);
        }
    }
}

impl std::fmt::Debug for ProcessEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessEngine")
            .field("db_path", &self.store.db_path())
            .field("settings", &self.settings)
            .finish()
    }
}
