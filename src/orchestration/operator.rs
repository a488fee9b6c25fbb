use super::notifications::Notification;
use super::retry::RetryDeclineController;
use super::EngineError;
use crate::catalog::StepTypeId;
use crate::lease::{Lease, LeaseManager};
use crate::shared::ProcessId;
use crate::store::{ProcessStore, ProcessUpdate, StepTransition};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorDecline {
    pub process_id: ProcessId,
    pub decline_step: StepTypeId,
    /// False when a pending decline step already closed the branch.
    pub appended: bool,
    pub notifications: Vec<Notification>,
}

/// Operator-initiated changes. They take a lease like any worker, so they are
/// refused while a worker is running the process.
#[derive(Debug, Clone)]
pub struct OperatorActions {
    store: ProcessStore,
    leases: LeaseManager,
    controller: RetryDeclineController,
    lease_seconds: u64,
}

impl OperatorActions {
    pub fn new(
        store: ProcessStore,
        leases: LeaseManager,
        controller: RetryDeclineController,
        lease_seconds: u64,
    ) -> Self {
        Self {
            store,
            leases,
            controller,
            lease_seconds,
        }
    }

    pub fn request_decline(
        &self,
        process_id: ProcessId,
        step_type: StepTypeId,
        holder: &str,
        now: i64,
    ) -> Result<OperatorDecline, EngineError> {
        let mut lease = self
            .leases
            .try_acquire(process_id, holder, self.lease_seconds, now)?;
        match self.decline_under_lease(&mut lease, step_type, now) {
            Ok(decline) => {
                self.leases.release(&lease)?;
                Ok(decline)
            }
            Err(err) => {
                let _ = self.leases.release(&lease);
                Err(err)
            }
        }
    }

    fn decline_under_lease(
        &self,
        lease: &mut Lease,
        step_type: StepTypeId,
        now: i64,
    ) -> Result<OperatorDecline, EngineError> {
        let snapshot = self.store.read_process(lease.process_id)?;
        let plan = self.controller.plan_operator_decline(
            &snapshot.process,
            step_type,
            &lease.holder,
            &snapshot.steps,
        )?;
        let decline_step = plan
            .transition
            .appends
            .first()
            .copied()
            .or_else(|| step_type.decline())
            .unwrap_or(step_type);
        let appended = !plan.transition.appends.is_empty();

        if plan.transition != StepTransition::default() {
            let update = ProcessUpdate::new(lease.version, Some(lease.expires_at));
            self.store
                .commit_step_transition(lease.process_id, &update, &plan.transition, now)?;
            lease.version = update.new_version;
        }

        Ok(OperatorDecline {
            process_id: lease.process_id,
            decline_step,
            appended,
            notifications: if appended {
                plan.notifications
            } else {
                Vec::new()
            },
        })
    }
}
