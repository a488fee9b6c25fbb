use procflow::catalog::{ProcessTypeId, StepTypeId};
use procflow::lease::{Lease, LeaseError, LeaseManager};
use procflow::shared::{EventLog, ProcessId};
use procflow::store::ProcessStore;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;

fn open_store(root: &Path) -> ProcessStore {
    let store = ProcessStore::open(&root.join("procflow.db")).expect("open store");
    store.ensure_schema().expect("ensure schema");
    store.bootstrap_catalog().expect("bootstrap catalog");
    store
}

fn create_sync_process(store: &ProcessStore) -> ProcessId {
    store
        .create_process_with_steps(
            ProcessTypeId::ServiceAccountSync,
            &[StepTypeId::SynchronizeServiceAccounts],
            1,
        )
        .expect("create process")
        .process
        .id
}

#[test]
fn lease_manager_module_denies_a_second_holder_until_expiry() {
    let temp = tempdir().expect("tempdir");
    let store = open_store(temp.path());
    let leases = LeaseManager::new(store.clone());
    let process_id = create_sync_process(&store);
    let v0 = store.read_process(process_id).expect("read").process.version;

    let lease = leases
        .try_acquire(process_id, "worker-a", 30, 1_000)
        .expect("acquire");
    assert_eq!(lease.expires_at, 1_030);
    assert_ne!(lease.version, v0);
    let stored = store.read_process(process_id).expect("read").process;
    assert_eq!(stored.version, lease.version);
    assert_eq!(stored.lock_expiry_date, Some(1_030));

    let err = leases
        .try_acquire(process_id, "worker-b", 30, 1_029)
        .expect_err("lease still held");
    assert!(matches!(err, LeaseError::Denied { expires_at: 1_030, .. }));
    assert!(err.is_contention());

    let reclaimed = leases
        .try_acquire(process_id, "worker-b", 30, 1_030)
        .expect("expired lease is reclaimable");
    assert_eq!(reclaimed.holder, "worker-b");
    assert_eq!(reclaimed.expires_at, 1_060);
}

#[test]
fn lease_manager_module_simultaneous_acquirers_yield_one_winner() {
    let temp = tempdir().expect("tempdir");
    let store = open_store(temp.path());
    let process_id = create_sync_process(&store);
    let contenders = 8;
    let barrier = Arc::new(Barrier::new(contenders));

    let handles = (0..contenders)
        .map(|index| {
            let leases = LeaseManager::new(store.clone());
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                leases.try_acquire(process_id, &format!("worker-{index}"), 30, 500)
            })
        })
        .collect::<Vec<_>>();

    let mut winners = Vec::<Lease>::new();
    for handle in handles {
        match handle.join().expect("join contender") {
            Ok(lease) => winners.push(lease),
            Err(LeaseError::Denied { .. }) | Err(LeaseError::ConcurrencyConflict { .. }) => {}
            Err(other) => panic!("unexpected lease error: {other}"),
        }
    }
    assert_eq!(winners.len(), 1);
    let stored = store.read_process(process_id).expect("read").process;
    assert_eq!(stored.version, winners[0].version);
}

#[test]
fn lease_manager_module_renews_before_expiry_only() {
    let temp = tempdir().expect("tempdir");
    let store = open_store(temp.path());
    let leases = LeaseManager::new(store.clone());
    let process_id = create_sync_process(&store);

    let mut lease = leases
        .try_acquire(process_id, "worker-a", 10, 100)
        .expect("acquire");
    assert!(!lease.needs_renewal(104));
    assert!(lease.needs_renewal(106));

    let before = lease.version;
    leases.renew(&mut lease, 106).expect("renew");
    assert_eq!(lease.expires_at, 116);
    assert_ne!(lease.version, before);
    assert_eq!(
        store.read_process(process_id).expect("read").process.lock_expiry_date,
        Some(116)
    );

    let err = leases.renew(&mut lease, 116).expect_err("expired");
    assert!(matches!(err, LeaseError::Expired { expired_at: 116, .. }));
}

#[test]
fn lease_manager_module_release_clears_the_lock_and_rejects_stale_versions() {
    let temp = tempdir().expect("tempdir");
    let store = open_store(temp.path());
    let log_path = temp.path().join("logs/events.jsonl");
    let leases = LeaseManager::new(store.clone()).with_log(EventLog::to_path(&log_path));
    let process_id = create_sync_process(&store);

    let lease = leases
        .try_acquire(process_id, "worker-a", 30, 10)
        .expect("acquire");
    let released = leases.release(&lease).expect("release");
    let stored = store.read_process(process_id).expect("read").process;
    assert_eq!(stored.lock_expiry_date, None);
    assert_eq!(stored.version, released);

    let err = leases
        .release_lease(process_id, lease.version)
        .expect_err("stale release");
    assert!(matches!(err, LeaseError::ConcurrencyConflict { .. }));

    let log = fs::read_to_string(&log_path).expect("read event log");
    let events = log
        .lines()
        .map(|line| serde_json::from_str::<serde_json::Value>(line).expect("json line"))
        .map(|value| value["event"].as_str().unwrap_or_default().to_string())
        .collect::<Vec<_>>();
    assert_eq!(events, vec!["lease.acquired", "process.released"]);
}

#[test]
fn lease_manager_module_rejects_zero_duration() {
    let temp = tempdir().expect("tempdir");
    let store = open_store(temp.path());
    let leases = LeaseManager::new(store.clone());
    let process_id = create_sync_process(&store);

    let err = leases
        .try_acquire(process_id, "worker-a", 0, 10)
        .expect_err("zero duration");
    assert!(matches!(err, LeaseError::InvalidDuration));
}
