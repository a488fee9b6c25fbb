use super::worker_primitives::{jittered_interval, sleep_with_stop};
use super::worker_registry::{apply_worker_event, WorkerEvent, WorkerHealth};
use super::RuntimeError;
use crate::config::WorkerSettings;
use crate::orchestration::{ProcessEngine, RunReport};
use crate::shared::EventLog;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolState {
    pub workers: BTreeMap<String, WorkerHealth>,
    pub totals: RunReport,
    pub last_error: Option<String>,
}

pub struct WorkerContext {
    pub worker_id: String,
    pub engine: ProcessEngine,
    pub poll_interval: Duration,
    pub stop: Arc<AtomicBool>,
    pub events: Sender<WorkerEvent>,
}

pub fn worker_ids(count: usize) -> Vec<String> {
    (1..=count).map(|index| format!("worker-{index}")).collect()
}

/// Polls the engine until the stop flag is raised or a configuration error
/// makes further polling pointless.
pub fn run_worker_loop(ctx: WorkerContext) {
    let WorkerContext {
        worker_id,
        engine,
        poll_interval,
        stop,
        events,
    } = ctx;
    let now = || engine.clock().now();

    let _ = events.send(WorkerEvent::Started {
        worker_id: worker_id.clone(),
        at: now(),
    });

    while !stop.load(Ordering::Relaxed) {
        match engine.run_once(&worker_id) {
            Ok(report) => {
                let idle = report.is_idle();
                let _ = events.send(WorkerEvent::Heartbeat {
                    worker_id: worker_id.clone(),
                    at: now(),
                    report,
                });
                if idle && !sleep_with_stop(&stop, jittered_interval(poll_interval)) {
                    break;
                }
            }
            Err(err) => {
                let fatal = err.is_configuration_error();
                let _ = events.send(WorkerEvent::Error {
                    worker_id: worker_id.clone(),
                    at: now(),
                    message: err.to_string(),
                    fatal,
                });
                if fatal || !sleep_with_stop(&stop, jittered_interval(poll_interval)) {
                    break;
                }
            }
        }
    }

    let _ = events.send(WorkerEvent::Stopped {
        worker_id,
        at: now(),
    });
}

/// Runs `settings.workers` polling threads until `stop` is raised or every
/// worker has stopped on its own, then waits for them to wind down.
pub fn run_worker_pool(
    settings: &WorkerSettings,
    engine: ProcessEngine,
    log: EventLog,
    stop: Arc<AtomicBool>,
) -> Result<PoolState, RuntimeError> {
    if settings.workers == 0 {
        return Err(RuntimeError::NoWorkers);
    }

    let mut state = PoolState::default();
    let mut active = BTreeSet::new();
    let (events_tx, events_rx) = mpsc::channel::<WorkerEvent>();
    let mut handles = Vec::new();

    for worker_id in worker_ids(settings.workers) {
        let ctx = WorkerContext {
            worker_id: worker_id.clone(),
            engine: engine.clone(),
            poll_interval: settings.poll_interval(),
            stop: stop.clone(),
            events: events_tx.clone(),
        };
        let spawned = thread::Builder::new()
            .name(worker_id.clone())
            .spawn(move || run_worker_loop(ctx));
        match spawned {
            Ok(handle) => {
                state.workers.insert(worker_id.clone(), WorkerHealth::default());
                active.insert(worker_id.clone());
                handles.push((worker_id, handle));
            }
            Err(source) => {
                stop.store(true, Ordering::Relaxed);
                for (_, handle) in handles {
                    let _ = handle.join();
                }
                return Err(RuntimeError::Spawn { worker_id, source });
            }
        }
    }
    drop(events_tx);

    while !stop.load(Ordering::Relaxed) && !active.is_empty() {
        match events_rx.recv_timeout(Duration::from_millis(50)) {
            Ok(event) => apply_worker_event(
                &mut state.workers,
                &mut active,
                &mut state.totals,
                &log,
                event,
            ),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    stop.store(true, Ordering::Relaxed);

    let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
    while !active.is_empty() && Instant::now() < deadline {
        match events_rx.recv_timeout(Duration::from_millis(25)) {
            Ok(event) => apply_worker_event(
                &mut state.workers,
                &mut active,
                &mut state.totals,
                &log,
                event,
            ),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    if !active.is_empty() {
        let workers = active.iter().cloned().collect::<Vec<_>>().join(",");
        log.warn(
            "worker.shutdown_timeout",
            &[("workers", Value::from(workers.clone()))],
        );
        return Err(RuntimeError::ShutdownTimeout { workers });
    }

    for (worker_id, handle) in handles {
        if handle.join().is_err() {
            state.last_error = Some(RuntimeError::WorkerPanicked { worker_id }.to_string());
        }
    }
    if state.last_error.is_none() {
        state.last_error = state
            .workers
            .values()
            .filter_map(|health| health.last_error.clone())
            .last();
    }
    Ok(state)
}
