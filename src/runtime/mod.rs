pub mod worker_pool;
pub(crate) mod worker_primitives;
pub mod worker_registry;

pub use crate::shared::errors::RuntimeError;
pub use worker_pool::{run_worker_loop, run_worker_pool, worker_ids, PoolState, WorkerContext};
pub use worker_registry::{apply_worker_event, WorkerEvent, WorkerHealth, WorkerState};
