#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("worker pool requires at least one worker")]
    NoWorkers,
    #[error("failed to spawn worker `{worker_id}`: {source}")]
    Spawn {
        worker_id: String,
        #[source]
        source: std::io::Error,
    },
    #[error("worker `{worker_id}` panicked")]
    WorkerPanicked { worker_id: String },
    #[error("shutdown timeout waiting for workers: {workers}")]
    ShutdownTimeout { workers: String },
}
