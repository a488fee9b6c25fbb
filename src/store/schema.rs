pub(crate) const SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS process_types (
        id INTEGER PRIMARY KEY,
        label TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS process_step_types (
        id INTEGER PRIMARY KEY,
        label TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS process_step_statuses (
        id INTEGER PRIMARY KEY,
        label TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS processes (
        id TEXT NOT NULL PRIMARY KEY,
        process_type_id INTEGER NOT NULL REFERENCES process_types(id),
        version TEXT NOT NULL,
        lock_expiry_date INTEGER,
        created_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS process_steps (
        id TEXT NOT NULL PRIMARY KEY,
        process_id TEXT NOT NULL REFERENCES processes(id) ON DELETE CASCADE,
        process_step_type_id INTEGER NOT NULL REFERENCES process_step_types(id),
        process_step_status_id INTEGER NOT NULL REFERENCES process_step_statuses(id),
        message TEXT,
        retry_at INTEGER,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_process_steps_process
        ON process_steps(process_id);
    CREATE INDEX IF NOT EXISTS idx_process_steps_status
        ON process_steps(process_step_status_id, process_id);
    CREATE INDEX IF NOT EXISTS idx_processes_type_lock
        ON processes(process_type_id, lock_expiry_date);
";

pub(crate) const PROCESS_TYPES_TABLE: &str = "process_types";
pub(crate) const STEP_TYPES_TABLE: &str = "process_step_types";
pub(crate) const STEP_STATUSES_TABLE: &str = "process_step_statuses";
