use super::error::sql_err;
use super::records::{ProcessRecord, ProcessSnapshot, ProcessUpdate, StepRecord, StepTransition};
use super::schema::{PROCESS_TYPES_TABLE, SCHEMA_SQL, STEP_STATUSES_TABLE, STEP_TYPES_TABLE};
use super::StoreError;
use crate::catalog::{ProcessTypeId, StepStatus, StepTypeId};
use crate::shared::{ProcessId, StepId, VersionToken};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const PROCESS_COLUMNS: &str = "id, process_type_id, version, lock_expiry_date, created_at";
const STEP_COLUMNS: &str =
    "id, process_id, process_step_type_id, process_step_status_id, message, retry_at, created_at, updated_at";

/// Durable record of processes and their steps.
///
/// Every operation opens its own connection, so nothing is held open while a
/// step handler runs. Process rows are only ever rewritten through a
/// compare-and-swap on `version`.
#[derive(Debug, Clone)]
pub struct ProcessStore {
    db_path: PathBuf,
    busy_timeout: Duration,
}

impl ProcessStore {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::CreateParent {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let store = Self {
            db_path: db_path.to_path_buf(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        };

        let _ = store.connect()?;
        Ok(store)
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        let connection = self.connect()?;
        connection.execute_batch(SCHEMA_SQL).map_err(sql_err)
    }

    /// Provisions every compiled catalog entry. Existing rows are left alone.
    pub fn bootstrap_catalog(&self) -> Result<(), StoreError> {
        let mut connection = self.connect()?;
        let tx = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(sql_err)?;
        for (table, entries) in catalog_tables() {
            for (id, label) in entries {
                tx.execute(
                    &format!("INSERT INTO {table} (id, label) VALUES (?1, ?2) ON CONFLICT(id) DO NOTHING"),
                    params![id, label],
                )
                .map_err(sql_err)?;
            }
        }
        tx.commit().map_err(sql_err)
    }

    /// Fails when a catalog table is missing an entry, carries an unknown id,
    /// or labels an id differently from the compiled catalog.
    pub fn verify_catalog(&self) -> Result<(), StoreError> {
        let connection = self.connect()?;
        for (table, entries) in catalog_tables() {
            let stored = load_catalog_table(&connection, table)?;
            for (id, label) in &entries {
                match stored.get(id) {
                    None => {
                        return Err(StoreError::CatalogMismatch {
                            table,
                            reason: format!("missing id {id} ({label})"),
                        })
                    }
                    Some(stored_label) if stored_label != label => {
                        return Err(StoreError::CatalogMismatch {
                            table,
                            reason: format!(
                                "id {id} is labelled `{stored_label}`, expected `{label}`"
                            ),
                        })
                    }
                    Some(_) => {}
                }
            }
            if let Some((id, label)) = stored
                .iter()
                .find(|(id, _)| !entries.iter().any(|(known, _)| known == *id))
            {
                return Err(StoreError::CatalogMismatch {
                    table,
                    reason: format!("unknown id {id} ({label})"),
                });
            }
        }
        Ok(())
    }

    pub fn create_process(
        &self,
        process_type: ProcessTypeId,
        now: i64,
    ) -> Result<ProcessId, StoreError> {
        let snapshot = self.create_process_with_steps(process_type, &[], now)?;
        Ok(snapshot.process.id)
    }

    /// Creates a process and its first steps (status TODO) in one unit.
    pub fn create_process_with_steps(
        &self,
        process_type: ProcessTypeId,
        steps: &[StepTypeId],
        now: i64,
    ) -> Result<ProcessSnapshot, StoreError> {
        let process_id = ProcessId::generate();
        let mut connection = self.connect()?;
        let tx = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(sql_err)?;
        tx.execute(
            "
            INSERT INTO processes (id, process_type_id, version, lock_expiry_date, created_at)
            VALUES (?1, ?2, ?3, NULL, ?4)
            ",
            params![
                process_id.to_string(),
                process_type.id(),
                VersionToken::generate().to_string(),
                now
            ],
        )
        .map_err(sql_err)?;
        for step_type in steps {
            insert_step(&tx, process_id, *step_type, StepStatus::Todo, None, now)?;
        }
        let snapshot = read_snapshot(&tx, process_id)?;
        tx.commit().map_err(sql_err)?;
        Ok(snapshot)
    }

    pub fn append_step(
        &self,
        process_id: ProcessId,
        step_type: StepTypeId,
        status: StepStatus,
        now: i64,
    ) -> Result<StepId, StoreError> {
        let mut connection = self.connect()?;
        let tx = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(sql_err)?;
        if load_process(&tx, process_id)?.is_none() {
            return Err(StoreError::ProcessNotFound {
                process_id: process_id.to_string(),
            });
        }
        let step_id = insert_step(&tx, process_id, step_type, status, None, now)?;
        tx.commit().map_err(sql_err)?;
        Ok(step_id)
    }

    pub fn read_process(&self, process_id: ProcessId) -> Result<ProcessSnapshot, StoreError> {
        let connection = self.connect()?;
        read_snapshot(&connection, process_id)
    }

    pub fn load_step(&self, step_id: StepId) -> Result<StepRecord, StoreError> {
        let connection = self.connect()?;
        let raw = connection
            .query_row(
                &format!("SELECT {STEP_COLUMNS} FROM process_steps WHERE id = ?1"),
                params![step_id.to_string()],
                RawStep::from_row,
            )
            .optional()
            .map_err(sql_err)?;
        match raw {
            Some(raw) => raw.into_record(),
            None => Err(StoreError::StepNotFound {
                step_id: step_id.to_string(),
            }),
        }
    }

    /// Compare-and-swap of `(version, lock_expiry_date)`. Fails without
    /// writing anything when the stored version is not `expected_version`.
    pub fn commit_process_update(
        &self,
        process_id: ProcessId,
        update: &ProcessUpdate,
    ) -> Result<(), StoreError> {
        let mut connection = self.connect()?;
        let tx = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(sql_err)?;
        let changed = tx
            .execute(
                "
                UPDATE processes
                SET version = ?1, lock_expiry_date = ?2
                WHERE id = ?3 AND version = ?4
                ",
                params![
                    update.new_version.to_string(),
                    update.lock_expiry_date,
                    process_id.to_string(),
                    update.expected_version.to_string(),
                ],
            )
            .map_err(sql_err)?;
        if changed == 0 {
            return Err(diagnose_process_conflict(
                &tx,
                process_id,
                update.expected_version,
            )?);
        }
        tx.commit().map_err(sql_err)
    }

    /// Applies step status changes and appends under the caller's lease,
    /// together with a version-bumping process update, as one atomic unit.
    ///
    /// The process row must carry `expected_version` and an unexpired lock
    /// at `now`; every updated step must still be TODO.
    pub fn commit_step_transition(
        &self,
        process_id: ProcessId,
        update: &ProcessUpdate,
        transition: &StepTransition,
        now: i64,
    ) -> Result<(), StoreError> {
        let mut connection = self.connect()?;
        let tx = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(sql_err)?;

        let changed = tx
            .execute(
                "
                UPDATE processes
                SET version = ?1, lock_expiry_date = ?2
                WHERE id = ?3 AND version = ?4
                  AND lock_expiry_date IS NOT NULL AND lock_expiry_date > ?5
                ",
                params![
                    update.new_version.to_string(),
                    update.lock_expiry_date,
                    process_id.to_string(),
                    update.expected_version.to_string(),
                    now,
                ],
            )
            .map_err(sql_err)?;
        if changed == 0 {
            return Err(diagnose_process_conflict(
                &tx,
                process_id,
                update.expected_version,
            )?);
        }

        for step_update in &transition.updates {
            if !StepStatus::Todo.can_transition_to(step_update.status) {
                return Err(StoreError::InvalidStepTransition {
                    step_id: step_update.step_id.to_string(),
                    from: StepStatus::Todo,
                    to: step_update.status,
                });
            }
            let changed = tx
                .execute(
                    "
                    UPDATE process_steps
                    SET process_step_status_id = ?1,
                        message = COALESCE(?2, message),
                        updated_at = ?3
                    WHERE id = ?4 AND process_id = ?5 AND process_step_status_id = ?6
                    ",
                    params![
                        step_update.status.id(),
                        step_update.message,
                        now,
                        step_update.step_id.to_string(),
                        process_id.to_string(),
                        StepStatus::Todo.id(),
                    ],
                )
                .map_err(sql_err)?;
            if changed == 0 {
                return Err(diagnose_step_conflict(
                    &tx,
                    process_id,
                    step_update.step_id,
                    step_update.status,
                )?);
            }
        }

        for step_type in &transition.appends {
            insert_step(
                &tx,
                process_id,
                *step_type,
                StepStatus::Todo,
                transition.appends_retry_at,
                now,
            )?;
        }

        tx.commit().map_err(sql_err)
    }

    /// Processes of the given types with no unexpired lease at `now` whose
    /// first TODO step is due, oldest first.
    pub fn find_claimable_processes(
        &self,
        now: i64,
        process_types: &[ProcessTypeId],
        limit: usize,
    ) -> Result<Vec<ProcessId>, StoreError> {
        if process_types.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let type_ids = process_types
            .iter()
            .map(|process_type| process_type.id().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let connection = self.connect()?;
        let mut statement = connection
            .prepare(&format!(
                "
                SELECT p.id FROM processes p
                WHERE p.process_type_id IN ({type_ids})
                  AND (p.lock_expiry_date IS NULL OR p.lock_expiry_date <= ?1)
                  AND EXISTS (
                      SELECT 1 FROM process_steps s
                      WHERE s.rowid = (
                          SELECT MIN(t.rowid) FROM process_steps t
                          WHERE t.process_id = p.id AND t.process_step_status_id = ?2
                      )
                        AND (s.retry_at IS NULL OR s.retry_at <= ?1)
                  )
                ORDER BY p.created_at ASC, p.rowid ASC
                LIMIT ?3
                "
            ))
            .map_err(sql_err)?;
        let rows = statement
            .query_map(
                params![now, StepStatus::Todo.id(), limit as i64],
                |row| row.get::<_, String>(0),
            )
            .map_err(sql_err)?;

        let mut out = Vec::new();
        for row in rows {
            let raw = row.map_err(sql_err)?;
            out.push(parse_process_id(&raw)?);
        }
        Ok(out)
    }

    /// Most recently created processes first.
    pub fn list_processes(&self, limit: usize) -> Result<Vec<ProcessRecord>, StoreError> {
        let connection = self.connect()?;
        let mut statement = connection
            .prepare(&format!(
                "SELECT {PROCESS_COLUMNS} FROM processes ORDER BY created_at DESC, rowid DESC LIMIT ?1"
            ))
            .map_err(sql_err)?;
        let rows = statement
            .query_map(params![limit as i64], RawProcess::from_row)
            .map_err(sql_err)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(sql_err)?.into_record()?);
        }
        Ok(out)
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let connection =
            Connection::open(&self.db_path).map_err(|source| StoreError::Open {
                path: self.db_path.display().to_string(),
                source,
            })?;
        connection.busy_timeout(self.busy_timeout).map_err(sql_err)?;
        connection
            .execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(sql_err)?;
        Ok(connection)
    }
}

struct RawProcess {
    id: String,
    process_type_id: i64,
    version: String,
    lock_expiry_date: Option<i64>,
    created_at: i64,
}

impl RawProcess {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            process_type_id: row.get(1)?,
            version: row.get(2)?,
            lock_expiry_date: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn into_record(self) -> Result<ProcessRecord, StoreError> {
        let process_type = ProcessTypeId::from_id(self.process_type_id).ok_or_else(|| {
            StoreError::CatalogIntegrity {
                entity: "process type id",
                value: self.process_type_id.to_string(),
            }
        })?;
        Ok(ProcessRecord {
            id: parse_process_id(&self.id)?,
            process_type,
            version: VersionToken::parse(&self.version).map_err(|reason| StoreError::InvalidId {
                entity: "version",
                value: self.version.clone(),
                reason,
            })?,
            lock_expiry_date: self.lock_expiry_date,
            created_at: self.created_at,
        })
    }
}

struct RawStep {
    id: String,
    process_id: String,
    step_type_id: i64,
    status_id: i64,
    message: Option<String>,
    retry_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl RawStep {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            process_id: row.get(1)?,
            step_type_id: row.get(2)?,
            status_id: row.get(3)?,
            message: row.get(4)?,
            retry_at: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_record(self) -> Result<StepRecord, StoreError> {
        let step_type =
            StepTypeId::from_id(self.step_type_id).ok_or_else(|| StoreError::CatalogIntegrity {
                entity: "process step type id",
                value: self.step_type_id.to_string(),
            })?;
        let status =
            StepStatus::from_id(self.status_id).ok_or_else(|| StoreError::CatalogIntegrity {
                entity: "process step status id",
                value: self.status_id.to_string(),
            })?;
        Ok(StepRecord {
            id: StepId::parse(&self.id).map_err(|reason| StoreError::InvalidId {
                entity: "step id",
                value: self.id.clone(),
                reason,
            })?,
            process_id: parse_process_id(&self.process_id)?,
            step_type,
            status,
            message: self.message,
            retry_at: self.retry_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn parse_process_id(raw: &str) -> Result<ProcessId, StoreError> {
    ProcessId::parse(raw).map_err(|reason| StoreError::InvalidId {
        entity: "process id",
        value: raw.to_string(),
        reason,
    })
}

fn insert_step(
    tx: &Transaction<'_>,
    process_id: ProcessId,
    step_type: StepTypeId,
    status: StepStatus,
    retry_at: Option<i64>,
    now: i64,
) -> Result<StepId, StoreError> {
    let step_id = StepId::generate();
    tx.execute(
        "
        INSERT INTO process_steps (
            id, process_id, process_step_type_id, process_step_status_id,
            message, retry_at, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6, ?6)
        ",
        params![
            step_id.to_string(),
            process_id.to_string(),
            step_type.id(),
            status.id(),
            retry_at,
            now
        ],
    )
    .map_err(sql_err)?;
    Ok(step_id)
}

fn load_process(
    connection: &Connection,
    process_id: ProcessId,
) -> Result<Option<ProcessRecord>, StoreError> {
    let raw = connection
        .query_row(
            &format!("SELECT {PROCESS_COLUMNS} FROM processes WHERE id = ?1"),
            params![process_id.to_string()],
            RawProcess::from_row,
        )
        .optional()
        .map_err(sql_err)?;
    raw.map(RawProcess::into_record).transpose()
}

fn read_snapshot(
    connection: &Connection,
    process_id: ProcessId,
) -> Result<ProcessSnapshot, StoreError> {
    let process = load_process(connection, process_id)?.ok_or_else(|| {
        StoreError::ProcessNotFound {
            process_id: process_id.to_string(),
        }
    })?;

    let mut statement = connection
        .prepare(&format!(
            "
            SELECT {STEP_COLUMNS} FROM process_steps
            WHERE process_id = ?1
            ORDER BY rowid ASC
            "
        ))
        .map_err(sql_err)?;
    let rows = statement
        .query_map(params![process_id.to_string()], RawStep::from_row)
        .map_err(sql_err)?;

    let mut steps = Vec::new();
    for row in rows {
        steps.push(row.map_err(sql_err)?.into_record()?);
    }
    Ok(ProcessSnapshot { process, steps })
}

fn diagnose_process_conflict(
    connection: &Connection,
    process_id: ProcessId,
    expected: VersionToken,
) -> Result<StoreError, StoreError> {
    let Some(current) = load_process(connection, process_id)? else {
        return Ok(StoreError::ProcessNotFound {
            process_id: process_id.to_string(),
        });
    };
    if current.version != expected {
        return Ok(StoreError::ConcurrencyConflict {
            process_id: process_id.to_string(),
            expected: expected.to_string(),
            actual: current.version.to_string(),
        });
    }
    Ok(StoreError::LeaseNotHeld {
        process_id: process_id.to_string(),
        lock_expiry_date: current.lock_expiry_date,
    })
}

fn diagnose_step_conflict(
    connection: &Connection,
    process_id: ProcessId,
    step_id: StepId,
    to: StepStatus,
) -> Result<StoreError, StoreError> {
    let current = connection
        .query_row(
            "SELECT process_id, process_step_status_id FROM process_steps WHERE id = ?1",
            params![step_id.to_string()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()
        .map_err(sql_err)?;
    let Some((owner, status_id)) = current else {
        return Ok(StoreError::StepNotFound {
            step_id: step_id.to_string(),
        });
    };
    if owner != process_id.to_string() {
        return Ok(StoreError::StepOwnership {
            step_id: step_id.to_string(),
            process_id: process_id.to_string(),
        });
    }
    let from = StepStatus::from_id(status_id).ok_or_else(|| StoreError::CatalogIntegrity {
        entity: "process step status id",
        value: status_id.to_string(),
    })?;
    Ok(StoreError::InvalidStepTransition {
        step_id: step_id.to_string(),
        from,
        to,
    })
}

fn catalog_tables() -> Vec<(&'static str, Vec<(i64, &'static str)>)> {
    vec![
        (
            PROCESS_TYPES_TABLE,
            ProcessTypeId::ALL
                .iter()
                .map(|entry| (entry.id(), entry.label()))
                .collect(),
        ),
        (
            STEP_TYPES_TABLE,
            StepTypeId::ALL
                .iter()
                .map(|entry| (entry.id(), entry.label()))
                .collect(),
        ),
        (
            STEP_STATUSES_TABLE,
            StepStatus::ALL
                .iter()
                .map(|entry| (entry.id(), entry.label()))
                .collect(),
        ),
    ]
}

fn load_catalog_table(
    connection: &Connection,
    table: &'static str,
) -> Result<BTreeMap<i64, String>, StoreError> {
    let mut statement = connection
        .prepare(&format!("SELECT id, label FROM {table} ORDER BY id ASC"))
        .map_err(sql_err)?;
    let rows = statement
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))
        .map_err(sql_err)?;

    let mut out = BTreeMap::new();
    for row in rows {
        let (id, label) = row.map_err(sql_err)?;
        out.insert(id, label);
    }
    Ok(out)
}
