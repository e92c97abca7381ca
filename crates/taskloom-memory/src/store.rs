use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::debug;

use taskloom_core::error::{Result, TaskloomError};
use taskloom_core::traits::FlowStorage;
use taskloom_core::types::{EdgeLabel, EntryData, FlowEntry, NodeId};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS flow_entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id TEXT NOT NULL,
        caller INTEGER NOT NULL,
        callee INTEGER NOT NULL,
        label TEXT NOT NULL,
        data TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        UNIQUE(run_id, caller, callee, label)
    );

    CREATE INDEX IF NOT EXISTS idx_flow_caller ON flow_entries(run_id, caller, id);
    CREATE INDEX IF NOT EXISTS idx_flow_callee ON flow_entries(run_id, callee, id);";

/// SQLite-backed flow storage.
///
/// One database file can hold many runs; every read and write is scoped to
/// the run id the handle was opened for.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    run_id: String,
}

impl SqliteStorage {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        // Create parent directories
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TaskloomError::Database(format!("Failed to create db directory: {}", e))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| TaskloomError::Database(e.to_string()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| TaskloomError::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| TaskloomError::Database(e.to_string()))?;

        debug!(path = %path.display(), "Flow storage opened");
        Ok(Self {
            conn: Mutex::new(conn),
            run_id: String::new(),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| TaskloomError::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| TaskloomError::Database(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            run_id: String::new(),
        })
    }

    /// Scope this handle to a run.
    pub fn with_run(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    fn query_entries(&self, sql: &str, node: NodeId) -> Result<Vec<FlowEntry>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| TaskloomError::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| TaskloomError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![self.run_id, node.0 as i64], read_row)
            .map_err(|e| TaskloomError::Database(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| TaskloomError::Database(e.to_string()))?;
            entries.push(raw.into_entry()?);
        }
        Ok(entries)
    }
}

/// Column values of one `flow_entries` row before decoding.
struct RawEntry {
    caller: i64,
    callee: i64,
    label: String,
    data: String,
    timestamp: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEntry> {
    Ok(RawEntry {
        caller: row.get(0)?,
        callee: row.get(1)?,
        label: row.get(2)?,
        data: row.get(3)?,
        timestamp: row.get(4)?,
    })
}

impl RawEntry {
    fn into_entry(self) -> Result<FlowEntry> {
        let label = EdgeLabel::parse(&self.label).ok_or_else(|| {
            TaskloomError::Database(format!("Unknown edge label in storage: {}", self.label))
        })?;
        let data: EntryData = serde_json::from_str(&self.data)?;
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| TaskloomError::Database(format!("Bad timestamp: {}", e)))?;

        Ok(FlowEntry {
            caller: NodeId(self.caller as u64),
            callee: NodeId(self.callee as u64),
            label,
            data,
            timestamp,
        })
    }
}

impl FlowStorage for SqliteStorage {
    fn add_entry(&self, entry: FlowEntry) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let data = serde_json::to_string(&entry.data)?;
            let conn = self
                .conn
                .lock()
                .map_err(|e| TaskloomError::Database(e.to_string()))?;

            conn.execute(
                "INSERT INTO flow_entries (run_id, caller, callee, label, data, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    self.run_id,
                    entry.caller.0 as i64,
                    entry.callee.0 as i64,
                    entry.label.as_str(),
                    data,
                    entry.timestamp.to_rfc3339()
                ],
            )
            .map_err(|e| match e.sqlite_error_code() {
                Some(ErrorCode::ConstraintViolation) => TaskloomError::DuplicateEntry {
                    caller: entry.caller,
                    callee: entry.callee,
                    label: entry.label,
                },
                _ => TaskloomError::Database(e.to_string()),
            })?;
            Ok(())
        })
    }

    fn get_entry(
        &self,
        caller: NodeId,
        callee: NodeId,
        label: EdgeLabel,
    ) -> BoxFuture<'_, Result<Option<FlowEntry>>> {
        Box::pin(async move {
            let conn = self
                .conn
                .lock()
                .map_err(|e| TaskloomError::Database(e.to_string()))?;

            let raw = conn
                .query_row(
                    "SELECT caller, callee, label, data, timestamp FROM flow_entries
                     WHERE run_id = ?1 AND caller = ?2 AND callee = ?3 AND label = ?4",
                    params![self.run_id, caller.0 as i64, callee.0 as i64, label.as_str()],
                    read_row,
                )
                .optional()
                .map_err(|e| TaskloomError::Database(e.to_string()))?;

            raw.map(RawEntry::into_entry).transpose()
        })
    }

    fn entries_by_caller(&self, caller: NodeId) -> BoxFuture<'_, Result<Vec<FlowEntry>>> {
        Box::pin(async move {
            self.query_entries(
                "SELECT caller, callee, label, data, timestamp FROM flow_entries
                 WHERE run_id = ?1 AND caller = ?2 ORDER BY id ASC",
                caller,
            )
        })
    }

    fn entries_by_callee(&self, callee: NodeId) -> BoxFuture<'_, Result<Vec<FlowEntry>>> {
        Box::pin(async move {
            self.query_entries(
                "SELECT caller, callee, label, data, timestamp FROM flow_entries
                 WHERE run_id = ?1 AND callee = ?2 ORDER BY id ASC",
                callee,
            )
        })
    }
}
