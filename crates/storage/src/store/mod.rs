#![forbid(unsafe_code)]

mod approvals;
mod error;
mod events;
mod memory;
mod packages;
mod payload;
mod requests;
mod tasks;

pub use error::StoreError;
pub use payload::EventPayload;
pub use requests::*;

pub(crate) use packages::read_package_tx;

use pf_core::model::EntityKind;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Transaction, params};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DB_FILE: &str = "packflow.db";
const SCHEMA_VERSION: &str = "v1";

pub(crate) const OP_CREATE_PACKAGE: &str = "create_package";
pub(crate) const OP_CREATE_TASK: &str = "create_task";
pub(crate) const OP_COMPLETE_TASK: &str = "complete_task";
pub(crate) const OP_ESCALATE_TASK: &str = "escalate_task";
pub(crate) const OP_INGEST_EMAIL: &str = "ingest_email";
pub(crate) const OP_DECIDE: &str = "decide_approval";

/// Single transactional boundary for the write layer. Every mutation runs
/// the same template inside one transaction: idempotency check, event
/// append, entity mutation, idempotency record, commit.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let db_path = storage_dir.join(DB_FILE);
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        install_schema(&conn)?;

        Ok(Self { conn, storage_dir })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }
}

fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;

        CREATE TABLE IF NOT EXISTS meta (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS counters (
          name TEXT PRIMARY KEY,
          value INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS packages (
          id TEXT PRIMARY KEY,
          code TEXT NOT NULL UNIQUE,
          title TEXT NOT NULL,
          data_json TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tasks (
          id TEXT PRIMARY KEY,
          package_id TEXT NOT NULL REFERENCES packages(id),
          title TEXT NOT NULL,
          due_at_ms INTEGER,
          assignee_id TEXT,
          source_id TEXT,
          correlation_id TEXT,
          status TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS events (
          seq INTEGER PRIMARY KEY AUTOINCREMENT,
          event_type TEXT NOT NULL,
          entity_kind TEXT NOT NULL,
          entity_id TEXT NOT NULL,
          package_id TEXT,
          task_id TEXT,
          payload_json TEXT NOT NULL,
          triggered_by TEXT NOT NULL,
          correlation_id TEXT,
          idempotency_key TEXT,
          created_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS approvals (
          id TEXT PRIMARY KEY,
          package_id TEXT NOT NULL REFERENCES packages(id),
          patch_json TEXT NOT NULL,
          reason TEXT NOT NULL,
          requested_by TEXT NOT NULL,
          status TEXT NOT NULL,
          decided_by TEXT,
          decision_reason TEXT,
          created_at_ms INTEGER NOT NULL,
          decided_at_ms INTEGER
        );

        CREATE TABLE IF NOT EXISTS idempotency_log (
          idempotency_key TEXT NOT NULL,
          operation TEXT NOT NULL,
          result_json TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          PRIMARY KEY (idempotency_key, operation)
        );

        CREATE TABLE IF NOT EXISTS memories (
          id TEXT PRIMARY KEY,
          package_id TEXT,
          entity_kind TEXT NOT NULL,
          entity_id TEXT NOT NULL,
          memory_type TEXT NOT NULL,
          content TEXT NOT NULL,
          metadata_json TEXT,
          source_refs_json TEXT,
          created_by TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_kind, entity_id, seq);
        CREATE INDEX IF NOT EXISTS idx_events_key ON events(idempotency_key);
        CREATE INDEX IF NOT EXISTS idx_tasks_package ON tasks(package_id);
        CREATE INDEX IF NOT EXISTS idx_tasks_correlation ON tasks(correlation_id);
        CREATE INDEX IF NOT EXISTS idx_approvals_status ON approvals(status);
        CREATE INDEX IF NOT EXISTS idx_memories_entity ON memories(entity_kind, entity_id);
        CREATE INDEX IF NOT EXISTS idx_memories_type ON memories(memory_type);
        "#,
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO meta(key, value) VALUES (?1, ?2)",
        params!["schema_version", SCHEMA_VERSION],
    )?;
    Ok(())
}

pub(crate) fn now_ms() -> i64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    now.as_millis() as i64
}

pub(crate) fn next_counter_tx(tx: &Transaction<'_>, name: &str) -> Result<i64, StoreError> {
    let current: i64 = tx
        .query_row(
            "SELECT value FROM counters WHERE name=?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);
    let next = current + 1;
    tx.execute(
        r#"
        INSERT INTO counters(name, value) VALUES (?1, ?2)
        ON CONFLICT(name) DO UPDATE SET value=excluded.value
        "#,
        params![name, next],
    )?;
    Ok(next)
}

pub(crate) fn mint_id_tx(
    tx: &Transaction<'_>,
    prefix: &str,
    counter: &str,
) -> Result<String, StoreError> {
    let seq = next_counter_tx(tx, counter)?;
    Ok(format!("{prefix}-{seq:06}"))
}

pub(crate) struct EventInsert<'a> {
    pub entity_kind: EntityKind,
    pub entity_id: &'a str,
    pub package_id: Option<&'a str>,
    pub task_id: Option<&'a str>,
    pub payload: &'a EventPayload,
    pub triggered_by: &'a str,
    pub correlation_id: Option<&'a str>,
    pub idempotency_key: Option<&'a str>,
    pub created_at_ms: i64,
}

/// The event append shared by every write path. Runs inside the caller's
/// transaction so the log and the projections commit or roll back together.
/// The `event_type` column comes from the payload variant, so the two can
/// never disagree.
pub(crate) fn insert_event_tx(
    tx: &Transaction<'_>,
    insert: EventInsert<'_>,
) -> Result<EventRow, StoreError> {
    let Some(event_type) = insert.payload.event_type() else {
        return Err(StoreError::InvalidInput("raw payloads are not writable"));
    };
    let payload_json = insert.payload.to_value()?.to_string();
    tx.execute(
        r#"
        INSERT INTO events(event_type, entity_kind, entity_id, package_id, task_id,
                           payload_json, triggered_by, correlation_id, idempotency_key, created_at_ms)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            event_type.as_str(),
            insert.entity_kind.as_str(),
            insert.entity_id,
            insert.package_id,
            insert.task_id,
            payload_json,
            insert.triggered_by,
            insert.correlation_id,
            insert.idempotency_key,
            insert.created_at_ms
        ],
    )?;
    let seq = tx.last_insert_rowid();
    Ok(EventRow {
        seq,
        event_type: event_type.as_str().to_string(),
        entity_kind: insert.entity_kind.as_str().to_string(),
        entity_id: insert.entity_id.to_string(),
        package_id: insert.package_id.map(|s| s.to_string()),
        task_id: insert.task_id.map(|s| s.to_string()),
        payload: insert.payload.clone(),
        triggered_by: insert.triggered_by.to_string(),
        correlation_id: insert.correlation_id.map(|s| s.to_string()),
        idempotency_key: insert.idempotency_key.map(|s| s.to_string()),
        created_at_ms: insert.created_at_ms,
    })
}

pub(crate) fn idempotency_fetch(
    conn: &Connection,
    key: &str,
    operation: &str,
) -> Result<Option<Value>, StoreError> {
    let result_json = conn
        .query_row(
            "SELECT result_json FROM idempotency_log WHERE idempotency_key=?1 AND operation=?2",
            params![key, operation],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    match result_json {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Check-and-reserve via the primary key on (idempotency_key, operation).
/// Returns `false` when another writer recorded the key first; the caller
/// rolls back and replays the stored result.
pub(crate) fn idempotency_record_tx(
    tx: &Transaction<'_>,
    key: &str,
    operation: &str,
    result: &Value,
    created_at_ms: i64,
) -> Result<bool, StoreError> {
    let inserted = tx.execute(
        r#"
        INSERT INTO idempotency_log(idempotency_key, operation, result_json, created_at_ms)
        VALUES (?1, ?2, ?3, ?4)
        "#,
        params![key, operation, result.to_string(), created_at_ms],
    );
    match inserted {
        Ok(_) => Ok(true),
        Err(err) if is_unique_violation(&err) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
    )
}

/// Top-level keys in the patch overwrite the corresponding keys in the
/// target; nested objects are replaced wholesale, never deep-merged.
pub(crate) fn shallow_merge(base: Value, patch: &Value) -> Value {
    let mut merged = match base {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    if let Value::Object(patch_map) = patch {
        for (key, value) in patch_map {
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::shallow_merge;
    use serde_json::json;

    #[test]
    fn shallow_merge_overwrites_top_level_and_keeps_siblings() {
        let base = json!({"status": "pending", "owner": "X"});
        let merged = shallow_merge(base, &json!({"status": "awarded"}));
        assert_eq!(merged, json!({"status": "awarded", "owner": "X"}));
    }

    #[test]
    fn shallow_merge_replaces_nested_objects_wholesale() {
        let base = json!({"budget": {"fy": 2026, "amount": 10}});
        let merged = shallow_merge(base, &json!({"budget": {"amount": 12}}));
        assert_eq!(merged, json!({"budget": {"amount": 12}}));
    }

    #[test]
    fn shallow_merge_starts_from_empty_on_non_object_base() {
        let merged = shallow_merge(json!(null), &json!({"a": 1}));
        assert_eq!(merged, json!({"a": 1}));
    }
}
