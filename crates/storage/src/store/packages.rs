#![forbid(unsafe_code)]

use super::*;
use pf_core::model::EntityKind;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use serde_json::Value;

impl SqliteStore {
    /// Idempotent package creation: event first, then the projection row,
    /// then the ledger record, all in one transaction.
    pub fn create_package(
        &mut self,
        request: CreatePackageRequest,
    ) -> Result<Outcome<PackageCreated>, StoreError> {
        if request.code.trim().is_empty() {
            return Err(StoreError::InvalidInput("package code must not be empty"));
        }
        if request.title.trim().is_empty() {
            return Err(StoreError::InvalidInput("package title must not be empty"));
        }
        let data = match request.data {
            Value::Null => Value::Object(serde_json::Map::new()),
            value @ Value::Object(_) => value,
            _ => return Err(StoreError::InvalidInput("package data must be a JSON object")),
        };

        let key = request.idempotency_key.as_str();
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;

        if let Some(cached) = idempotency_fetch(&tx, key, OP_CREATE_PACKAGE)? {
            return Ok(Outcome {
                replayed: true,
                value: serde_json::from_value(cached)?,
            });
        }

        let existing: Option<String> = tx
            .query_row(
                "SELECT id FROM packages WHERE code=?1",
                params![request.code],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(StoreError::InvalidInput("package code already exists"));
        }

        let package_id = mint_id_tx(&tx, "PKG", "package_seq")?;
        let correlation_id = request
            .correlation_id
            .map(|id| id.into_string())
            .unwrap_or_else(|| format!("package-{package_id}"));

        let payload = EventPayload::PackageCreated {
            code: request.code.clone(),
            title: request.title.clone(),
        };
        let event = insert_event_tx(
            &tx,
            EventInsert {
                entity_kind: EntityKind::Package,
                entity_id: &package_id,
                package_id: Some(&package_id),
                task_id: None,
                payload: &payload,
                triggered_by: &request.triggered_by,
                correlation_id: Some(&correlation_id),
                idempotency_key: Some(key),
                created_at_ms: now_ms,
            },
        )?;

        tx.execute(
            r#"
            INSERT INTO packages(id, code, title, data_json, created_at_ms, updated_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                package_id,
                request.code,
                request.title,
                data.to_string(),
                now_ms,
                now_ms
            ],
        )?;

        let result = PackageCreated {
            package: PackageRow {
                id: package_id,
                code: request.code,
                title: request.title,
                data,
                created_at_ms: now_ms,
                updated_at_ms: now_ms,
            },
            event,
        };

        let result_json = serde_json::to_value(&result)?;
        if !idempotency_record_tx(&tx, key, OP_CREATE_PACKAGE, &result_json, now_ms)? {
            drop(tx);
            return self.replay(key, OP_CREATE_PACKAGE);
        }
        tx.commit()?;
        Ok(Outcome {
            replayed: false,
            value: result,
        })
    }

    pub fn get_package(&self, package_id: &str) -> Result<Option<PackageRow>, StoreError> {
        read_package(&self.conn, "id", package_id)
    }

    pub fn get_package_by_code(&self, code: &str) -> Result<Option<PackageRow>, StoreError> {
        read_package(&self.conn, "code", code)
    }

    /// Lost-race path: the key was recorded by a concurrent writer between
    /// our fetch and our record, so the stored result is the answer.
    pub(crate) fn replay<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
        operation: &'static str,
    ) -> Result<Outcome<T>, StoreError> {
        let cached = idempotency_fetch(&self.conn, key, operation)?.ok_or_else(|| {
            StoreError::MissingIdempotencyRecord {
                key: key.to_string(),
                operation,
            }
        })?;
        Ok(Outcome {
            replayed: true,
            value: serde_json::from_value(cached)?,
        })
    }
}

fn read_package(
    conn: &Connection,
    column: &str,
    value: &str,
) -> Result<Option<PackageRow>, StoreError> {
    let sql = format!(
        "SELECT id, code, title, data_json, created_at_ms, updated_at_ms FROM packages WHERE {column}=?1"
    );
    let row = conn
        .query_row(&sql, params![value], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })
        .optional()?;
    match row {
        Some((id, code, title, data_json, created_at_ms, updated_at_ms)) => Ok(Some(PackageRow {
            id,
            code,
            title,
            data: serde_json::from_str(&data_json)?,
            created_at_ms,
            updated_at_ms,
        })),
        None => Ok(None),
    }
}

pub(crate) fn read_package_tx(
    tx: &Transaction<'_>,
    package_id: &str,
) -> Result<Option<PackageRow>, StoreError> {
    read_package(tx, "id", package_id)
}
