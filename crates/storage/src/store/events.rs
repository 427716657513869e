#![forbid(unsafe_code)]

use super::*;
use pf_core::model::EntityKind;
use rusqlite::{OptionalExtension, params};

impl SqliteStore {
    /// Records one inbound email exactly once, keyed by its message id. If
    /// the message names a known package code the event attaches to that
    /// package; otherwise it stands alone under an `email` entity.
    pub fn ingest_email(
        &mut self,
        request: IngestEmailRequest,
    ) -> Result<Outcome<EmailIngested>, StoreError> {
        if request.message_id.trim().is_empty() {
            return Err(StoreError::InvalidInput("message id must not be empty"));
        }

        let key = format!("email-ingest-{}", request.message_id);
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;

        if let Some(cached) = idempotency_fetch(&tx, &key, OP_INGEST_EMAIL)? {
            return Ok(Outcome {
                replayed: true,
                value: serde_json::from_value(cached)?,
            });
        }

        let matched = match request.package_code.as_deref() {
            Some(code) => {
                let id: Option<String> = tx
                    .query_row(
                        "SELECT id FROM packages WHERE code=?1",
                        params![code],
                        |row| row.get(0),
                    )
                    .optional()?;
                id
            }
            None => None,
        };

        let standalone_id = format!("email-{}", request.message_id);
        let (entity_kind, entity_id) = match matched.as_deref() {
            Some(package_id) => (EntityKind::Package, package_id),
            None => (EntityKind::Email, standalone_id.as_str()),
        };

        let payload = EventPayload::EmailIngested {
            message_id: request.message_id.clone(),
            sender: request.sender,
            subject: request.subject,
            body_len: request.body.len(),
            package_code: request.package_code,
            attached: matched.is_some(),
        };
        let event = insert_event_tx(
            &tx,
            EventInsert {
                entity_kind,
                entity_id,
                package_id: matched.as_deref(),
                task_id: None,
                payload: &payload,
                triggered_by: &request.triggered_by,
                correlation_id: Some(&key),
                idempotency_key: Some(&key),
                created_at_ms: now_ms,
            },
        )?;

        let result = EmailIngested {
            event,
            attached: matched.is_some(),
            package_id: matched,
        };
        let result_json = serde_json::to_value(&result)?;
        if !idempotency_record_tx(&tx, &key, OP_INGEST_EMAIL, &result_json, now_ms)? {
            drop(tx);
            return self.replay(&key, OP_INGEST_EMAIL);
        }
        tx.commit()?;
        Ok(Outcome {
            replayed: false,
            value: result,
        })
    }

    /// Audit timeline for one entity, newest first. A plain bounded query:
    /// pass the last seen `seq` as `before_seq` to restart where the
    /// previous page ended.
    pub fn timeline(&self, request: TimelineRequest) -> Result<Vec<EventRow>, StoreError> {
        if request.limit == 0 {
            return Err(StoreError::InvalidInput("timeline limit must be positive"));
        }
        let before_seq = request.before_seq.unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            r#"
            SELECT seq, event_type, entity_kind, entity_id, package_id, task_id,
                   payload_json, triggered_by, correlation_id, idempotency_key, created_at_ms
            FROM events
            WHERE entity_kind = ?1 AND entity_id = ?2 AND seq < ?3
            ORDER BY seq DESC
            LIMIT ?4
            "#,
        )?;
        let rows = stmt
            .query_map(
                params![
                    request.entity_kind.as_str(),
                    request.entity_id,
                    before_seq,
                    request.limit as i64
                ],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, String>(7)?,
                        row.get::<_, Option<String>>(8)?,
                        row.get::<_, Option<String>>(9)?,
                        row.get::<_, i64>(10)?,
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let mut events = Vec::with_capacity(rows.len());
        for (
            seq,
            event_type,
            entity_kind,
            entity_id,
            package_id,
            task_id,
            payload_json,
            triggered_by,
            correlation_id,
            idempotency_key,
            created_at_ms,
        ) in rows
        {
            events.push(EventRow {
                seq,
                event_type,
                entity_kind,
                entity_id,
                package_id,
                task_id,
                payload: EventPayload::from_value(serde_json::from_str(&payload_json)?),
                triggered_by,
                correlation_id,
                idempotency_key,
                created_at_ms,
            });
        }
        Ok(events)
    }
}
