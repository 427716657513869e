#![forbid(unsafe_code)]

use super::*;
use pf_core::model::{ApprovalStatus, Decision, EntityKind};
use rusqlite::{Connection, OptionalExtension, Transaction, params};

impl SqliteStore {
    /// First phase of the approval protocol. Creates a pending approval and
    /// its `approval_created` event; the package itself is untouched until a
    /// decision. Intentionally not idempotency-guarded: re-proposing makes
    /// a new, distinct approval.
    pub fn propose_patch(
        &mut self,
        request: ProposePatchRequest,
    ) -> Result<PatchProposed, StoreError> {
        if !request.patch.is_object() {
            return Err(StoreError::InvalidInput("patch must be a JSON object"));
        }
        if request.reason.trim().is_empty() {
            return Err(StoreError::InvalidInput("proposal reason must not be empty"));
        }

        let now_ms = now_ms();
        let tx = self.conn.transaction()?;

        if read_package_tx(&tx, &request.package_id)?.is_none() {
            return Err(StoreError::UnknownPackage {
                package: request.package_id,
            });
        }

        let approval_id = mint_id_tx(&tx, "APR", "approval_seq")?;
        let correlation_id = request
            .correlation_id
            .map(|id| id.into_string())
            .unwrap_or_else(|| format!("approval-{approval_id}"));

        let payload = EventPayload::ApprovalCreated {
            patch: request.patch.clone(),
            reason: request.reason.clone(),
            requested_by: request.requested_by.clone(),
        };
        let event = insert_event_tx(
            &tx,
            EventInsert {
                entity_kind: EntityKind::Approval,
                entity_id: &approval_id,
                package_id: Some(&request.package_id),
                task_id: None,
                payload: &payload,
                triggered_by: &request.triggered_by,
                correlation_id: Some(&correlation_id),
                idempotency_key: None,
                created_at_ms: now_ms,
            },
        )?;

        tx.execute(
            r#"
            INSERT INTO approvals(id, package_id, patch_json, reason, requested_by,
                                  status, created_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                approval_id,
                request.package_id,
                request.patch.to_string(),
                request.reason,
                request.requested_by,
                ApprovalStatus::Pending.as_str(),
                now_ms
            ],
        )?;
        tx.commit()?;

        Ok(PatchProposed {
            approval: ApprovalRow {
                id: approval_id,
                package_id: request.package_id,
                patch: request.patch,
                reason: request.reason,
                requested_by: request.requested_by,
                status: ApprovalStatus::Pending.as_str().to_string(),
                decided_by: None,
                decision_reason: None,
                created_at_ms: now_ms,
                decided_at_ms: None,
            },
            event,
        })
    }

    /// Second phase: the pending -> decided transition, exactly once.
    ///
    /// Replaying the same idempotency key returns the first outcome from the
    /// ledger. A *new* key against an already-decided approval is a conflict
    /// and fails with `ApprovalAlreadyDecided`.
    pub fn decide(&mut self, request: DecideRequest) -> Result<Outcome<PatchDecided>, StoreError> {
        let key = request.idempotency_key.as_str();
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;

        if let Some(cached) = idempotency_fetch(&tx, key, OP_DECIDE)? {
            return Ok(Outcome {
                replayed: true,
                value: serde_json::from_value(cached)?,
            });
        }

        let Some(mut approval) = read_approval_tx(&tx, &request.approval_id)? else {
            return Err(StoreError::UnknownApproval {
                approval_id: request.approval_id,
            });
        };
        if approval.status != ApprovalStatus::Pending.as_str() {
            return Err(StoreError::ApprovalAlreadyDecided {
                approval_id: approval.id,
                status: approval.status,
            });
        }

        let correlation_id = request
            .correlation_id
            .map(|id| id.into_string())
            .unwrap_or_else(|| format!("approval-{}", approval.id));

        let mut package = None;
        let mut patch_event = None;
        if request.decision == Decision::Approved {
            let Some(current) = read_package_tx(&tx, &approval.package_id)? else {
                return Err(StoreError::UnknownPackage {
                    package: approval.package_id,
                });
            };

            let payload = EventPayload::PackagePatched {
                patch: approval.patch.clone(),
                approval_id: approval.id.clone(),
                approved_by: request.decided_by.clone(),
            };
            patch_event = Some(insert_event_tx(
                &tx,
                EventInsert {
                    entity_kind: EntityKind::Package,
                    entity_id: &approval.package_id,
                    package_id: Some(&approval.package_id),
                    task_id: None,
                    payload: &payload,
                    triggered_by: &request.triggered_by,
                    correlation_id: Some(&correlation_id),
                    idempotency_key: Some(key),
                    created_at_ms: now_ms,
                },
            )?);

            let merged = shallow_merge(current.data.clone(), &approval.patch);
            tx.execute(
                "UPDATE packages SET data_json=?2, updated_at_ms=?3 WHERE id=?1",
                params![approval.package_id, merged.to_string(), now_ms],
            )?;
            package = Some(PackageRow {
                data: merged,
                updated_at_ms: now_ms,
                ..current
            });
        }

        let status = request.decision.resulting_status();
        let payload = EventPayload::ApprovalDecided {
            decision: request.decision.as_str().to_string(),
            decided_by: request.decided_by.clone(),
            reason: request.reason.clone(),
        };
        let decision_event = insert_event_tx(
            &tx,
            EventInsert {
                entity_kind: EntityKind::Approval,
                entity_id: &approval.id,
                package_id: Some(&approval.package_id),
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
            UPDATE approvals
            SET status=?2, decided_by=?3, decision_reason=?4, decided_at_ms=?5
            WHERE id=?1
            "#,
            params![
                approval.id,
                status.as_str(),
                request.decided_by,
                request.reason,
                now_ms
            ],
        )?;
        approval.status = status.as_str().to_string();
        approval.decided_by = Some(request.decided_by);
        approval.decision_reason = request.reason;
        approval.decided_at_ms = Some(now_ms);

        let result = PatchDecided {
            approval,
            package,
            patch_event,
            decision_event,
        };
        let result_json = serde_json::to_value(&result)?;
        if !idempotency_record_tx(&tx, key, OP_DECIDE, &result_json, now_ms)? {
            drop(tx);
            return self.replay(key, OP_DECIDE);
        }
        tx.commit()?;
        Ok(Outcome {
            replayed: false,
            value: result,
        })
    }

    pub fn get_approval(&self, approval_id: &str) -> Result<Option<ApprovalRow>, StoreError> {
        read_approval(&self.conn, approval_id)
    }
}

fn read_approval(conn: &Connection, approval_id: &str) -> Result<Option<ApprovalRow>, StoreError> {
    let row = conn
        .query_row(
            r#"
            SELECT id, package_id, patch_json, reason, requested_by, status,
                   decided_by, decision_reason, created_at_ms, decided_at_ms
            FROM approvals
            WHERE id=?1
            "#,
            params![approval_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, i64>(8)?,
                    row.get::<_, Option<i64>>(9)?,
                ))
            },
        )
        .optional()?;
    match row {
        Some((
            id,
            package_id,
            patch_json,
            reason,
            requested_by,
            status,
            decided_by,
            decision_reason,
            created_at_ms,
            decided_at_ms,
        )) => Ok(Some(ApprovalRow {
            id,
            package_id,
            patch: serde_json::from_str(&patch_json)?,
            reason,
            requested_by,
            status,
            decided_by,
            decision_reason,
            created_at_ms,
            decided_at_ms,
        })),
        None => Ok(None),
    }
}

fn read_approval_tx(
    tx: &Transaction<'_>,
    approval_id: &str,
) -> Result<Option<ApprovalRow>, StoreError> {
    read_approval(tx, approval_id)
}
