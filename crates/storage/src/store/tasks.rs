#![forbid(unsafe_code)]

use super::*;
use pf_core::model::{EntityKind, TaskStatus};
use rusqlite::{OptionalExtension, Transaction, params};

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

impl SqliteStore {
    pub fn create_task(
        &mut self,
        request: CreateTaskRequest,
    ) -> Result<Outcome<TaskCreated>, StoreError> {
        if request.title.trim().is_empty() {
            return Err(StoreError::InvalidInput("task title must not be empty"));
        }

        let key = request.idempotency_key.as_str();
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;

        if let Some(cached) = idempotency_fetch(&tx, key, OP_CREATE_TASK)? {
            return Ok(Outcome {
                replayed: true,
                value: serde_json::from_value(cached)?,
            });
        }

        if read_package_tx(&tx, &request.package_id)?.is_none() {
            return Err(StoreError::UnknownPackage {
                package: request.package_id,
            });
        }

        let task_id = mint_id_tx(&tx, "TSK", "task_seq")?;
        let correlation_id = request.correlation_id.into_string();

        let payload = EventPayload::TaskCreated {
            title: request.title.clone(),
            due_at_ms: request.due_at_ms,
            assignee_id: request.assignee_id.clone(),
            source_id: request.source_id.clone(),
        };
        let event = insert_event_tx(
            &tx,
            EventInsert {
                entity_kind: EntityKind::Task,
                entity_id: &task_id,
                package_id: Some(&request.package_id),
                task_id: Some(&task_id),
                payload: &payload,
                triggered_by: &request.triggered_by,
                correlation_id: Some(&correlation_id),
                idempotency_key: Some(key),
                created_at_ms: now_ms,
            },
        )?;

        tx.execute(
            r#"
            INSERT INTO tasks(id, package_id, title, due_at_ms, assignee_id, source_id,
                              correlation_id, status, created_at_ms, updated_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                task_id,
                request.package_id,
                request.title,
                request.due_at_ms,
                request.assignee_id,
                request.source_id,
                correlation_id,
                TaskStatus::Pending.as_str(),
                now_ms,
                now_ms
            ],
        )?;

        let result = TaskCreated {
            task: TaskRow {
                id: task_id,
                package_id: request.package_id,
                title: request.title,
                due_at_ms: request.due_at_ms,
                assignee_id: request.assignee_id,
                source_id: request.source_id,
                correlation_id: Some(correlation_id),
                status: TaskStatus::Pending.as_str().to_string(),
                created_at_ms: now_ms,
                updated_at_ms: now_ms,
            },
            event,
        };

        let result_json = serde_json::to_value(&result)?;
        if !idempotency_record_tx(&tx, key, OP_CREATE_TASK, &result_json, now_ms)? {
            drop(tx);
            return self.replay(key, OP_CREATE_TASK);
        }
        tx.commit()?;
        Ok(Outcome {
            replayed: false,
            value: result,
        })
    }

    pub fn complete_task(
        &mut self,
        request: CompleteTaskRequest,
    ) -> Result<Outcome<TaskCompleted>, StoreError> {
        let key = request.idempotency_key.as_str();
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;

        if let Some(cached) = idempotency_fetch(&tx, key, OP_COMPLETE_TASK)? {
            return Ok(Outcome {
                replayed: true,
                value: serde_json::from_value(cached)?,
            });
        }

        let Some(mut task) = read_task_tx(&tx, &request.task_id)? else {
            return Err(StoreError::UnknownTask {
                task_id: request.task_id,
            });
        };

        let payload = EventPayload::TaskCompleted {
            title: task.title.clone(),
        };
        let event = insert_event_tx(
            &tx,
            EventInsert {
                entity_kind: EntityKind::Task,
                entity_id: &task.id,
                package_id: Some(&task.package_id),
                task_id: Some(&task.id),
                payload: &payload,
                triggered_by: &request.triggered_by,
                correlation_id: task.correlation_id.as_deref(),
                idempotency_key: Some(key),
                created_at_ms: now_ms,
            },
        )?;

        tx.execute(
            "UPDATE tasks SET status=?2, updated_at_ms=?3 WHERE id=?1",
            params![task.id, TaskStatus::Completed.as_str(), now_ms],
        )?;
        task.status = TaskStatus::Completed.as_str().to_string();
        task.updated_at_ms = now_ms;

        let result = TaskCompleted { task, event };
        let result_json = serde_json::to_value(&result)?;
        if !idempotency_record_tx(&tx, key, OP_COMPLETE_TASK, &result_json, now_ms)? {
            drop(tx);
            return self.replay(key, OP_COMPLETE_TASK);
        }
        tx.commit()?;
        Ok(Outcome {
            replayed: false,
            value: result,
        })
    }

    /// The scheduler's entrypoint for one task. The key is derived from the
    /// task id, so however many times the sweep re-delivers, the escalation
    /// happens once and every later call replays the first outcome.
    pub fn escalate_task(
        &mut self,
        request: EscalateTaskRequest,
    ) -> Result<Outcome<TaskEscalated>, StoreError> {
        let key = format!("escalate-task-{}", request.task_id);
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;

        if let Some(cached) = idempotency_fetch(&tx, &key, OP_ESCALATE_TASK)? {
            return Ok(Outcome {
                replayed: true,
                value: serde_json::from_value(cached)?,
            });
        }

        let Some(mut task) = read_task_tx(&tx, &request.task_id)? else {
            return Err(StoreError::UnknownTask {
                task_id: request.task_id,
            });
        };

        let days_overdue = task
            .due_at_ms
            .map(|due| (request.now_ms - due).max(0) / MS_PER_DAY);
        let correlation_id = request
            .correlation_id
            .map(|id| id.into_string())
            .unwrap_or_else(|| format!("escalation-{}", task.id));

        let payload = EventPayload::TaskEscalated {
            task_title: task.title.clone(),
            due_at_ms: task.due_at_ms,
            days_overdue,
            assignee_id: task.assignee_id.clone(),
        };
        let event = insert_event_tx(
            &tx,
            EventInsert {
                entity_kind: EntityKind::Task,
                entity_id: &task.id,
                package_id: Some(&task.package_id),
                task_id: Some(&task.id),
                payload: &payload,
                triggered_by: &request.triggered_by,
                correlation_id: Some(&correlation_id),
                idempotency_key: Some(&key),
                created_at_ms: now_ms,
            },
        )?;

        tx.execute(
            "UPDATE tasks SET status=?2, updated_at_ms=?3 WHERE id=?1",
            params![task.id, TaskStatus::Escalated.as_str(), now_ms],
        )?;
        task.status = TaskStatus::Escalated.as_str().to_string();
        task.updated_at_ms = now_ms;

        let result = TaskEscalated {
            task,
            event,
            days_overdue,
        };
        let result_json = serde_json::to_value(&result)?;
        if !idempotency_record_tx(&tx, &key, OP_ESCALATE_TASK, &result_json, now_ms)? {
            drop(tx);
            return self.replay(&key, OP_ESCALATE_TASK);
        }
        tx.commit()?;
        Ok(Outcome {
            replayed: false,
            value: result,
        })
    }

    pub fn get_task(&self, task_id: &str) -> Result<Option<TaskRow>, StoreError> {
        let row = self
            .conn
            .query_row(
                &format!("{TASK_SELECT} WHERE id=?1"),
                params![task_id],
                map_task_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Tasks past due and not completed, oldest due date first. Escalated
    /// tasks stay in the listing; the derived idempotency key is what stops
    /// a second escalation, not this filter.
    pub fn list_overdue_tasks(
        &self,
        now_ms: i64,
        package_id: Option<&str>,
    ) -> Result<Vec<OverdueTaskRow>, StoreError> {
        let sql = format!(
            "{TASK_SELECT} WHERE due_at_ms IS NOT NULL AND due_at_ms < ?1 AND status != ?2 \
             {} ORDER BY due_at_ms ASC",
            if package_id.is_some() {
                "AND package_id = ?3"
            } else {
                ""
            }
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let completed = TaskStatus::Completed.as_str();
        let rows = if let Some(package_id) = package_id {
            stmt.query_map(params![now_ms, completed, package_id], map_task_row)?
                .collect::<Result<Vec<_>, _>>()?
        } else {
            stmt.query_map(params![now_ms, completed], map_task_row)?
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok(rows
            .into_iter()
            .filter_map(|task| {
                let due_at_ms = task.due_at_ms?;
                Some(OverdueTaskRow {
                    id: task.id,
                    package_id: task.package_id,
                    title: task.title,
                    due_at_ms,
                    assignee_id: task.assignee_id,
                    status: task.status,
                    days_overdue: (now_ms - due_at_ms).max(0) / MS_PER_DAY,
                })
            })
            .collect())
    }
}

const TASK_SELECT: &str = "SELECT id, package_id, title, due_at_ms, assignee_id, source_id, \
                           correlation_id, status, created_at_ms, updated_at_ms FROM tasks";

fn map_task_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get(0)?,
        package_id: row.get(1)?,
        title: row.get(2)?,
        due_at_ms: row.get(3)?,
        assignee_id: row.get(4)?,
        source_id: row.get(5)?,
        correlation_id: row.get(6)?,
        status: row.get(7)?,
        created_at_ms: row.get(8)?,
        updated_at_ms: row.get(9)?,
    })
}

pub(crate) fn read_task_tx(
    tx: &Transaction<'_>,
    task_id: &str,
) -> Result<Option<TaskRow>, StoreError> {
    let row = tx
        .query_row(
            &format!("{TASK_SELECT} WHERE id=?1"),
            params![task_id],
            map_task_row,
        )
        .optional()?;
    Ok(row)
}
