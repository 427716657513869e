#![forbid(unsafe_code)]

use crate::error::ToolError;
use crate::support::ts_ms_to_rfc3339;
use crate::{READ_ROLES, Toolbox};
use pf_core::auth::UserContext;
use pf_core::model::EntityKind;
use pf_storage::{
    ApprovalRow, EventPayload, EventRow, OverdueTaskRow, PackageRow, TaskRow, TimelineRequest,
};
use serde::Serialize;

const MAX_TIMELINE_LIMIT: usize = 500;

/// One audit timeline entry as handed to callers: the stored event plus a
/// rendered timestamp and its stable event id.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimelineEvent {
    pub event_id: String,
    pub seq: i64,
    pub event_type: String,
    pub entity_kind: String,
    pub entity_id: String,
    pub payload: EventPayload,
    pub triggered_by: String,
    pub correlation_id: Option<String>,
    pub created_at: String,
    pub created_at_ms: i64,
}

impl From<EventRow> for TimelineEvent {
    fn from(event: EventRow) -> Self {
        Self {
            event_id: event.event_id(),
            seq: event.seq,
            event_type: event.event_type,
            entity_kind: event.entity_kind,
            entity_id: event.entity_id,
            payload: event.payload,
            triggered_by: event.triggered_by,
            correlation_id: event.correlation_id,
            created_at: ts_ms_to_rfc3339(event.created_at_ms),
            created_at_ms: event.created_at_ms,
        }
    }
}

impl Toolbox {
    pub fn get_package(
        &self,
        package_id: &str,
        user: &UserContext,
    ) -> Result<PackageRow, ToolError> {
        user.require_any(READ_ROLES)?;
        self.store()
            .get_package(package_id)?
            .ok_or_else(|| ToolError::NotFound {
                kind: "package",
                id: package_id.to_string(),
            })
    }

    pub fn get_package_by_code(
        &self,
        code: &str,
        user: &UserContext,
    ) -> Result<PackageRow, ToolError> {
        user.require_any(READ_ROLES)?;
        self.store()
            .get_package_by_code(code)?
            .ok_or_else(|| ToolError::NotFound {
                kind: "package",
                id: code.to_string(),
            })
    }

    pub fn get_task(&self, task_id: &str, user: &UserContext) -> Result<TaskRow, ToolError> {
        user.require_any(READ_ROLES)?;
        self.store()
            .get_task(task_id)?
            .ok_or_else(|| ToolError::NotFound {
                kind: "task",
                id: task_id.to_string(),
            })
    }

    pub fn get_approval(
        &self,
        approval_id: &str,
        user: &UserContext,
    ) -> Result<ApprovalRow, ToolError> {
        user.require_any(READ_ROLES)?;
        self.store()
            .get_approval(approval_id)?
            .ok_or_else(|| ToolError::NotFound {
                kind: "approval",
                id: approval_id.to_string(),
            })
    }

    pub fn list_overdue_tasks(
        &self,
        now_ms: i64,
        package_id: Option<&str>,
        user: &UserContext,
    ) -> Result<Vec<OverdueTaskRow>, ToolError> {
        user.require_any(READ_ROLES)?;
        Ok(self.store().list_overdue_tasks(now_ms, package_id)?)
    }

    /// Audit timeline for one entity, newest first. `before_seq` restarts
    /// pagination below a previously seen entry.
    pub fn timeline(
        &self,
        entity_kind: EntityKind,
        entity_id: &str,
        limit: usize,
        before_seq: Option<i64>,
        user: &UserContext,
    ) -> Result<Vec<TimelineEvent>, ToolError> {
        user.require_any(READ_ROLES)?;
        if limit == 0 || limit > MAX_TIMELINE_LIMIT {
            return Err(ToolError::Validation("timeline limit must be 1..=500"));
        }
        let events = self.store().timeline(TimelineRequest {
            entity_kind,
            entity_id: entity_id.to_string(),
            limit,
            before_seq,
        })?;
        Ok(events.into_iter().map(TimelineEvent::from).collect())
    }
}
