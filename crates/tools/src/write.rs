#![forbid(unsafe_code)]

use crate::error::ToolError;
use crate::{DECIDE_ROLES, Toolbox, WRITE_ROLES};
use pf_core::auth::UserContext;
use pf_core::ids::{CorrelationId, IdempotencyKey};
use pf_core::model::Decision;
use pf_storage::{
    CompleteTaskRequest, CreatePackageRequest, CreateTaskRequest, DecideRequest, EmailIngested,
    IngestEmailRequest, Outcome, PackageCreated, PatchDecided, PatchProposed, ProposePatchRequest,
    TaskCompleted, TaskCreated,
};
use serde_json::Value;
use tracing::{debug, info};

pub(crate) fn parse_key(raw: &str) -> Result<IdempotencyKey, ToolError> {
    IdempotencyKey::try_new(raw).map_err(|err| ToolError::Validation(err.message()))
}

pub(crate) fn parse_correlation(raw: Option<&str>) -> Result<Option<CorrelationId>, ToolError> {
    raw.map(CorrelationId::try_new)
        .transpose()
        .map_err(|err| ToolError::Validation(err.message()))
}

impl Toolbox {
    pub fn create_package(
        &mut self,
        code: &str,
        title: &str,
        data: Value,
        idempotency_key: &str,
        correlation_id: Option<&str>,
        user: &UserContext,
    ) -> Result<Outcome<PackageCreated>, ToolError> {
        user.require_any(WRITE_ROLES)?;
        let outcome = self.store_mut().create_package(CreatePackageRequest {
            code: code.to_string(),
            title: title.to_string(),
            data,
            idempotency_key: parse_key(idempotency_key)?,
            correlation_id: parse_correlation(correlation_id)?,
            triggered_by: user.user_id().to_string(),
        })?;
        if outcome.replayed {
            debug!(package_id = %outcome.value.package.id, "create_package replayed");
        } else {
            info!(
                package_id = %outcome.value.package.id,
                code = %outcome.value.package.code,
                event_id = %outcome.value.event.event_id(),
                "package created"
            );
        }
        Ok(outcome)
    }

    pub fn create_task(
        &mut self,
        package_id: &str,
        title: &str,
        due_at_ms: Option<i64>,
        assignee_id: Option<&str>,
        source_id: Option<&str>,
        correlation_id: &str,
        idempotency_key: &str,
        user: &UserContext,
    ) -> Result<Outcome<TaskCreated>, ToolError> {
        user.require_any(WRITE_ROLES)?;
        let correlation_id = CorrelationId::try_new(correlation_id)
            .map_err(|err| ToolError::Validation(err.message()))?;
        let outcome = self.store_mut().create_task(CreateTaskRequest {
            package_id: package_id.to_string(),
            title: title.to_string(),
            due_at_ms,
            assignee_id: assignee_id.map(|s| s.to_string()),
            source_id: source_id.map(|s| s.to_string()),
            correlation_id,
            idempotency_key: parse_key(idempotency_key)?,
            triggered_by: user.user_id().to_string(),
        })?;
        if outcome.replayed {
            debug!(task_id = %outcome.value.task.id, "create_task replayed");
        } else {
            info!(
                task_id = %outcome.value.task.id,
                package_id = %outcome.value.task.package_id,
                event_id = %outcome.value.event.event_id(),
                "task created"
            );
        }
        Ok(outcome)
    }

    pub fn complete_task(
        &mut self,
        task_id: &str,
        idempotency_key: &str,
        user: &UserContext,
    ) -> Result<Outcome<TaskCompleted>, ToolError> {
        user.require_any(WRITE_ROLES)?;
        let outcome = self.store_mut().complete_task(CompleteTaskRequest {
            task_id: task_id.to_string(),
            idempotency_key: parse_key(idempotency_key)?,
            triggered_by: user.user_id().to_string(),
        })?;
        if outcome.replayed {
            debug!(task_id = %outcome.value.task.id, "complete_task replayed");
        } else {
            info!(task_id = %outcome.value.task.id, "task completed");
        }
        Ok(outcome)
    }

    /// First phase of the approval protocol. The proposer becomes
    /// `requested_by`; the package is untouched until an admin decides.
    pub fn propose_patch(
        &mut self,
        package_id: &str,
        patch: Value,
        reason: &str,
        correlation_id: Option<&str>,
        user: &UserContext,
    ) -> Result<PatchProposed, ToolError> {
        user.require_any(WRITE_ROLES)?;
        if !patch.is_object() {
            return Err(ToolError::Validation("patch must be a JSON object"));
        }
        let proposed = self.store_mut().propose_patch(ProposePatchRequest {
            package_id: package_id.to_string(),
            patch,
            reason: reason.to_string(),
            requested_by: user.user_id().to_string(),
            triggered_by: user.user_id().to_string(),
            correlation_id: parse_correlation(correlation_id)?,
        })?;
        info!(
            approval_id = %proposed.approval.id,
            package_id = %proposed.approval.package_id,
            "patch proposed"
        );
        Ok(proposed)
    }

    /// Second phase: admin-only, idempotent per the supplied key.
    pub fn decide(
        &mut self,
        approval_id: &str,
        decision: Decision,
        reason: Option<&str>,
        idempotency_key: &str,
        user: &UserContext,
    ) -> Result<Outcome<PatchDecided>, ToolError> {
        user.require_any(DECIDE_ROLES)?;
        let outcome = self.store_mut().decide(DecideRequest {
            approval_id: approval_id.to_string(),
            decision,
            decided_by: user.user_id().to_string(),
            reason: reason.map(|s| s.to_string()),
            idempotency_key: parse_key(idempotency_key)?,
            triggered_by: user.user_id().to_string(),
            correlation_id: None,
        })?;
        if outcome.replayed {
            debug!(approval_id = %outcome.value.approval.id, "decide replayed");
        } else {
            info!(
                approval_id = %outcome.value.approval.id,
                status = %outcome.value.approval.status,
                "approval decided"
            );
        }
        Ok(outcome)
    }

    /// Ingest one inbound email, keyed by message id. Matched packages get
    /// the event attached; unmatched emails are recorded standalone.
    pub fn ingest_email(
        &mut self,
        message_id: &str,
        sender: &str,
        subject: &str,
        body: &str,
        package_code: Option<&str>,
        user: &UserContext,
    ) -> Result<Outcome<EmailIngested>, ToolError> {
        user.require_any(WRITE_ROLES)?;
        let outcome = self.store_mut().ingest_email(IngestEmailRequest {
            message_id: message_id.to_string(),
            sender: sender.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            package_code: package_code.map(|s| s.to_string()),
            triggered_by: user.user_id().to_string(),
        })?;
        if outcome.replayed {
            debug!(message_id, "ingest_email replayed");
        } else {
            info!(
                message_id,
                attached = outcome.value.attached,
                event_id = %outcome.value.event.event_id(),
                "email ingested"
            );
        }
        Ok(outcome)
    }
}
