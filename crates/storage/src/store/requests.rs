#![forbid(unsafe_code)]

use super::payload::EventPayload;
use pf_core::ids::{CorrelationId, IdempotencyKey};
use pf_core::model::{Decision, EntityKind, MemoryType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Rows: current-state projections as stored. String columns stay strings;
// the closed enums in pf_core parse them where a caller needs the type.
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackageRow {
    pub id: String,
    pub code: String,
    pub title: String,
    pub data: Value,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: String,
    pub package_id: String,
    pub title: String,
    pub due_at_ms: Option<i64>,
    pub assignee_id: Option<String>,
    pub source_id: Option<String>,
    pub correlation_id: Option<String>,
    pub status: String,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub seq: i64,
    pub event_type: String,
    pub entity_kind: String,
    pub entity_id: String,
    pub package_id: Option<String>,
    pub task_id: Option<String>,
    pub payload: EventPayload,
    pub triggered_by: String,
    pub correlation_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub created_at_ms: i64,
}

impl EventRow {
    pub fn event_id(&self) -> String {
        format!("evt_{:016}", self.seq)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRow {
    pub id: String,
    pub package_id: String,
    pub patch: Value,
    pub reason: String,
    pub requested_by: String,
    pub status: String,
    pub decided_by: Option<String>,
    pub decision_reason: Option<String>,
    pub created_at_ms: i64,
    pub decided_at_ms: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryRow {
    pub id: String,
    pub package_id: Option<String>,
    pub entity_kind: String,
    pub entity_id: String,
    pub memory_type: String,
    pub content: String,
    pub metadata: Option<Value>,
    pub source_refs: Option<Vec<String>>,
    pub created_by: String,
    pub created_at_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverdueTaskRow {
    pub id: String,
    pub package_id: String,
    pub title: String,
    pub due_at_ms: i64,
    pub assignee_id: Option<String>,
    pub status: String,
    pub days_overdue: i64,
}

// ---------------------------------------------------------------------------
// Write requests
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CreatePackageRequest {
    pub code: String,
    pub title: String,
    pub data: Value,
    pub idempotency_key: IdempotencyKey,
    pub correlation_id: Option<CorrelationId>,
    pub triggered_by: String,
}

#[derive(Clone, Debug)]
pub struct CreateTaskRequest {
    pub package_id: String,
    pub title: String,
    pub due_at_ms: Option<i64>,
    pub assignee_id: Option<String>,
    pub source_id: Option<String>,
    pub correlation_id: CorrelationId,
    pub idempotency_key: IdempotencyKey,
    pub triggered_by: String,
}

#[derive(Clone, Debug)]
pub struct CompleteTaskRequest {
    pub task_id: String,
    pub idempotency_key: IdempotencyKey,
    pub triggered_by: String,
}

/// The idempotency key is derived from the task id (`escalate-task-{id}`),
/// never caller-supplied, so repeated sweeps collapse onto one escalation.
#[derive(Clone, Debug)]
pub struct EscalateTaskRequest {
    pub task_id: String,
    pub now_ms: i64,
    pub triggered_by: String,
    pub correlation_id: Option<CorrelationId>,
}

/// Key derived from the message id (`email-ingest-{message_id}`).
#[derive(Clone, Debug)]
pub struct IngestEmailRequest {
    pub message_id: String,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub package_code: Option<String>,
    pub triggered_by: String,
}

/// Deliberately no idempotency key: re-proposing creates a new, distinct
/// approval.
#[derive(Clone, Debug)]
pub struct ProposePatchRequest {
    pub package_id: String,
    pub patch: Value,
    pub reason: String,
    pub requested_by: String,
    pub triggered_by: String,
    pub correlation_id: Option<CorrelationId>,
}

#[derive(Clone, Debug)]
pub struct DecideRequest {
    pub approval_id: String,
    pub decision: Decision,
    pub decided_by: String,
    pub reason: Option<String>,
    pub idempotency_key: IdempotencyKey,
    pub triggered_by: String,
    pub correlation_id: Option<CorrelationId>,
}

#[derive(Clone, Debug)]
pub struct StoreMemoryRequest {
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub content: String,
    pub memory_type: MemoryType,
    pub package_id: Option<String>,
    pub metadata: Option<Value>,
    pub source_refs: Option<Vec<String>>,
    pub created_by: String,
}

// ---------------------------------------------------------------------------
// Read requests
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct TimelineRequest {
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub limit: usize,
    /// Restart point for pagination: only events with `seq` strictly below
    /// this are returned. `None` starts from the newest.
    pub before_seq: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct SearchMemoryRequest {
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub query: Option<String>,
    pub top_k: usize,
    pub memory_type: Option<MemoryType>,
}

// ---------------------------------------------------------------------------
// Write results. These are the values recorded in the idempotency ledger,
// so they round-trip through JSON verbatim.
// ---------------------------------------------------------------------------

/// Whether a write executed or was answered from the idempotency ledger.
/// Replays carry the first execution's result unchanged.
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome<T> {
    pub replayed: bool,
    pub value: T,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackageCreated {
    pub package: PackageRow,
    pub event: EventRow,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskCreated {
    pub task: TaskRow,
    pub event: EventRow,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskCompleted {
    pub task: TaskRow,
    pub event: EventRow,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskEscalated {
    pub task: TaskRow,
    pub event: EventRow,
    pub days_overdue: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmailIngested {
    pub event: EventRow,
    pub attached: bool,
    pub package_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatchProposed {
    pub approval: ApprovalRow,
    pub event: EventRow,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatchDecided {
    pub approval: ApprovalRow,
    /// Present only when the decision was `approved`.
    pub package: Option<PackageRow>,
    pub patch_event: Option<EventRow>,
    pub decision_event: EventRow,
}
