#![forbid(unsafe_code)]

use pf_core::auth::PermissionError;
use pf_storage::StoreError;

/// Errors surfaced to the caller of a tool operation. Structured enough for
/// the caller to decide whether to retry (storage), fix the input
/// (validation), or escalate (permission, conflict).
#[derive(Debug)]
pub enum ToolError {
    /// Caller's role set does not satisfy the operation. Never retried.
    Permission(PermissionError),
    /// Referenced entity or approval does not exist.
    NotFound { kind: &'static str, id: String },
    /// The entity's state forbids the operation (e.g. deciding an
    /// already-decided approval with a new idempotency key). A conflict,
    /// not a retryable failure, and distinct from an idempotent replay.
    InvalidState { message: String },
    /// Malformed input, rejected before any event is written.
    Validation(&'static str),
    /// Transient or structural storage failure. Safe to retry with the
    /// same idempotency key.
    Storage(StoreError),
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Permission(err) => write!(f, "permission denied: {err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::InvalidState { message } => write!(f, "invalid state: {message}"),
            Self::Validation(message) => write!(f, "validation: {message}"),
            Self::Storage(err) => write!(f, "storage: {err}"),
        }
    }
}

impl std::error::Error for ToolError {}

impl From<PermissionError> for ToolError {
    fn from(value: PermissionError) -> Self {
        Self::Permission(value)
    }
}

impl From<StoreError> for ToolError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::UnknownPackage { package } => Self::NotFound {
                kind: "package",
                id: package,
            },
            StoreError::UnknownTask { task_id } => Self::NotFound {
                kind: "task",
                id: task_id,
            },
            StoreError::UnknownApproval { approval_id } => Self::NotFound {
                kind: "approval",
                id: approval_id,
            },
            StoreError::ApprovalAlreadyDecided {
                approval_id,
                status,
            } => Self::InvalidState {
                message: format!("approval {approval_id} already {status}"),
            },
            StoreError::InvalidInput(message) => Self::Validation(message),
            other => Self::Storage(other),
        }
    }
}
