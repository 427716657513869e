#![forbid(unsafe_code)]

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    Json(serde_json::Error),
    InvalidInput(&'static str),
    UnknownPackage { package: String },
    UnknownTask { task_id: String },
    UnknownApproval { approval_id: String },
    /// The pending -> decided transition already happened. This is a
    /// conflict, not a retryable failure; an idempotent replay of the
    /// original decision never reaches this variant because the ledger
    /// answers first.
    ApprovalAlreadyDecided { approval_id: String, status: String },
    MissingIdempotencyRecord { key: String, operation: &'static str },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::Json(err) => write!(f, "json: {err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::UnknownPackage { package } => write!(f, "unknown package: {package}"),
            Self::UnknownTask { task_id } => write!(f, "unknown task: {task_id}"),
            Self::UnknownApproval { approval_id } => {
                write!(f, "unknown approval: {approval_id}")
            }
            Self::ApprovalAlreadyDecided {
                approval_id,
                status,
            } => write!(f, "approval {approval_id} already {status}"),
            Self::MissingIdempotencyRecord { key, operation } => write!(
                f,
                "idempotency record vanished (key={key}, operation={operation})"
            ),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
