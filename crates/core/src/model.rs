#![forbid(unsafe_code)]

/// Kinds of entities an event or memory can be attached to.
///
/// `Email` exists for ingested messages that could not be matched to a
/// package; they are recorded as standalone events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Package,
    Task,
    Approval,
    Email,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Package => "package",
            Self::Task => "task",
            Self::Approval => "approval",
            Self::Email => "email",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "package" => Some(Self::Package),
            "task" => Some(Self::Task),
            "approval" => Some(Self::Approval),
            "email" => Some(Self::Email),
            _ => None,
        }
    }
}

/// Closed set of event types. Events are the only legitimate origin of
/// entity mutation; adding a variant here means adding a write path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    PackageCreated,
    TaskCreated,
    TaskCompleted,
    TaskEscalated,
    ApprovalCreated,
    ApprovalDecided,
    PackagePatched,
    EmailIngested,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PackageCreated => "package_created",
            Self::TaskCreated => "task_created",
            Self::TaskCompleted => "task_completed",
            Self::TaskEscalated => "task_escalated",
            Self::ApprovalCreated => "approval_created",
            Self::ApprovalDecided => "approval_decided",
            Self::PackagePatched => "package_patched",
            Self::EmailIngested => "email_ingested",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "package_created" => Some(Self::PackageCreated),
            "task_created" => Some(Self::TaskCreated),
            "task_completed" => Some(Self::TaskCompleted),
            "task_escalated" => Some(Self::TaskEscalated),
            "approval_created" => Some(Self::ApprovalCreated),
            "approval_decided" => Some(Self::ApprovalDecided),
            "package_patched" => Some(Self::PackagePatched),
            "email_ingested" => Some(Self::EmailIngested),
            _ => None,
        }
    }
}

/// Approval state machine: `pending -> approved` or `pending -> rejected`,
/// exactly once. Decided approvals are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn resulting_status(&self) -> ApprovalStatus {
        match self {
            Self::Approved => ApprovalStatus::Approved,
            Self::Rejected => ApprovalStatus::Rejected,
        }
    }
}

/// Task lifecycle is soft: rows are never deleted, only moved through
/// these states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Pending,
    Escalated,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Escalated => "escalated",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "escalated" => Some(Self::Escalated),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Tag for memory annotations. Advisory data, not part of the audit trail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemoryType {
    Context,
    Decision,
    Analysis,
    Integration,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Context => "context",
            Self::Decision => "decision",
            Self::Analysis => "analysis",
            Self::Integration => "integration",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "context" => Some(Self::Context),
            "decision" => Some(Self::Decision),
            "analysis" => Some(Self::Analysis),
            "integration" => Some(Self::Integration),
            _ => None,
        }
    }
}

/// Roles are additive capability sets, not a hierarchy. Authorization is
/// "at least one matching role" against a per-operation required set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Admin,
    Analyst,
    Operator,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Analyst => "analyst",
            Self::Operator => "operator",
            Self::Viewer => "viewer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "analyst" => Some(Self::Analyst),
            "operator" => Some(Self::Operator),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_round_trip_through_strings() {
        for event_type in [
            EventType::PackageCreated,
            EventType::TaskCreated,
            EventType::TaskCompleted,
            EventType::TaskEscalated,
            EventType::ApprovalCreated,
            EventType::ApprovalDecided,
            EventType::PackagePatched,
            EventType::EmailIngested,
        ] {
            assert_eq!(EventType::parse(event_type.as_str()), Some(event_type));
        }
        assert_eq!(EventType::parse("memory_stored"), None);
    }

    #[test]
    fn approval_terminality() {
        assert!(!ApprovalStatus::Pending.is_terminal());
        assert!(ApprovalStatus::Approved.is_terminal());
        assert!(ApprovalStatus::Rejected.is_terminal());
    }

    #[test]
    fn decision_maps_to_status() {
        assert_eq!(
            Decision::Approved.resulting_status(),
            ApprovalStatus::Approved
        );
        assert_eq!(
            Decision::Rejected.resulting_status(),
            ApprovalStatus::Rejected
        );
    }
}
