#![forbid(unsafe_code)]

use pf_core::model::EventType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Typed event payloads, one variant per event type. `Raw` exists only for
/// stored payloads written by a schema this build does not know; the write
/// path refuses to append it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    PackageCreated {
        code: String,
        title: String,
    },
    TaskCreated {
        title: String,
        due_at_ms: Option<i64>,
        assignee_id: Option<String>,
        source_id: Option<String>,
    },
    TaskCompleted {
        title: String,
    },
    TaskEscalated {
        task_title: String,
        due_at_ms: Option<i64>,
        days_overdue: Option<i64>,
        assignee_id: Option<String>,
    },
    ApprovalCreated {
        patch: Value,
        reason: String,
        requested_by: String,
    },
    ApprovalDecided {
        decision: String,
        decided_by: String,
        reason: Option<String>,
    },
    PackagePatched {
        patch: Value,
        approval_id: String,
        approved_by: String,
    },
    EmailIngested {
        message_id: String,
        sender: String,
        subject: String,
        body_len: usize,
        package_code: Option<String>,
        attached: bool,
    },
    Raw {
        data: Value,
    },
}

impl EventPayload {
    pub fn event_type(&self) -> Option<EventType> {
        match self {
            Self::PackageCreated { .. } => Some(EventType::PackageCreated),
            Self::TaskCreated { .. } => Some(EventType::TaskCreated),
            Self::TaskCompleted { .. } => Some(EventType::TaskCompleted),
            Self::TaskEscalated { .. } => Some(EventType::TaskEscalated),
            Self::ApprovalCreated { .. } => Some(EventType::ApprovalCreated),
            Self::ApprovalDecided { .. } => Some(EventType::ApprovalDecided),
            Self::PackagePatched { .. } => Some(EventType::PackagePatched),
            Self::EmailIngested { .. } => Some(EventType::EmailIngested),
            Self::Raw { .. } => None,
        }
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Lossless read path: unknown or legacy payload shapes come back as
    /// `Raw` instead of failing the whole query.
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value::<Self>(value.clone()) {
            Ok(payload) => payload,
            Err(_) => Self::Raw { data: value },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_round_trips_with_kind_tag() {
        let payload = EventPayload::PackagePatched {
            patch: json!({"status": "awarded"}),
            approval_id: "APR-000001".to_string(),
            approved_by: "u_admin".to_string(),
        };
        let value = payload.to_value().expect("serialize");
        assert_eq!(value["kind"], "package_patched");
        assert_eq!(EventPayload::from_value(value), payload);
    }

    #[test]
    fn unknown_shapes_fall_back_to_raw() {
        let value = json!({"kind": "something_else", "x": 1});
        match EventPayload::from_value(value.clone()) {
            EventPayload::Raw { data } => assert_eq!(data, value),
            other => panic!("expected raw fallback, got {other:?}"),
        }
    }

    #[test]
    fn typed_variants_report_their_event_type() {
        let payload = EventPayload::TaskEscalated {
            task_title: "t".to_string(),
            due_at_ms: None,
            days_overdue: Some(3),
            assignee_id: None,
        };
        assert_eq!(payload.event_type(), Some(EventType::TaskEscalated));
        assert_eq!(
            EventPayload::Raw { data: Value::Null }.event_type(),
            None
        );
    }
}
