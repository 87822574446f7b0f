//! # Audit Trail
//!
//! Every mutation writes an audit entry in the same transaction, carrying
//! before/after snapshots and a field-level diff. A failed audit write aborts
//! the mutation. Failure events (validation rejections, errors) may be
//! recorded best-effort outside the mutation transaction.

pub mod diff;
pub mod writer;

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use diff::{calculate_field_changes, FieldChange};
pub use writer::{log_event_in_tx, log_failure};

/// Kinds of audited events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Create,
    Update,
    Delete,
    StatusChange,
    Assignment,
    System,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::StatusChange => "STATUS_CHANGE",
            Self::Assignment => "ASSIGNMENT",
            Self::System => "SYSTEM",
        }
    }
}

/// Who performed an operation, threaded from the transport layer.
#[derive(Debug, Clone)]
pub struct Actor {
    pub actor_id: String,
    pub actor_type: String,
    pub actor_name: Option<String>,
}

impl Actor {
    pub fn user(actor_id: impl Into<String>, actor_name: Option<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            actor_type: "USER".to_string(),
            actor_name,
        }
    }

    /// Actor recorded on scheduler-driven mutations.
    pub fn system() -> Self {
        Self {
            actor_id: crate::constants::SYSTEM_ACTOR.to_string(),
            actor_type: "SYSTEM".to_string(),
            actor_name: None,
        }
    }
}

/// Request-scoped context attached to every audit entry of an operation.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    pub request_id: Option<String>,
    pub correlation_id: Option<String>,
    pub operation_reason: Option<String>,
}

/// A fully described audit event, ready to persist.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub event_type: EventType,
    pub resource_type: String,
    pub resource_id: String,
    pub record_id: Option<Uuid>,
    pub entity_code: Option<String>,
    pub action_name: String,
    pub before_data: serde_json::Value,
    pub after_data: serde_json::Value,
    pub business_context: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        event_type: EventType,
        resource_type: &str,
        resource_id: &str,
        action_name: &str,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type,
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            record_id: None,
            entity_code: None,
            action_name: action_name.to_string(),
            before_data: serde_json::Value::Object(Default::default()),
            after_data: serde_json::Value::Object(Default::default()),
            business_context: serde_json::Value::Object(Default::default()),
            occurred_at,
        }
    }

    pub fn with_record_id(mut self, record_id: Uuid) -> Self {
        self.record_id = Some(record_id);
        self
    }

    pub fn with_entity_code(mut self, code: &str) -> Self {
        self.entity_code = Some(code.to_string());
        self
    }

    pub fn with_before(mut self, before: serde_json::Value) -> Self {
        self.before_data = before;
        self
    }

    pub fn with_after(mut self, after: serde_json::Value) -> Self {
        self.after_data = after;
        self
    }

    pub fn with_business_context(mut self, context: serde_json::Value) -> Self {
        self.business_context = context;
        self
    }

    /// Whether before and after describe the same state. No-op updates skip
    /// the audit write entirely.
    pub fn is_noop_update(&self) -> bool {
        self.event_type == EventType::Update
            && calculate_field_changes(&self.before_data, &self.after_data).is_empty()
    }
}
