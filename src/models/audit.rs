//! Audit log models
//!
//! Every auditable entity exposes its tracked fields through [`Auditable`].
//! References are written as the referenced id, timestamps as RFC 3339 strings
//! and enums as their wire names; bookkeeping timestamps are left out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::utils::validation::{truncate_chars, MAX_USER_AGENT_CHARS};

/// Explicit per-type snapshot contract used by the audit recorder
pub trait Auditable {
    /// Short type name stored in `entity_type`
    const ENTITY_TYPE: &'static str;

    fn audit_id(&self) -> Option<Uuid>;

    fn audit_fields(&self) -> Map<String, Value>;
}

/// Kind of mutation captured by an audit record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(AuditAction::Create),
            "update" => Some(AuditAction::Update),
            "delete" => Some(AuditAction::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable record of one entity mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Auditable for AuditLogEntry {
    const ENTITY_TYPE: &'static str = "AuditLog";

    fn audit_id(&self) -> Option<Uuid> {
        Some(self.id)
    }

    fn audit_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("actor".into(), uuid_value(self.actor_id));
        fields.insert("action".into(), Value::from(self.action.as_str()));
        fields.insert("entityType".into(), Value::from(self.entity_type.clone()));
        fields.insert("entityId".into(), uuid_value(self.entity_id));
        fields
    }
}

/// Filters for listing audit records
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuditLogQuery {
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Who performed a mutation and from where
///
/// Passed explicitly by the caller; background flows use [`AuditContext::system`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditContext {
    pub actor_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditContext {
    /// Context for mutations without a human actor or request
    pub fn system() -> Self {
        Self::default()
    }

    pub fn for_actor(actor_id: Uuid) -> Self {
        Self {
            actor_id: Some(actor_id),
            ..Self::default()
        }
    }

    /// Attach request metadata; the user agent is capped at 500 characters
    pub fn with_request(mut self, ip_address: Option<String>, user_agent: Option<&str>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent.map(|ua| truncate_chars(ua, MAX_USER_AGENT_CHARS));
        self
    }
}

pub(crate) fn uuid_value(id: Option<Uuid>) -> Value {
    id.map(|id| Value::from(id.to_string())).unwrap_or(Value::Null)
}

pub(crate) fn timestamp_value(ts: Option<DateTime<Utc>>) -> Value {
    ts.map(|ts| Value::from(ts.to_rfc3339())).unwrap_or(Value::Null)
}

pub(crate) fn opt_string_value(value: Option<&str>) -> Value {
    value.map(Value::from).unwrap_or(Value::Null)
}
