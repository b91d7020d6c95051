//! Campaign models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::Validate;

use super::audit::{opt_string_value, timestamp_value, Auditable};

/// A marketing campaign owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    pub fn new(owner_id: Uuid, req: CreateCampaignRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name: req.name,
            description: req.description,
            starts_at: req.starts_at,
            ends_at: req.ends_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy with the requested changes applied
    pub fn with_update(&self, req: &UpdateCampaignRequest) -> Self {
        let mut updated = self.clone();
        if let Some(ref name) = req.name {
            updated.name = name.clone();
        }
        if let Some(ref description) = req.description {
            updated.description = Some(description.clone()).filter(|d| !d.is_empty());
        }
        if req.starts_at.is_some() {
            updated.starts_at = req.starts_at;
        }
        if req.ends_at.is_some() {
            updated.ends_at = req.ends_at;
        }
        updated.updated_at = Utc::now();
        updated
    }
}

impl Auditable for Campaign {
    const ENTITY_TYPE: &'static str = "Campaign";

    fn audit_id(&self) -> Option<Uuid> {
        Some(self.id)
    }

    fn audit_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("owner".into(), Value::from(self.owner_id.to_string()));
        fields.insert("name".into(), Value::from(self.name.clone()));
        fields.insert(
            "description".into(),
            opt_string_value(self.description.as_deref()),
        );
        fields.insert("startsAt".into(), timestamp_value(self.starts_at));
        fields.insert("endsAt".into(), timestamp_value(self.ends_at));
        fields
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCampaignRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateCampaignRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    /// An empty string clears the description
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}
