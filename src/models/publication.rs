//! Scheduled publications

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::Validate;

use super::audit::{opt_string_value, timestamp_value, Auditable};

/// Lifecycle of a publication
///
/// `draft -> scheduled -> publishing -> published | failed`. Only the
/// dispatcher moves a publication out of `scheduled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationStatus {
    Draft,
    Scheduled,
    Publishing,
    Published,
    Failed,
}

impl PublicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationStatus::Draft => "draft",
            PublicationStatus::Scheduled => "scheduled",
            PublicationStatus::Publishing => "publishing",
            PublicationStatus::Published => "published",
            PublicationStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PublicationStatus::Draft),
            "scheduled" => Some(PublicationStatus::Scheduled),
            "publishing" => Some(PublicationStatus::Publishing),
            "published" => Some(PublicationStatus::Published),
            "failed" => Some(PublicationStatus::Failed),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: PublicationStatus) -> bool {
        matches!(
            (self, next),
            (PublicationStatus::Draft, PublicationStatus::Scheduled)
                | (PublicationStatus::Scheduled, PublicationStatus::Publishing)
                | (PublicationStatus::Publishing, PublicationStatus::Published)
                | (PublicationStatus::Publishing, PublicationStatus::Failed)
        )
    }

    /// Whether users may still edit or delete the publication
    pub fn is_editable(&self) -> bool {
        matches!(self, PublicationStatus::Draft | PublicationStatus::Scheduled)
    }
}

impl std::fmt::Display for PublicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A campaign object bound to a social account at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    pub id: Uuid,
    pub campaign_object_id: Uuid,
    pub social_account_id: Uuid,
    pub status: PublicationStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub external_post_id: Option<String>,
    pub error_message: Option<String>,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Publication {
    /// New publication; it starts as `scheduled` when a time is given
    pub fn new(req: CreatePublicationRequest) -> Self {
        let now = Utc::now();
        let status = if req.scheduled_at.is_some() {
            PublicationStatus::Scheduled
        } else {
            PublicationStatus::Draft
        };
        Self {
            id: Uuid::new_v4(),
            campaign_object_id: req.campaign_object_id,
            social_account_id: req.social_account_id,
            status,
            scheduled_at: req.scheduled_at,
            published_at: None,
            external_post_id: None,
            error_message: None,
            claimed_by: None,
            claimed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_update(&self, req: &UpdatePublicationRequest) -> Self {
        let mut updated = self.clone();
        if let Some(account_id) = req.social_account_id {
            updated.social_account_id = account_id;
        }
        if req.scheduled_at.is_some() {
            updated.scheduled_at = req.scheduled_at;
        }
        updated.updated_at = Utc::now();
        updated
    }
}

impl Auditable for Publication {
    const ENTITY_TYPE: &'static str = "Publication";

    fn audit_id(&self) -> Option<Uuid> {
        Some(self.id)
    }

    fn audit_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(
            "campaignObject".into(),
            Value::from(self.campaign_object_id.to_string()),
        );
        fields.insert(
            "socialAccount".into(),
            Value::from(self.social_account_id.to_string()),
        );
        fields.insert("status".into(), Value::from(self.status.as_str()));
        fields.insert("scheduledAt".into(), timestamp_value(self.scheduled_at));
        fields.insert("publishedAt".into(), timestamp_value(self.published_at));
        fields.insert(
            "externalPostId".into(),
            opt_string_value(self.external_post_id.as_deref()),
        );
        fields.insert(
            "errorMessage".into(),
            opt_string_value(self.error_message.as_deref()),
        );
        fields
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePublicationRequest {
    pub campaign_object_id: Uuid,
    pub social_account_id: Uuid,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePublicationRequest {
    pub social_account_id: Option<Uuid>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulePublicationRequest {
    pub scheduled_at: DateTime<Utc>,
}

/// Filters for listing publications, including calendar windows
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublicationQuery {
    pub status: Option<PublicationStatus>,
    pub campaign_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}
