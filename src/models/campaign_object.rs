//! Campaign content items

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::Validate;

use super::audit::{opt_string_value, Auditable};

/// Kind of content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Post,
    Article,
    Video,
    Image,
    Advertisement,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Post => "post",
            ObjectType::Article => "article",
            ObjectType::Video => "video",
            ObjectType::Image => "image",
            ObjectType::Advertisement => "advertisement",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "post" => Some(ObjectType::Post),
            "article" => Some(ObjectType::Article),
            "video" => Some(ObjectType::Video),
            "image" => Some(ObjectType::Image),
            "advertisement" => Some(ObjectType::Advertisement),
            _ => None,
        }
    }
}

/// Editorial lifecycle, independent of publications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStatus {
    Draft,
    Review,
    Approved,
}

impl ObjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectStatus::Draft => "draft",
            ObjectStatus::Review => "review",
            ObjectStatus::Approved => "approved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(ObjectStatus::Draft),
            "review" => Some(ObjectStatus::Review),
            "approved" => Some(ObjectStatus::Approved),
            _ => None,
        }
    }

    /// Submit, approve, reject back to draft, or reopen an approved item
    pub fn can_transition_to(&self, next: ObjectStatus) -> bool {
        matches!(
            (self, next),
            (ObjectStatus::Draft, ObjectStatus::Review)
                | (ObjectStatus::Review, ObjectStatus::Approved)
                | (ObjectStatus::Review, ObjectStatus::Draft)
                | (ObjectStatus::Approved, ObjectStatus::Draft)
        )
    }
}

impl std::fmt::Display for ObjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A piece of content belonging to a campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignObject {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub title: String,
    pub object_type: ObjectType,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub status: ObjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CampaignObject {
    pub fn new(req: CreateCampaignObjectRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            campaign_id: req.campaign_id,
            title: req.title,
            object_type: req.object_type,
            content: req.content,
            media_url: req.media_url,
            status: ObjectStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_update(&self, req: &UpdateCampaignObjectRequest) -> Self {
        let mut updated = self.clone();
        if let Some(ref title) = req.title {
            updated.title = title.clone();
        }
        if let Some(ref content) = req.content {
            updated.content = Some(content.clone());
        }
        if let Some(ref media_url) = req.media_url {
            updated.media_url = Some(media_url.clone()).filter(|u| !u.is_empty());
        }
        updated.updated_at = Utc::now();
        updated
    }
}

impl Auditable for CampaignObject {
    const ENTITY_TYPE: &'static str = "CampaignObject";

    fn audit_id(&self) -> Option<Uuid> {
        Some(self.id)
    }

    fn audit_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("campaign".into(), Value::from(self.campaign_id.to_string()));
        fields.insert("title".into(), Value::from(self.title.clone()));
        fields.insert("type".into(), Value::from(self.object_type.as_str()));
        fields.insert("content".into(), opt_string_value(self.content.as_deref()));
        fields.insert("mediaUrl".into(), opt_string_value(self.media_url.as_deref()));
        fields.insert("status".into(), Value::from(self.status.as_str()));
        fields
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCampaignObjectRequest {
    pub campaign_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub object_type: ObjectType,
    #[validate(length(max = 100000))]
    pub content: Option<String>,
    #[validate(url)]
    pub media_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateCampaignObjectRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(max = 100000))]
    pub content: Option<String>,
    /// An empty string clears the media URL
    pub media_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeObjectStatusRequest {
    pub status: ObjectStatus,
}
