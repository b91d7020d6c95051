//! Social media accounts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::Validate;

use super::audit::Auditable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Facebook,
    Instagram,
    Twitter,
    Linkedin,
    Tiktok,
    Youtube,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Twitter => "twitter",
            Platform::Linkedin => "linkedin",
            Platform::Tiktok => "tiktok",
            Platform::Youtube => "youtube",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "facebook" => Some(Platform::Facebook),
            "instagram" => Some(Platform::Instagram),
            "twitter" => Some(Platform::Twitter),
            "linkedin" => Some(Platform::Linkedin),
            "tiktok" => Some(Platform::Tiktok),
            "youtube" => Some(Platform::Youtube),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A publishing target owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialAccount {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub platform: Platform,
    pub account_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SocialAccount {
    pub fn new(owner_id: Uuid, req: CreateSocialAccountRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            platform: req.platform,
            account_name: req.account_name,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_update(&self, req: &UpdateSocialAccountRequest) -> Self {
        let mut updated = self.clone();
        if let Some(ref name) = req.account_name {
            updated.account_name = name.clone();
        }
        if let Some(active) = req.is_active {
            updated.is_active = active;
        }
        updated.updated_at = Utc::now();
        updated
    }
}

impl Auditable for SocialAccount {
    const ENTITY_TYPE: &'static str = "SocialAccount";

    fn audit_id(&self) -> Option<Uuid> {
        Some(self.id)
    }

    fn audit_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("owner".into(), Value::from(self.owner_id.to_string()));
        fields.insert("platform".into(), Value::from(self.platform.as_str()));
        fields.insert("accountName".into(), Value::from(self.account_name.clone()));
        fields.insert("isActive".into(), Value::from(self.is_active));
        fields
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSocialAccountRequest {
    pub platform: Platform,
    #[validate(length(min = 1, max = 255))]
    pub account_name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateSocialAccountRequest {
    #[validate(length(min = 1, max = 255))]
    pub account_name: Option<String>,
    pub is_active: Option<bool>,
}
