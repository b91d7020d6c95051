//! AI content generation and media processing jobs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::Validate;

use super::audit::{opt_string_value, Auditable};
use super::campaign_object::ObjectType;

/// Content type the text generator writes for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Post,
    Article,
    Advertisement,
    #[serde(other)]
    Other,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Post => "post",
            ContentType::Article => "article",
            ContentType::Advertisement => "advertisement",
            ContentType::Other => "other",
        }
    }
}

impl From<ObjectType> for ContentType {
    fn from(object_type: ObjectType) -> Self {
        match object_type {
            ObjectType::Post => ContentType::Post,
            ObjectType::Article => ContentType::Article,
            ObjectType::Advertisement => ContentType::Advertisement,
            ObjectType::Video | ObjectType::Image => ContentType::Other,
        }
    }
}

/// Requested output length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Length {
    Short,
    #[default]
    Medium,
    Long,
}

impl Length {
    pub fn as_str(&self) -> &'static str {
        match self {
            Length::Short => "short",
            Length::Medium => "medium",
            Length::Long => "long",
        }
    }

    /// Multiplier applied to the base token budget
    pub fn budget_factor(&self) -> f64 {
        match self {
            Length::Short => 0.5,
            Length::Medium => 1.0,
            Length::Long => 1.5,
        }
    }
}

/// Optional knobs for text generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct GenerationOptions {
    #[validate(length(max = 100))]
    pub tone: Option<String>,
    pub length: Option<Length>,
    #[validate(length(max = 100))]
    pub platform: Option<String>,
    #[validate(length(max = 50))]
    pub language: Option<String>,
}

/// Generated text with token accounting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub content: String,
    pub tokens_used: u32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateTextRequest {
    pub content_type: ContentType,
    #[validate(length(min = 1, max = 10000))]
    pub prompt: String,
    #[serde(default)]
    #[validate(nested)]
    pub options: GenerationOptions,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateForObjectRequest {
    #[validate(length(min = 1, max = 10000))]
    pub prompt: String,
    #[serde(default)]
    #[validate(nested)]
    pub options: GenerationOptions,
    /// Store the generated text as the object's content
    #[serde(default)]
    pub apply: bool,
}

/// Media produced by the external workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    Image,
    Video,
}

impl GenerationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationKind::Image => "image",
            GenerationKind::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(GenerationKind::Image),
            "video" => Some(GenerationKind::Video),
            _ => None,
        }
    }

    /// Workflow endpoint path for this kind
    pub fn webhook_path(&self) -> &'static str {
        match self {
            GenerationKind::Image => "/image-process",
            GenerationKind::Video => "/video-process",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An image or video request handed to the workflow service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: Uuid,
    pub campaign_object_id: Uuid,
    pub kind: GenerationKind,
    pub prompt: String,
    pub options: Value,
    pub status: JobStatus,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationJob {
    pub fn new(campaign_object_id: Uuid, req: CreateMediaJobRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            campaign_object_id,
            kind: req.kind,
            prompt: req.prompt,
            options: req.options,
            status: JobStatus::Pending,
            result_url: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Auditable for GenerationJob {
    const ENTITY_TYPE: &'static str = "GenerationJob";

    fn audit_id(&self) -> Option<Uuid> {
        Some(self.id)
    }

    fn audit_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(
            "campaignObject".into(),
            Value::from(self.campaign_object_id.to_string()),
        );
        fields.insert("kind".into(), Value::from(self.kind.as_str()));
        fields.insert("prompt".into(), Value::from(self.prompt.clone()));
        fields.insert("options".into(), self.options.clone());
        fields.insert("status".into(), Value::from(self.status.as_str()));
        fields.insert("resultUrl".into(), opt_string_value(self.result_url.as_deref()));
        fields.insert(
            "errorMessage".into(),
            opt_string_value(self.error_message.as_deref()),
        );
        fields
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateMediaJobRequest {
    pub kind: GenerationKind,
    #[validate(length(min = 1, max = 10000))]
    pub prompt: String,
    #[serde(default = "empty_options")]
    pub options: Value,
}

fn empty_options() -> Value {
    Value::Object(Map::new())
}

/// Status report posted back by the workflow service
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowCallback {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub result_url: Option<String>,
    pub error: Option<String>,
}
