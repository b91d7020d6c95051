//! Publish targets for the dispatcher
//!
//! Real social platform APIs sit behind [`Publisher`]. The server ships with a
//! log-only publisher and a signed webhook publisher for handing deliveries to
//! an external integration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::config::{AppConfig, PublisherKind};
use crate::models::{CampaignObject, Publication, SocialAccount};
use crate::services::workflow::post_signed;
use crate::utils::IntegrationError;

/// Everything a publisher needs for one delivery
#[derive(Debug, Clone, Copy)]
pub struct PublishRequest<'a> {
    pub publication: &'a Publication,
    pub object: &'a CampaignObject,
    pub account: &'a SocialAccount,
}

/// Result of a successful delivery
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishReceipt {
    pub external_post_id: Option<String>,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    async fn publish(&self, request: PublishRequest<'_>) -> Result<PublishReceipt, IntegrationError>;
}

/// Records deliveries in the log without contacting any platform
#[derive(Debug, Default)]
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn publish(&self, request: PublishRequest<'_>) -> Result<PublishReceipt, IntegrationError> {
        info!(
            publication_id = %request.publication.id,
            platform = request.account.platform.as_str(),
            account = %request.account.account_name,
            title = %request.object.title,
            "Publication delivered"
        );
        Ok(PublishReceipt {
            external_post_id: Some(format!("log-{}", request.publication.id)),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishPayload<'a> {
    publication_id: Uuid,
    object_id: Uuid,
    account_id: Uuid,
    platform: &'a str,
    account_name: &'a str,
    title: &'a str,
    content: Option<&'a str>,
    media_url: Option<&'a str>,
    scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    external_post_id: Option<String>,
}

/// Delivers publications as signed JSON webhooks
pub struct WebhookPublisher {
    http_client: Client,
    url: String,
    secret: String,
}

impl WebhookPublisher {
    pub fn new(url: impl Into<String>, secret: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build publish webhook HTTP client")?;

        Ok(Self {
            http_client,
            url: url.into(),
            secret: secret.into(),
        })
    }
}

#[async_trait]
impl Publisher for WebhookPublisher {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn publish(&self, request: PublishRequest<'_>) -> Result<PublishReceipt, IntegrationError> {
        let payload = PublishPayload {
            publication_id: request.publication.id,
            object_id: request.object.id,
            account_id: request.account.id,
            platform: request.account.platform.as_str(),
            account_name: &request.account.account_name,
            title: &request.object.title,
            content: request.object.content.as_deref(),
            media_url: request.object.media_url.as_deref(),
            scheduled_at: request.publication.scheduled_at,
        };
        let body = serde_json::to_string(&payload)
            .map_err(|e| IntegrationError::WebhookDeliveryFailed(e.to_string()))?;

        let response = post_signed(&self.http_client, &self.url, &self.secret, body).await?;

        // Receivers may answer with the platform's post id
        let external_post_id = serde_json::from_str::<PublishResponse>(&response)
            .ok()
            .and_then(|r| r.external_post_id);

        Ok(PublishReceipt { external_post_id })
    }
}

/// Publisher selected by `dispatcher.publisher`
pub fn build_publisher(config: &AppConfig) -> Result<Arc<dyn Publisher>> {
    match config.dispatcher.publisher {
        PublisherKind::Log => Ok(Arc::new(LogPublisher)),
        PublisherKind::Webhook => {
            let url = config
                .dispatcher
                .publish_webhook_url
                .as_deref()
                .context("dispatcher.publish_webhook_url is required for the webhook publisher")?;
            let secret = config
                .publish_webhook_secret()
                .context("A publish webhook secret is required for the webhook publisher")?;
            let timeout = config
                .workflow
                .as_ref()
                .map(|w| w.timeout_secs)
                .unwrap_or(30);
            Ok(Arc::new(WebhookPublisher::new(
                url,
                secret,
                Duration::from_secs(timeout),
            )?))
        }
    }
}
