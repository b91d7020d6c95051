//! Workflow trigger client
//!
//! Image and video generation runs in an external automation system. Jobs are
//! handed over as JSON webhooks signed with HMAC-SHA256 over the exact body
//! bytes; the hex digest travels in `X-Webhook-Signature`.

use std::time::Duration;

use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use reqwest::{header::CONTENT_TYPE, Client};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::WorkflowConfig;
use crate::models::GenerationKind;
use crate::utils::IntegrationError;

/// Header carrying the hex HMAC-SHA256 of the request body
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

type HmacSha256 = Hmac<Sha256>;

/// Body sent to the workflow service; field order is part of the signature
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowPayload<'a> {
    pub job_id: Uuid,
    pub object_id: Uuid,
    #[serde(rename = "type")]
    pub kind: GenerationKind,
    pub prompt: &'a str,
    pub options: &'a Value,
}

/// Hex HMAC-SHA256 of `body` under `secret`
pub fn sign(secret: &str, body: &[u8]) -> Result<String, IntegrationError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| IntegrationError::SignatureComputationError(e.to_string()))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a signature produced by [`sign`]; a `sha256=` prefix is accepted
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let signature = signature.trim();
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);

    let signature_bytes = match hex::decode(signature) {
        Ok(b) => b,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };

    mac.update(body);
    mac.verify_slice(&signature_bytes).is_ok()
}

/// POST `body` with its signature; only the transport status is checked.
///
/// Returns the response body for callers that want to inspect it.
pub(crate) async fn post_signed(
    client: &Client,
    url: &str,
    secret: &str,
    body: String,
) -> Result<String, IntegrationError> {
    let signature = sign(secret, body.as_bytes())?;

    let response = client
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(body)
        .send()
        .await
        .map_err(|e| IntegrationError::WebhookDeliveryFailed(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(IntegrationError::WebhookDeliveryFailed(format!(
            "{} returned {}: {}",
            url,
            status.as_u16(),
            body
        )));
    }

    Ok(response.text().await.unwrap_or_default())
}

/// Reachability check used by the health endpoint.
///
/// Any HTTP answer counts as reachable; endpoints that only accept POST
/// usually reply 404 or 405 to a HEAD request.
pub(crate) async fn probe_endpoint(client: &Client, url: &str) -> Result<u16, String> {
    client
        .head(url)
        .timeout(PROBE_TIMEOUT)
        .send()
        .await
        .map(|response| response.status().as_u16())
        .map_err(|e| e.to_string())
}

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the external image/video workflow
pub struct WorkflowClient {
    http_client: Client,
    config: WorkflowConfig,
}

impl WorkflowClient {
    pub fn new(config: WorkflowConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build workflow HTTP client")?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn webhook_secret(&self) -> &str {
        &self.config.webhook_secret
    }

    /// Whether the workflow service answers at its base URL
    pub async fn probe(&self) -> Result<u16, String> {
        probe_endpoint(&self.http_client, &self.config.base_url).await
    }

    fn endpoint(&self, kind: GenerationKind) -> String {
        format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            kind.webhook_path()
        )
    }

    /// Hand a generation job to the workflow service
    pub async fn trigger(
        &self,
        kind: GenerationKind,
        job_id: Uuid,
        object_id: Uuid,
        prompt: &str,
        options: &Value,
    ) -> Result<(), IntegrationError> {
        let payload = WorkflowPayload {
            job_id,
            object_id,
            kind,
            prompt,
            options,
        };
        let body = serde_json::to_string(&payload)
            .map_err(|e| IntegrationError::WebhookDeliveryFailed(e.to_string()))?;
        let url = self.endpoint(kind);

        match post_signed(&self.http_client, &url, &self.config.webhook_secret, body).await {
            Ok(_) => {
                info!(%job_id, %object_id, kind = kind.as_str(), "Workflow triggered");
                Ok(())
            }
            Err(e) => {
                warn!(%job_id, kind = kind.as_str(), error = %e, "Workflow trigger failed");
                Err(e)
            }
        }
    }
}
