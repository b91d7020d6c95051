//! Content generation client
//!
//! Wraps the text generation API (Anthropic Messages format). The system
//! instruction and token budget are derived deterministically from the
//! content type and the caller's options.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::GenerationConfig;
use crate::models::{ContentType, GeneratedContent, GenerationOptions};
use crate::services::workflow::probe_endpoint;
use crate::utils::IntegrationError;

const SERVICE_NAME: &str = "generation API";

const NO_PREAMBLE: &str =
    "Respond with the requested content only, without any preamble, explanation or closing remarks.";

/// Base token budget for a content type at medium length
fn base_budget(content_type: ContentType) -> u32 {
    match content_type {
        ContentType::Post => 500,
        ContentType::Article => 4096,
        ContentType::Advertisement => 1000,
        ContentType::Other => 2000,
    }
}

/// Maximum output tokens for a request
pub fn token_budget(content_type: ContentType, options: &GenerationOptions) -> u32 {
    let factor = options.length.unwrap_or_default().budget_factor();
    (base_budget(content_type) as f64 * factor) as u32
}

/// Build the system instruction for a request
pub fn build_system_prompt(content_type: ContentType, options: &GenerationOptions) -> String {
    let mut parts = vec![match content_type {
        ContentType::Post => {
            "You are an expert social media copywriter. Write an engaging social media post."
        }
        ContentType::Article => {
            "You are an experienced content writer. Write a well-structured, informative article."
        }
        ContentType::Advertisement => {
            "You are an advertising copywriter. Write persuasive ad copy with a clear call to action."
        }
        ContentType::Other => {
            "You are a marketing content writer. Write clear, high-quality marketing content."
        }
    }
    .to_string()];

    if let Some(tone) = options.tone.as_deref().filter(|t| !t.trim().is_empty()) {
        parts.push(format!("Use a {} tone.", tone.trim()));
    }
    if let Some(length) = options.length {
        parts.push(format!("Keep the length {}.", length.as_str()));
    }
    if let Some(platform) = options.platform.as_deref().filter(|p| !p.trim().is_empty()) {
        parts.push(format!("Optimize the content for {}.", platform.trim()));
    }
    if let Some(language) = options.language.as_deref().filter(|l| !l.trim().is_empty()) {
        parts.push(format!("Write in {}.", language.trim()));
    }
    parts.push(NO_PREAMBLE.to_string());

    parts.join(" ")
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: String,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
}

/// Client for the text generation API
pub struct GenerationClient {
    http_client: Client,
    config: GenerationConfig,
}

impl GenerationClient {
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build generation HTTP client")?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Whether the generation API answers at its configured URL
    pub async fn probe(&self) -> Result<u16, String> {
        probe_endpoint(&self.http_client, &self.config.api_url).await
    }

    /// Generate text for `prompt`. Makes exactly one request.
    pub async fn generate(
        &self,
        content_type: ContentType,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GeneratedContent, IntegrationError> {
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: token_budget(content_type, options),
            system: build_system_prompt(content_type, options),
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        debug!(
            content_type = content_type.as_str(),
            max_tokens = request.max_tokens,
            "Requesting content generation"
        );

        let response = self
            .http_client
            .post(&self.config.api_url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&request)
            .send()
            .await
            .map_err(|e| IntegrationError::GenerationUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Generation API returned an error");
            return Err(IntegrationError::GenerationUnavailable(format!(
                "status {}: {}",
                status.as_u16(),
                body
            )));
        }

        let body: MessagesResponse =
            response
                .json()
                .await
                .map_err(|e| IntegrationError::InvalidResponse {
                    service: SERVICE_NAME.to_string(),
                    message: e.to_string(),
                })?;

        let generated = parse_response(body)?;
        info!(
            content_type = content_type.as_str(),
            tokens_used = generated.tokens_used,
            "Content generated"
        );
        Ok(generated)
    }
}

fn parse_response(body: MessagesResponse) -> Result<GeneratedContent, IntegrationError> {
    let texts: Vec<String> = body.content.into_iter().filter_map(|b| b.text).collect();
    if texts.is_empty() {
        return Err(IntegrationError::InvalidResponse {
            service: SERVICE_NAME.to_string(),
            message: "response contained no text content".to_string(),
        });
    }

    let tokens_used = body
        .usage
        .map(|u| u.input_tokens.unwrap_or(0).saturating_add(u.output_tokens.unwrap_or(0)))
        .unwrap_or(0);

    Ok(GeneratedContent {
        content: texts.concat(),
        tokens_used,
    })
}
