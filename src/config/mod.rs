//! Configuration management
//!
//! This module provides YAML-based configuration management with support for:
//! - Environment variable overrides
//! - Multiple configuration file locations
//! - Default values for all settings
//! - Generation API, workflow webhook and dispatcher settings

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Text generation API (optional; generation endpoints return 503 without it)
    #[serde(default)]
    pub generation: Option<GenerationConfig>,
    /// External automation system for image/video jobs (optional)
    #[serde(default)]
    pub workflow: Option<WorkflowConfig>,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
///
/// Tokens are issued by the identity provider in front of this service;
/// only verification happens here.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Log output target (console or file)
    #[serde(default = "default_log_target")]
    pub target: LogTarget,
    /// Directory for log files (used when target is "file")
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Log file name prefix
    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,
    /// Enable daily log rotation
    #[serde(default = "default_log_rotation")]
    pub daily_rotation: bool,
}

/// Log output target
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Log to console (stdout/stderr) - default for development
    #[default]
    Console,
    /// Log to file with optional rotation - recommended for production
    File,
    /// Log to both console and file
    Both,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_log_target() -> LogTarget {
    LogTarget::Console
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/campaign-hub")
}

fn default_log_prefix() -> String {
    "campaign-hub".to_string()
}

fn default_log_rotation() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            target: default_log_target(),
            log_dir: default_log_dir(),
            log_prefix: default_log_prefix(),
            daily_rotation: default_log_rotation(),
        }
    }
}

/// Text generation API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    pub api_key: String,
    #[serde(default = "default_generation_url")]
    pub api_url: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    /// Value of the `anthropic-version` header
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

fn default_generation_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_generation_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_generation_timeout() -> u64 {
    60
}

/// Workflow webhook configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Base URL; `/image-process` and `/video-process` are appended
    pub base_url: String,
    /// Shared secret for `X-Webhook-Signature`
    pub webhook_secret: String,
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
}

fn default_webhook_timeout() -> u64 {
    30
}

/// How claimed publications are delivered
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum PublisherKind {
    /// Record the delivery without contacting a platform
    #[default]
    Log,
    /// POST a signed JSON payload to `publish_webhook_url`
    Webhook,
}

/// Publication dispatcher configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatcherConfig {
    /// Run the dispatcher inside the server every N seconds (disabled when unset)
    #[serde(default)]
    pub interval_secs: Option<u64>,
    /// Publications claimed per statement; a pass repeats until none are due
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Claims older than this are considered abandoned and failed
    #[serde(default = "default_claim_timeout")]
    pub claim_timeout_secs: u64,
    #[serde(default)]
    pub publisher: PublisherKind,
    #[serde(default)]
    pub publish_webhook_url: Option<String>,
    /// Secret for the publish webhook; falls back to the workflow secret
    #[serde(default)]
    pub publish_webhook_secret: Option<String>,
}

fn default_batch_size() -> u32 {
    100
}

fn default_claim_timeout() -> u64 {
    900
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            interval_secs: None,
            batch_size: default_batch_size(),
            claim_timeout_secs: default_claim_timeout(),
            publisher: PublisherKind::default(),
            publish_webhook_url: None,
            publish_webhook_secret: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production-minimum-32-characters-long".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://./data/campaign-hub.db".to_string(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            logging: LoggingConfig::default(),
            generation: None,
            workflow: None,
            dispatcher: DispatcherConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values
    /// 2. Configuration file (YAML)
    /// 3. Environment variables
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Like [`AppConfig::load`], with an explicit file taking precedence over
    /// the search path
    pub fn load_from(explicit: Option<PathBuf>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let config_path = explicit
            .or_else(|| std::env::var("CAMPAIGN_HUB_CONFIG").map(PathBuf::from).ok())
            .or_else(Self::find_config_file);

        let mut config = match config_path {
            Some(ref path) if path.exists() => Self::from_file(path)?,
            Some(ref path) => {
                eprintln!("[CONFIG] Config file not found: {:?}, using defaults", path);
                AppConfig::default()
            }
            None => {
                eprintln!("[CONFIG] No config file found, using defaults");
                AppConfig::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration file without applying overrides
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        eprintln!("[CONFIG] Loading configuration from: {:?}", path);
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_norway::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Find the configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            PathBuf::from("config.yaml"),
            PathBuf::from("config/config.yaml"),
            PathBuf::from("/etc/campaign-hub/config.yaml"),
            dirs::config_dir()
                .map(|p| p.join("campaign-hub/config.yaml"))
                .unwrap_or_default(),
        ];

        paths.into_iter().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("CAMPAIGN_HUB_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("CAMPAIGN_HUB_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("CAMPAIGN_HUB_LOG_FORMAT") {
            self.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "compact" => LogFormat::Compact,
                _ => LogFormat::Pretty,
            };
        }

        // Generation API overrides
        if let Ok(api_key) = std::env::var("GENERATION_API_KEY") {
            let generation = self.generation.get_or_insert_with(|| GenerationConfig {
                api_key: api_key.clone(),
                api_url: default_generation_url(),
                model: default_generation_model(),
                api_version: default_api_version(),
                timeout_secs: default_generation_timeout(),
            });
            generation.api_key = api_key;
        }
        if let Some(ref mut generation) = self.generation {
            if let Ok(url) = std::env::var("GENERATION_API_URL") {
                generation.api_url = url;
            }
            if let Ok(model) = std::env::var("GENERATION_MODEL") {
                generation.model = model;
            }
        }

        // Workflow webhook overrides
        if let Ok(base_url) = std::env::var("WORKFLOW_WEBHOOK_URL") {
            let workflow = self.workflow.get_or_insert_with(|| WorkflowConfig {
                base_url: base_url.clone(),
                webhook_secret: String::new(),
                timeout_secs: default_webhook_timeout(),
            });
            workflow.base_url = base_url;
        }
        if let Ok(secret) = std::env::var("WORKFLOW_WEBHOOK_SECRET") {
            if let Some(ref mut workflow) = self.workflow {
                workflow.webhook_secret = secret;
            }
        }

        // Dispatcher overrides
        if let Ok(interval) = std::env::var("DISPATCH_INTERVAL_SECS") {
            self.dispatcher.interval_secs = interval.parse().ok().filter(|secs| *secs > 0);
        }
        if let Ok(url) = std::env::var("DISPATCH_PUBLISH_WEBHOOK_URL") {
            self.dispatcher.publish_webhook_url = Some(url);
            self.dispatcher.publisher = PublisherKind::Webhook;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.len() < 32 {
            anyhow::bail!("JWT secret must be at least 32 characters long");
        }

        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if let Some(ref generation) = self.generation {
            if generation.api_key.is_empty() {
                anyhow::bail!("Generation API key cannot be empty");
            }
        }

        if let Some(ref workflow) = self.workflow {
            if workflow.base_url.is_empty() {
                anyhow::bail!("Workflow webhook URL cannot be empty");
            }
            if workflow.webhook_secret.is_empty() {
                anyhow::bail!("Workflow webhook secret is required when a webhook URL is set");
            }
        }

        if self.dispatcher.batch_size == 0 {
            anyhow::bail!("Dispatcher batch size must be greater than 0");
        }

        if self.dispatcher.publisher == PublisherKind::Webhook {
            if self.dispatcher.publish_webhook_url.is_none() {
                anyhow::bail!("Webhook publisher requires dispatcher.publish_webhook_url");
            }
            if self.publish_webhook_secret().is_none() {
                anyhow::bail!(
                    "Webhook publisher requires dispatcher.publish_webhook_secret or a workflow secret"
                );
            }
        }

        Ok(())
    }

    /// Secret used to sign publish webhooks
    pub fn publish_webhook_secret(&self) -> Option<&str> {
        self.dispatcher
            .publish_webhook_secret
            .as_deref()
            .or_else(|| self.workflow.as_ref().map(|w| w.webhook_secret.as_str()))
            .filter(|s| !s.is_empty())
    }
}
