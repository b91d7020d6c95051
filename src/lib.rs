//! Campaign Hub library
//!
//! Campaign planning, AI-assisted content, scheduled publishing and an
//! append-only audit trail behind a JSON API.

use std::sync::Arc;

use anyhow::Result;

pub mod api;
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use db::DbPool;
pub use middleware::{auth_middleware, AuthUser, Claims, RequestMeta};
use services::{build_publisher, GenerationClient, Publisher, WorkflowClient};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Database connection pool
    pub db: DbPool,
    /// Generation API client (optional)
    pub generation: Option<Arc<GenerationClient>>,
    /// Workflow webhook client (optional)
    pub workflow: Option<Arc<WorkflowClient>>,
    /// Target used by on-demand dispatch passes
    pub publisher: Arc<dyn Publisher>,
}

impl AppState {
    /// Build the shared state and the external clients the config enables
    pub fn new(config: AppConfig, db: DbPool) -> Result<Self> {
        let generation = config
            .generation
            .clone()
            .map(GenerationClient::new)
            .transpose()?
            .map(Arc::new);
        let workflow = config
            .workflow
            .clone()
            .map(WorkflowClient::new)
            .transpose()?
            .map(Arc::new);
        let publisher = build_publisher(&config)?;

        Ok(Self {
            config,
            db,
            generation,
            workflow,
            publisher,
        })
    }
}
