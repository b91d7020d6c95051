//! API routes and handlers
//!
//! This module defines all API endpoints and their routing.

use axum::{routing::get, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::utils::AppError;
use crate::AppState;

mod accounts;
mod audit_logs;
mod campaign_objects;
mod campaigns;
mod generation;
mod health;
mod publications;
mod webhooks;

pub use health::*;

/// Public API routes (no authentication required)
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/detailed", get(health::health_check_detailed))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        // Signed callbacks from the workflow service
        .nest("/webhooks", webhooks::routes())
}

/// Protected API routes (authentication required)
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .nest("/campaigns", campaigns::routes())
        .nest("/campaign-objects", campaign_objects::routes())
        .nest("/accounts", accounts::routes())
        .nest("/publications", publications::routes())
        .merge(generation::routes())
        .nest("/audit-logs", audit_logs::routes())
}

/// Parse a path identifier, answering 400 for malformed values
pub(crate) fn parse_id(id: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| AppError::bad_request(format!("Invalid {} ID", what)))
}

/// `limit`/`offset` query parameters for list endpoints
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}
