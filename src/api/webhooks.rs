//! Inbound webhooks
//!
//! The workflow service reports media job results here. Requests carry an
//! HMAC signature over the raw body instead of a bearer token.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};

use crate::{
    models::GenerationJob,
    services::{workflow::SIGNATURE_HEADER, ContentService},
    utils::AppResult,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/workflow", post(workflow_callback))
}

async fn workflow_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<GenerationJob>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok());

    let job = ContentService::new(state.db, state.generation, state.workflow)
        .handle_callback(&body, signature)
        .await?;
    Ok(Json(job))
}
