//! Content generation endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use super::parse_id;
use crate::{
    middleware::{AuthUser, RequestMeta},
    models::{GenerateTextRequest, GeneratedContent, GenerationJob},
    services::ContentService,
    utils::AppResult,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/generation/text", post(generate_text))
        .route("/generation-jobs/{id}", get(get_generation_job))
}

fn content_service(state: AppState) -> ContentService {
    ContentService::new(state.db, state.generation, state.workflow)
}

/// Free-form text generation, not tied to a campaign object
async fn generate_text(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Json(payload): Json<GenerateTextRequest>,
) -> AppResult<Json<GeneratedContent>> {
    payload.validate()?;
    let generated = content_service(state).generate_text(&payload).await?;
    Ok(Json(generated))
}

async fn get_generation_job(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> AppResult<Json<GenerationJob>> {
    let id = parse_id(&id, "generation job")?;
    let ctx = meta.audit_context(&auth_user);
    Ok(Json(content_service(state).get_job(&ctx, id).await?))
}
