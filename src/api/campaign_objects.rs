//! Campaign content API endpoints
//!
//! CRUD for campaign objects plus the editorial status workflow, text
//! generation for a single object and its asynchronous media jobs.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::parse_id;
use crate::{
    middleware::{AuthUser, RequestMeta},
    models::{
        CampaignObject, ChangeObjectStatusRequest, CreateCampaignObjectRequest,
        CreateMediaJobRequest, GenerateForObjectRequest, GenerationJob,
        UpdateCampaignObjectRequest,
    },
    services::{CampaignService, ContentService, ObjectGeneration},
    utils::AppResult,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_objects).post(create_object))
        .route(
            "/{id}",
            get(get_object).put(update_object).delete(delete_object),
        )
        .route("/{id}/status", post(change_status))
        .route("/{id}/generate", post(generate_content))
        .route("/{id}/media-jobs", get(list_media_jobs).post(create_media_job))
}

#[derive(Debug, Default, Deserialize)]
struct ObjectListQuery {
    campaign_id: Option<Uuid>,
    limit: Option<u32>,
    offset: Option<u32>,
}

fn content_service(state: &AppState) -> ContentService {
    ContentService::new(
        state.db.clone(),
        state.generation.clone(),
        state.workflow.clone(),
    )
}

async fn list_objects(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Query(query): Query<ObjectListQuery>,
) -> AppResult<Json<Vec<CampaignObject>>> {
    let ctx = meta.audit_context(&auth_user);
    let objects = CampaignService::new(state.db)
        .list_objects(&ctx, query.campaign_id, query.limit, query.offset)
        .await?;
    Ok(Json(objects))
}

async fn create_object(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Json(payload): Json<CreateCampaignObjectRequest>,
) -> AppResult<(StatusCode, Json<CampaignObject>)> {
    payload.validate()?;
    let ctx = meta.audit_context(&auth_user);
    let object = CampaignService::new(state.db)
        .create_object(&ctx, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(object)))
}

async fn get_object(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> AppResult<Json<CampaignObject>> {
    let id = parse_id(&id, "campaign object")?;
    let ctx = meta.audit_context(&auth_user);
    Ok(Json(CampaignService::new(state.db).get_object(&ctx, id).await?))
}

async fn update_object(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
    Json(payload): Json<UpdateCampaignObjectRequest>,
) -> AppResult<Json<CampaignObject>> {
    let id = parse_id(&id, "campaign object")?;
    payload.validate()?;
    let ctx = meta.audit_context(&auth_user);
    let object = CampaignService::new(state.db)
        .update_object(&ctx, id, payload)
        .await?;
    Ok(Json(object))
}

async fn delete_object(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = parse_id(&id, "campaign object")?;
    let ctx = meta.audit_context(&auth_user);
    CampaignService::new(state.db).delete_object(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn change_status(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
    Json(payload): Json<ChangeObjectStatusRequest>,
) -> AppResult<Json<CampaignObject>> {
    let id = parse_id(&id, "campaign object")?;
    let ctx = meta.audit_context(&auth_user);
    let object = CampaignService::new(state.db)
        .change_object_status(&ctx, id, payload.status)
        .await?;
    Ok(Json(object))
}

async fn generate_content(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
    Json(payload): Json<GenerateForObjectRequest>,
) -> AppResult<Json<ObjectGeneration>> {
    let id = parse_id(&id, "campaign object")?;
    payload.validate()?;
    let ctx = meta.audit_context(&auth_user);
    let generated = content_service(&state)
        .generate_for_object(&ctx, id, &payload)
        .await?;
    Ok(Json(generated))
}

async fn list_media_jobs(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<GenerationJob>>> {
    let id = parse_id(&id, "campaign object")?;
    let ctx = meta.audit_context(&auth_user);
    Ok(Json(content_service(&state).list_jobs(&ctx, id).await?))
}

async fn create_media_job(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
    Json(payload): Json<CreateMediaJobRequest>,
) -> AppResult<(StatusCode, Json<GenerationJob>)> {
    let id = parse_id(&id, "campaign object")?;
    payload.validate()?;
    let ctx = meta.audit_context(&auth_user);
    let job = content_service(&state)
        .create_media_job(&ctx, id, payload)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}
