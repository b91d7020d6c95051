//! Campaign API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use validator::Validate;

use super::{parse_id, PageQuery};
use crate::{
    middleware::{AuthUser, RequestMeta},
    models::{Campaign, CampaignObject, CreateCampaignRequest, UpdateCampaignRequest},
    services::CampaignService,
    utils::AppResult,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_campaigns).post(create_campaign))
        .route(
            "/{id}",
            get(get_campaign).put(update_campaign).delete(delete_campaign),
        )
        .route("/{id}/objects", get(list_campaign_objects))
}

async fn list_campaigns(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<Vec<Campaign>>> {
    let ctx = meta.audit_context(&auth_user);
    let campaigns = CampaignService::new(state.db)
        .list(&ctx, page.limit, page.offset)
        .await?;
    Ok(Json(campaigns))
}

async fn create_campaign(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Json(payload): Json<CreateCampaignRequest>,
) -> AppResult<(StatusCode, Json<Campaign>)> {
    payload.validate()?;
    let ctx = meta.audit_context(&auth_user);
    let campaign = CampaignService::new(state.db).create(&ctx, payload).await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

async fn get_campaign(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> AppResult<Json<Campaign>> {
    let id = parse_id(&id, "campaign")?;
    let ctx = meta.audit_context(&auth_user);
    Ok(Json(CampaignService::new(state.db).get(&ctx, id).await?))
}

async fn update_campaign(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
    Json(payload): Json<UpdateCampaignRequest>,
) -> AppResult<Json<Campaign>> {
    let id = parse_id(&id, "campaign")?;
    payload.validate()?;
    let ctx = meta.audit_context(&auth_user);
    let campaign = CampaignService::new(state.db)
        .update(&ctx, id, payload)
        .await?;
    Ok(Json(campaign))
}

async fn delete_campaign(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = parse_id(&id, "campaign")?;
    let ctx = meta.audit_context(&auth_user);
    CampaignService::new(state.db).delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Content objects of one campaign
async fn list_campaign_objects(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<Vec<CampaignObject>>> {
    let id = parse_id(&id, "campaign")?;
    let ctx = meta.audit_context(&auth_user);
    let service = CampaignService::new(state.db);
    // 404 for campaigns outside the caller's scope rather than an empty list
    service.get(&ctx, id).await?;
    let objects = service
        .list_objects(&ctx, Some(id), page.limit, page.offset)
        .await?;
    Ok(Json(objects))
}
