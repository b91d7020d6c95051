//! Publication API endpoints
//!
//! Publications bind a campaign object to a social account and a time. The
//! list endpoint doubles as the calendar view through its `from`/`to` window.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};
use validator::Validate;

use super::parse_id;
use crate::{
    middleware::{AuthUser, RequestMeta},
    models::{
        CreatePublicationRequest, Publication, PublicationQuery, SchedulePublicationRequest,
        UpdatePublicationRequest,
    },
    services::{PublicationDispatcher, PublicationService},
    utils::AppResult,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_publications).post(create_publication))
        .route("/dispatch", post(trigger_dispatch))
        .route(
            "/{id}",
            get(get_publication)
                .put(update_publication)
                .delete(delete_publication),
        )
        .route("/{id}/schedule", post(schedule_publication))
}

async fn list_publications(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Query(query): Query<PublicationQuery>,
) -> AppResult<Json<Vec<Publication>>> {
    let ctx = meta.audit_context(&auth_user);
    let publications = PublicationService::new(state.db).list(&ctx, &query).await?;
    Ok(Json(publications))
}

async fn create_publication(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Json(payload): Json<CreatePublicationRequest>,
) -> AppResult<(StatusCode, Json<Publication>)> {
    payload.validate()?;
    let ctx = meta.audit_context(&auth_user);
    let publication = PublicationService::new(state.db)
        .create(&ctx, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(publication)))
}

async fn get_publication(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> AppResult<Json<Publication>> {
    let id = parse_id(&id, "publication")?;
    let ctx = meta.audit_context(&auth_user);
    Ok(Json(PublicationService::new(state.db).get(&ctx, id).await?))
}

async fn update_publication(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
    Json(payload): Json<UpdatePublicationRequest>,
) -> AppResult<Json<Publication>> {
    let id = parse_id(&id, "publication")?;
    payload.validate()?;
    let ctx = meta.audit_context(&auth_user);
    let publication = PublicationService::new(state.db)
        .update(&ctx, id, payload)
        .await?;
    Ok(Json(publication))
}

async fn delete_publication(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = parse_id(&id, "publication")?;
    let ctx = meta.audit_context(&auth_user);
    PublicationService::new(state.db).delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn schedule_publication(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
    Json(payload): Json<SchedulePublicationRequest>,
) -> AppResult<Json<Publication>> {
    let id = parse_id(&id, "publication")?;
    let ctx = meta.audit_context(&auth_user);
    let publication = PublicationService::new(state.db)
        .schedule(&ctx, id, payload.scheduled_at)
        .await?;
    Ok(Json(publication))
}

#[derive(Debug, Serialize)]
struct DispatchAccepted {
    status: &'static str,
    requested_at: chrono::DateTime<Utc>,
}

/// Start one dispatch pass in the background
///
/// Answers 202 once the pass is spawned; results land in the log and the
/// audit trail.
async fn trigger_dispatch(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> (StatusCode, Json<DispatchAccepted>) {
    let now = Utc::now();
    let dispatcher = PublicationDispatcher::new(
        state.db.clone(),
        state.publisher.clone(),
        state.config.dispatcher.clone(),
    );

    info!(user_id = %auth_user.id, "Dispatch pass requested");
    tokio::spawn(async move {
        match dispatcher.dispatch_due(now).await {
            Ok(result) => info!(
                worker_id = %result.worker_id,
                claimed = result.claimed,
                published = result.published,
                failed = result.failed,
                "Requested dispatch pass finished"
            ),
            Err(e) => error!("Requested dispatch pass failed: {:#}", e),
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(DispatchAccepted {
            status: "accepted",
            requested_at: now,
        }),
    )
}
