//! Audit log API endpoints
//!
//! Callers read the entries they authored; background entries have no actor
//! and are only visible in the database.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use super::parse_id;
use crate::{
    db::{AuditRepository, Scope},
    middleware::AuthUser,
    models::{AuditLogEntry, AuditLogQuery},
    utils::{AppError, AppResult},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_audit_logs))
        .route("/{id}", get(get_audit_log))
}

async fn list_audit_logs(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<AuditLogQuery>,
) -> AppResult<Json<Vec<AuditLogEntry>>> {
    let mut conn = state.db.acquire().await?;
    let logs = AuditRepository::new(&mut conn)
        .list(Scope::Owner(auth_user.id), &query)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list audit logs: {:#}", e);
            AppError::internal("Failed to list audit logs")
        })?;

    Ok(Json(logs))
}

async fn get_audit_log(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<AuditLogEntry>> {
    let id = parse_id(&id, "audit log")?;
    let mut conn = state.db.acquire().await?;
    let entry = AuditRepository::new(&mut conn)
        .find(id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get audit log: {:#}", e);
            AppError::internal("Failed to get audit log")
        })?;

    match entry {
        Some(entry) if entry.actor_id == Some(auth_user.id) => Ok(Json(entry)),
        _ => Err(AppError::not_found("Audit log not found")),
    }
}
