//! Social account API endpoints

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
    models::{CreateSocialAccountRequest, SocialAccount, UpdateSocialAccountRequest},
    services::AccountService,
    utils::AppResult,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_accounts).post(create_account))
        .route(
            "/{id}",
            get(get_account).put(update_account).delete(delete_account),
        )
}

async fn list_accounts(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<Vec<SocialAccount>>> {
    let ctx = meta.audit_context(&auth_user);
    let accounts = AccountService::new(state.db)
        .list(&ctx, page.limit, page.offset)
        .await?;
    Ok(Json(accounts))
}

async fn create_account(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Json(payload): Json<CreateSocialAccountRequest>,
) -> AppResult<(StatusCode, Json<SocialAccount>)> {
    payload.validate()?;
    let ctx = meta.audit_context(&auth_user);
    let account = AccountService::new(state.db).create(&ctx, payload).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn get_account(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> AppResult<Json<SocialAccount>> {
    let id = parse_id(&id, "account")?;
    let ctx = meta.audit_context(&auth_user);
    Ok(Json(AccountService::new(state.db).get(&ctx, id).await?))
}

async fn update_account(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
    Json(payload): Json<UpdateSocialAccountRequest>,
) -> AppResult<Json<SocialAccount>> {
    let id = parse_id(&id, "account")?;
    payload.validate()?;
    let ctx = meta.audit_context(&auth_user);
    let account = AccountService::new(state.db)
        .update(&ctx, id, payload)
        .await?;
    Ok(Json(account))
}

async fn delete_account(
    State(state): State<AppState>,
    auth_user: AuthUser,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = parse_id(&id, "account")?;
    let ctx = meta.audit_context(&auth_user);
    AccountService::new(state.db).delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
