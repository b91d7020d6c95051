//! JWT authentication middleware
//!
//! Tokens are issued by the identity provider in front of this service and
//! signed with the shared `auth.jwt_secret`. The `sub` claim is the user id
//! that owns campaigns and social accounts.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, DecodingKey, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{utils::error::ErrorResponse, AppState};

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default)]
    pub nbf: i64,
    #[serde(default)]
    pub token_type: TokenType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    #[default]
    Access,
    Refresh,
}

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
}

impl TryFrom<Claims> for AuthUser {
    type Error = &'static str;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&claims.sub).map_err(|_| "Invalid user ID in token")?;
        Ok(Self { id })
    }
}

/// Extractor for handlers running behind `auth_middleware`
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthUser>().cloned().ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("unauthorized", "Authentication required")),
            )
        })
    }
}

/// Validate and decode a JWT token
pub fn validate_token(token: &str, secret: &str) -> Result<TokenData<Claims>, AuthError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.validate_nbf = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })
}

#[derive(Debug, PartialEq)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    TokenExpired,
    InvalidTokenType,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingToken => "Missing authentication token",
            AuthError::InvalidToken => "Invalid authentication token",
            AuthError::TokenExpired => "Authentication token has expired",
            AuthError::InvalidTokenType => "Invalid token type",
        };

        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("unauthorized", message)),
        )
            .into_response()
    }
}

fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
}

/// Resolve the caller from a raw `Authorization` header value
pub fn authenticate(auth_header: Option<&str>, secret: &str) -> Result<AuthUser, AuthError> {
    let auth_header = auth_header.ok_or(AuthError::MissingToken)?;
    let token = extract_bearer_token(auth_header).ok_or(AuthError::InvalidToken)?;
    let token_data = validate_token(token, secret)?;
    if token_data.claims.token_type != TokenType::Access {
        return Err(AuthError::InvalidTokenType);
    }
    token_data
        .claims
        .try_into()
        .map_err(|_| AuthError::InvalidToken)
}

/// Authentication middleware
///
/// Validates the bearer token and injects the `AuthUser` into request
/// extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let auth_user = authenticate(auth_header, &state.config.auth.jwt_secret)?;
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}
