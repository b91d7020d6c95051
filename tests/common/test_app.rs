//! Test application setup utilities
//!
//! Builds the real router over a throwaway SQLite file and issues requests
//! through `tower::ServiceExt::oneshot`.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt;
use uuid::Uuid;

use campaign_hub::{
    api,
    config::{AppConfig, AuthConfig, DatabaseConfig, DispatcherConfig, LoggingConfig, ServerConfig},
    db,
    middleware::auth::{Claims, TokenType},
    AppState,
};

/// Test application wrapper for integration testing
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    /// Default caller for authenticated helpers
    pub user_id: Uuid,
    pub token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    /// Create a test application with custom configuration
    pub async fn with_config(config: AppConfig) -> Self {
        let db = db::init_pool(&config.database)
            .await
            .expect("Failed to initialize test database");

        let state = AppState::new(config, db).expect("Failed to build application state");

        let router = Router::new()
            .nest("/api/v1", api::public_routes())
            .nest(
                "/api/v1",
                api::protected_routes().layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    campaign_hub::middleware::auth_middleware,
                )),
            )
            .with_state(state.clone());

        let user_id = Uuid::new_v4();
        let token = generate_test_token(&state.config, user_id);

        Self {
            router,
            state,
            user_id,
            token,
        }
    }

    /// Token for another user of the same application
    pub fn token_for(&self, user_id: Uuid) -> String {
        generate_test_token(&self.state.config, user_id)
    }

    /// GET as the default user
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.get_as(&self.token, uri).await
    }

    pub async fn get_as(&self, token: &str, uri: &str) -> TestResponse {
        self.send("GET", uri, Some(token), None).await
    }

    /// POST a JSON body as the default user
    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> TestResponse {
        self.post_json_as(&self.token, uri, body).await
    }

    pub async fn post_json_as(
        &self,
        token: &str,
        uri: &str,
        body: serde_json::Value,
    ) -> TestResponse {
        self.send("POST", uri, Some(token), Some(body)).await
    }

    /// PUT a JSON body as the default user
    pub async fn put_json(&self, uri: &str, body: serde_json::Value) -> TestResponse {
        self.send("PUT", uri, Some(&self.token), Some(body)).await
    }

    /// DELETE as the default user
    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.send("DELETE", uri, Some(&self.token), None).await
    }

    /// GET without credentials
    pub async fn get_anonymous(&self, uri: &str) -> TestResponse {
        self.send("GET", uri, None, None).await
    }

    /// POST raw bytes with extra headers and no bearer token
    pub async fn post_raw(&self, uri: &str, headers: &[(&str, &str)], body: Vec<u8>) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.request(builder.body(Body::from(body)).unwrap()).await
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.request(builder.body(body).unwrap()).await
    }

    /// Make an arbitrary request
    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: bytes::Bytes,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Parse the response body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("Failed to parse response as JSON")
    }

    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {}, got {}. Body: {}",
            expected,
            self.status,
            self.text()
        );
        self
    }

    pub fn assert_ok(&self) -> &Self {
        self.assert_status(StatusCode::OK)
    }

    pub fn assert_created(&self) -> &Self {
        self.assert_status(StatusCode::CREATED)
    }

    pub fn assert_no_content(&self) -> &Self {
        self.assert_status(StatusCode::NO_CONTENT)
    }

    pub fn assert_bad_request(&self) -> &Self {
        self.assert_status(StatusCode::BAD_REQUEST)
    }

    pub fn assert_unauthorized(&self) -> &Self {
        self.assert_status(StatusCode::UNAUTHORIZED)
    }

    pub fn assert_not_found(&self) -> &Self {
        self.assert_status(StatusCode::NOT_FOUND)
    }

    pub fn assert_conflict(&self) -> &Self {
        self.assert_status(StatusCode::CONFLICT)
    }
}

/// Test configuration with a temporary SQLite file
pub fn test_config() -> AppConfig {
    let db_path = format!(
        "/tmp/campaign_hub_test_{}.db",
        Uuid::new_v4().to_string().replace('-', "")
    );

    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
        },
        database: DatabaseConfig {
            url: format!("sqlite://{}?mode=rwc", db_path),
            max_connections: 4,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        },
        auth: AuthConfig {
            jwt_secret: "test_secret_key_that_is_at_least_32_bytes_long".to_string(),
        },
        logging: LoggingConfig::default(),
        generation: None,
        workflow: None,
        dispatcher: DispatcherConfig::default(),
    }
}

/// Sign an access token the way the identity provider would
pub fn generate_test_token(config: &AppConfig, user_id: Uuid) -> String {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + chrono::Duration::hours(1)).timestamp(),
        nbf: now.timestamp(),
        token_type: TokenType::Access,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(config.auth.jwt_secret.as_bytes()),
    )
    .expect("Failed to generate test token")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_app_creation() {
        let app = TestApp::new().await;
        assert!(app.state.generation.is_none());
        assert!(app.state.workflow.is_none());
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = TestApp::new().await;
        app.get_anonymous("/api/v1/health").await.assert_ok();
    }
}
