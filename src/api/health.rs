//! Health endpoints
//!
//! `/health` answers without touching anything. `/health/detailed` checks the
//! database and probes the generation API and workflow service when they are
//! configured. Only the database decides readiness; an unreachable
//! integration degrades the service without taking it out of rotation.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::{db, AppState};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentState {
    Healthy,
    Reachable,
    Unreachable,
    Unhealthy,
    NotConfigured,
}

#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub status: ComponentState,
    /// HTTP status returned by the probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentStatus {
    fn of(state: ComponentState) -> Self {
        Self {
            status: state,
            http_status: None,
            message: None,
        }
    }

    fn database(result: anyhow::Result<()>) -> Self {
        match result {
            Ok(()) => Self::of(ComponentState::Healthy),
            Err(e) => Self {
                message: Some(format!("{:#}", e)),
                ..Self::of(ComponentState::Unhealthy)
            },
        }
    }

    fn integration(probe: Option<Result<u16, String>>) -> Self {
        match probe {
            None => Self::of(ComponentState::NotConfigured),
            Some(Ok(code)) => Self {
                http_status: Some(code),
                ..Self::of(ComponentState::Reachable)
            },
            Some(Err(e)) => Self {
                message: Some(e),
                ..Self::of(ComponentState::Unreachable)
            },
        }
    }
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub database: ComponentStatus,
    pub generation: ComponentStatus,
    pub workflow: ComponentStatus,
}

#[derive(Serialize)]
pub struct DetailedHealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub components: ComponentHealth,
}

impl ComponentHealth {
    fn overall(&self) -> (StatusCode, &'static str) {
        if self.database.status != ComponentState::Healthy {
            return (StatusCode::SERVICE_UNAVAILABLE, "unhealthy");
        }
        let degraded = [&self.generation, &self.workflow]
            .iter()
            .any(|c| c.status == ComponentState::Unreachable);
        if degraded {
            (StatusCode::OK, "degraded")
        } else {
            (StatusCode::OK, "healthy")
        }
    }
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn health_check_detailed(
    State(state): State<AppState>,
) -> (StatusCode, Json<DetailedHealthResponse>) {
    let generation = async {
        match &state.generation {
            Some(client) => Some(client.probe().await),
            None => None,
        }
    };
    let workflow = async {
        match &state.workflow {
            Some(client) => Some(client.probe().await),
            None => None,
        }
    };
    let (database, generation, workflow) =
        tokio::join!(db::check_health(&state.db), generation, workflow);

    let components = ComponentHealth {
        database: ComponentStatus::database(database),
        generation: ComponentStatus::integration(generation),
        workflow: ComponentStatus::integration(workflow),
    };
    let (code, status) = components.overall();

    (
        code,
        Json(DetailedHealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            components,
        }),
    )
}

pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match db::check_health(&state.db).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
