//! Campaign Hub - campaign planning and scheduled publishing backend
//!
//! Serves the JSON API and, when `dispatcher.interval_secs` is set, runs the
//! publication dispatcher on an interval inside the server process.

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

use campaign_hub::{
    api, db, middleware,
    services::{self, audit, PublicationDispatcher},
    utils::init_logging,
    AppConfig, AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_help();
        return Ok(());
    }

    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        println!("Campaign Hub {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Load configuration first (before logging, so we know log format)
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Keep the guard alive so file output is flushed
    let _log_guard = init_logging(&config.logging, None);

    info!("Campaign Hub starting up");

    ensure_data_directory(&config)?;

    info!("Initializing database connection");
    let db = db::init_pool(&config.database)
        .await
        .context("Failed to initialize database")?;

    // Intents left behind by a crash between commit and flush
    match audit::flush(&db).await {
        Ok(0) => {}
        Ok(n) => info!("Recovered {} pending audit records", n),
        Err(e) => warn!("Failed to flush pending audit records: {:#}", e),
    }

    let state = AppState::new(config.clone(), db).context("Failed to initialize services")?;
    match state.generation {
        Some(ref client) => info!("Generation API configured (model {})", client.model()),
        None => info!("Generation API not configured"),
    }
    if state.workflow.is_none() {
        info!("Workflow webhooks not configured");
    }
    info!("Publisher: {}", state.publisher.name());

    let _dispatch_scheduler = config.dispatcher.interval_secs.map(|interval_secs| {
        let dispatcher = Arc::new(PublicationDispatcher::new(
            state.db.clone(),
            state.publisher.clone(),
            config.dispatcher.clone(),
        ));
        services::start_dispatch_scheduler(dispatcher, interval_secs)
    });

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address configuration")?;

    info!("Starting HTTP server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("HTTP server error")?;

    Ok(())
}

/// Ensure the directory holding the SQLite file exists
fn ensure_data_directory(config: &AppConfig) -> Result<()> {
    if let Some(path) = config.database.url.strip_prefix("sqlite://") {
        let path = path.split('?').next().unwrap_or(path);
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create data directory")?;
                info!("Created data directory: {:?}", parent);
            }
        }
    }
    Ok(())
}

/// Create the application router with all routes and middleware
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Auth applies to protected routes only; health and webhooks stay public
    Router::new()
        .nest("/api/v1", api::public_routes())
        .nest(
            "/api/v1",
            api::protected_routes().layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::auth_middleware,
            )),
        )
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(trace_layer)
        .layer(cors)
}

fn print_help() {
    println!(
        r#"Campaign Hub {}

USAGE:
    campaign-hub [OPTIONS]

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information

ENVIRONMENT:
    CAMPAIGN_HUB_CONFIG     Path to configuration file

CONFIGURATION:
    The application looks for configuration files in the following order:
    1. Path specified by CAMPAIGN_HUB_CONFIG environment variable
    2. ./config.yaml
    3. ./config/config.yaml
    4. /etc/campaign-hub/config.yaml
    5. <user config dir>/campaign-hub/config.yaml

    Publications can also be dispatched from cron with the
    dispatch-publications binary."#,
        env!("CARGO_PKG_VERSION")
    );
}
