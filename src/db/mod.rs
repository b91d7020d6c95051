//! Database layer
//!
//! SQLite storage for campaigns, content, social accounts, publications,
//! generation jobs and the audit trail. Migrations are embedded from
//! `migrations/` and applied when the pool is created.

pub mod audit_repository;
pub mod campaign_object_repository;
pub mod campaign_repository;
pub mod generation_job_repository;
pub mod publication_repository;
pub mod scope;
pub mod social_account_repository;

pub use audit_repository::AuditRepository;
pub use campaign_object_repository::CampaignObjectRepository;
pub use campaign_repository::CampaignRepository;
pub use generation_job_repository::GenerationJobRepository;
pub use publication_repository::PublicationRepository;
pub use scope::Scope;
pub use social_account_repository::SocialAccountRepository;

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Pool, Sqlite,
};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::utils::validation::parse_db_timestamp;

/// Database connection pool type
pub type DbPool = Pool<Sqlite>;

/// Initialize the database connection pool and run migrations
pub async fn init_pool(config: &DatabaseConfig) -> Result<DbPool> {
    let connect_options = config
        .url
        .parse::<SqliteConnectOptions>()
        .context("Failed to parse database URL")?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(config.connect_timeout_secs))
        .foreign_keys(true)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect_with(connect_options)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(pool)
}

/// Check that the database answers queries
pub async fn check_health(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .context("Database health check failed")?;
    Ok(())
}

/// Storage format for timestamps
pub(crate) fn db_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

pub(crate) fn timestamp_from_db(ts: &str) -> DateTime<Utc> {
    parse_db_timestamp(ts).unwrap_or_else(Utc::now)
}

pub(crate) fn optional_timestamp_from_db(ts: Option<String>) -> Option<DateTime<Utc>> {
    ts.as_deref().and_then(parse_db_timestamp)
}

pub(crate) fn uuid_from_db(id: &str) -> Uuid {
    Uuid::parse_str(id).unwrap_or_else(|_| Uuid::nil())
}

/// Default and maximum page sizes for list endpoints
pub(crate) const DEFAULT_PAGE_SIZE: u32 = 100;
pub(crate) const MAX_PAGE_SIZE: u32 = 500;

pub(crate) fn page_limit(limit: Option<u32>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE) as i64
}
