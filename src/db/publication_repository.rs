//! Publication repository
//!
//! Besides plain CRUD this holds the dispatcher's state changes. Each of them
//! is a single conditional `UPDATE ... RETURNING`, so a row can only be moved
//! by the worker whose predicate still matches it.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};
use uuid::Uuid;

use super::{
    db_timestamp, optional_timestamp_from_db, page_limit, timestamp_from_db, uuid_from_db, Scope,
};
use crate::models::{Publication, PublicationQuery, PublicationStatus};

/// Error message stored on publications whose claim expired
pub const CLAIM_EXPIRED: &str = "claim expired";

#[derive(Debug, FromRow)]
struct PublicationRow {
    id: String,
    campaign_object_id: String,
    social_account_id: String,
    status: String,
    scheduled_at: Option<String>,
    published_at: Option<String>,
    external_post_id: Option<String>,
    error_message: Option<String>,
    claimed_by: Option<String>,
    claimed_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<PublicationRow> for Publication {
    type Error = anyhow::Error;

    fn try_from(row: PublicationRow) -> Result<Self> {
        let status = PublicationStatus::parse(&row.status)
            .with_context(|| format!("Unknown publication status '{}'", row.status))?;

        Ok(Self {
            id: uuid_from_db(&row.id),
            campaign_object_id: uuid_from_db(&row.campaign_object_id),
            social_account_id: uuid_from_db(&row.social_account_id),
            status,
            scheduled_at: optional_timestamp_from_db(row.scheduled_at),
            published_at: optional_timestamp_from_db(row.published_at),
            external_post_id: row.external_post_id,
            error_message: row.error_message,
            claimed_by: row.claimed_by,
            claimed_at: optional_timestamp_from_db(row.claimed_at),
            created_at: timestamp_from_db(&row.created_at),
            updated_at: timestamp_from_db(&row.updated_at),
        })
    }
}

fn into_publications(rows: Vec<PublicationRow>) -> Result<Vec<Publication>> {
    rows.into_iter().map(Publication::try_from).collect()
}

/// Final state written by a dispatch worker
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Published { external_post_id: Option<String> },
    Failed { error: String },
}

/// Parent record whose deletion cascades to publications
#[derive(Debug, Clone, Copy)]
pub enum PublicationParent {
    Campaign(Uuid),
    CampaignObject(Uuid),
    SocialAccount(Uuid),
}

impl PublicationParent {
    fn column(&self) -> &'static str {
        match self {
            Self::Campaign(_) => "o.campaign_id",
            Self::CampaignObject(_) => "p.campaign_object_id",
            Self::SocialAccount(_) => "p.social_account_id",
        }
    }

    fn id(&self) -> Uuid {
        match *self {
            Self::Campaign(id) | Self::CampaignObject(id) | Self::SocialAccount(id) => id,
        }
    }
}

const SCOPED_SELECT: &str = r#"
    SELECT p.* FROM publications p
    JOIN campaign_objects o ON o.id = p.campaign_object_id
    JOIN campaigns c ON c.id = o.campaign_id
    WHERE 1 = 1"#;

pub struct PublicationRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> PublicationRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    pub async fn find(&mut self, scope: Scope, id: Uuid) -> Result<Option<Publication>> {
        let mut sql = String::from(SCOPED_SELECT);
        sql.push_str(" AND p.id = ?");
        let owner = scope.push_filter(&mut sql, "c.owner_id");

        let mut query = sqlx::query_as::<_, PublicationRow>(&sql).bind(id.to_string());
        if let Some(owner) = owner {
            query = query.bind(owner);
        }

        query
            .fetch_optional(&mut *self.conn)
            .await
            .context("Failed to fetch publication")?
            .map(Publication::try_from)
            .transpose()
    }

    /// List publications, optionally limited to a calendar window on `scheduled_at`
    pub async fn list(&mut self, scope: Scope, filter: &PublicationQuery) -> Result<Vec<Publication>> {
        let mut sql = String::from(SCOPED_SELECT);
        let owner = scope.push_filter(&mut sql, "c.owner_id");

        if filter.status.is_some() {
            sql.push_str(" AND p.status = ?");
        }
        if filter.campaign_id.is_some() {
            sql.push_str(" AND o.campaign_id = ?");
        }
        if filter.from.is_some() {
            sql.push_str(" AND julianday(p.scheduled_at) >= julianday(?)");
        }
        if filter.to.is_some() {
            sql.push_str(" AND julianday(p.scheduled_at) < julianday(?)");
        }
        sql.push_str(" ORDER BY p.scheduled_at IS NULL, p.scheduled_at, p.created_at LIMIT ? OFFSET ?");

        let mut query = sqlx::query_as::<_, PublicationRow>(&sql);
        if let Some(owner) = owner {
            query = query.bind(owner);
        }
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(campaign_id) = filter.campaign_id {
            query = query.bind(campaign_id.to_string());
        }
        if let Some(from) = filter.from {
            query = query.bind(db_timestamp(from));
        }
        if let Some(to) = filter.to {
            query = query.bind(db_timestamp(to));
        }

        let rows = query
            .bind(page_limit(filter.limit))
            .bind(filter.offset.unwrap_or(0) as i64)
            .fetch_all(&mut *self.conn)
            .await
            .context("Failed to list publications")?;

        into_publications(rows)
    }

    pub async fn insert(&mut self, publication: &Publication) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO publications (
                id, campaign_object_id, social_account_id, status, scheduled_at,
                published_at, external_post_id, error_message, claimed_by, claimed_at,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(publication.id.to_string())
        .bind(publication.campaign_object_id.to_string())
        .bind(publication.social_account_id.to_string())
        .bind(publication.status.as_str())
        .bind(publication.scheduled_at.map(db_timestamp))
        .bind(publication.published_at.map(db_timestamp))
        .bind(&publication.external_post_id)
        .bind(&publication.error_message)
        .bind(&publication.claimed_by)
        .bind(publication.claimed_at.map(db_timestamp))
        .bind(db_timestamp(publication.created_at))
        .bind(db_timestamp(publication.updated_at))
        .execute(&mut *self.conn)
        .await
        .context("Failed to insert publication")?;

        Ok(())
    }

    /// Write user-editable fields, guarded on the status the caller read.
    ///
    /// Returns false when the dispatcher moved the row in the meantime.
    pub async fn update_editable(
        &mut self,
        publication: &Publication,
        expected_status: PublicationStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE publications
            SET social_account_id = ?, status = ?, scheduled_at = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(publication.social_account_id.to_string())
        .bind(publication.status.as_str())
        .bind(publication.scheduled_at.map(db_timestamp))
        .bind(db_timestamp(publication.updated_at))
        .bind(publication.id.to_string())
        .bind(expected_status.as_str())
        .execute(&mut *self.conn)
        .await
        .context("Failed to update publication")?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a publication that has not entered dispatch
    pub async fn delete_editable(&mut self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM publications WHERE id = ? AND status IN ('draft', 'scheduled')",
        )
        .bind(id.to_string())
        .execute(&mut *self.conn)
        .await
        .context("Failed to delete publication")?;

        Ok(result.rows_affected() > 0)
    }

    /// Publications under `parent` currently claimed by a dispatcher
    pub async fn count_in_flight(&mut self, parent: PublicationParent) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM publications p \
             JOIN campaign_objects o ON o.id = p.campaign_object_id \
             WHERE p.status = 'publishing' AND {} = ?",
            parent.column()
        );

        sqlx::query_scalar::<_, i64>(&sql)
            .bind(parent.id().to_string())
            .fetch_one(&mut *self.conn)
            .await
            .context("Failed to count in-flight publications")
    }

    /// Scheduled publications due at `now`, without claiming them
    pub async fn list_due(&mut self, now: DateTime<Utc>) -> Result<Vec<Publication>> {
        let rows = sqlx::query_as::<_, PublicationRow>(
            r#"
            SELECT * FROM publications
            WHERE status = 'scheduled' AND julianday(scheduled_at) <= julianday(?)
            ORDER BY julianday(scheduled_at)
            "#,
        )
        .bind(db_timestamp(now))
        .fetch_all(&mut *self.conn)
        .await
        .context("Failed to list due publications")?;

        into_publications(rows)
    }

    /// Atomically move due publications to `publishing` under `worker_id`
    pub async fn claim_due(
        &mut self,
        worker_id: &str,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Publication>> {
        let now_str = db_timestamp(now);
        let rows = sqlx::query_as::<_, PublicationRow>(
            r#"
            UPDATE publications
            SET status = 'publishing', claimed_by = ?1, claimed_at = ?2, updated_at = ?2
            WHERE status = 'scheduled'
              AND id IN (
                  SELECT id FROM publications
                  WHERE status = 'scheduled' AND julianday(scheduled_at) <= julianday(?2)
                  ORDER BY julianday(scheduled_at)
                  LIMIT ?3
              )
            RETURNING *
            "#,
        )
        .bind(worker_id)
        .bind(&now_str)
        .bind(limit as i64)
        .fetch_all(&mut *self.conn)
        .await
        .context("Failed to claim due publications")?;

        into_publications(rows)
    }

    /// Fail publications stuck in `publishing` since before `cutoff`
    pub async fn recover_stale(
        &mut self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Publication>> {
        let rows = sqlx::query_as::<_, PublicationRow>(
            r#"
            UPDATE publications
            SET status = 'failed', error_message = ?, updated_at = ?
            WHERE status = 'publishing' AND julianday(claimed_at) <= julianday(?)
            RETURNING *
            "#,
        )
        .bind(CLAIM_EXPIRED)
        .bind(db_timestamp(now))
        .bind(db_timestamp(cutoff))
        .fetch_all(&mut *self.conn)
        .await
        .context("Failed to recover stale publication claims")?;

        into_publications(rows)
    }

    /// Record the result of a publish attempt.
    ///
    /// Only applies while the row is still `publishing` under `worker_id`.
    pub async fn complete(
        &mut self,
        id: Uuid,
        worker_id: &str,
        outcome: &PublishOutcome,
        now: DateTime<Utc>,
    ) -> Result<Option<Publication>> {
        let (status, published_at, external_post_id, error_message) = match outcome {
            PublishOutcome::Published { external_post_id } => (
                PublicationStatus::Published,
                Some(db_timestamp(now)),
                external_post_id.clone(),
                None,
            ),
            PublishOutcome::Failed { error } => {
                (PublicationStatus::Failed, None, None, Some(error.clone()))
            }
        };

        let row = sqlx::query_as::<_, PublicationRow>(
            r#"
            UPDATE publications
            SET status = ?, published_at = ?, external_post_id = ?, error_message = ?, updated_at = ?
            WHERE id = ? AND status = 'publishing' AND claimed_by = ?
            RETURNING *
            "#,
        )
        .bind(status.as_str())
        .bind(published_at)
        .bind(external_post_id)
        .bind(error_message)
        .bind(db_timestamp(now))
        .bind(id.to_string())
        .bind(worker_id)
        .fetch_optional(&mut *self.conn)
        .await
        .context("Failed to record publication outcome")?;

        row.map(Publication::try_from).transpose()
    }
}
