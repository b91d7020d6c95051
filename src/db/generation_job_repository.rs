//! Generation job repository

use anyhow::{Context, Result};
use sqlx::{FromRow, SqliteConnection};
use uuid::Uuid;

use super::{db_timestamp, timestamp_from_db, uuid_from_db, Scope};
use crate::models::{GenerationJob, GenerationKind, JobStatus};

#[derive(Debug, FromRow)]
struct GenerationJobRow {
    id: String,
    campaign_object_id: String,
    kind: String,
    prompt: String,
    options: String,
    status: String,
    result_url: Option<String>,
    error_message: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<GenerationJobRow> for GenerationJob {
    type Error = anyhow::Error;

    fn try_from(row: GenerationJobRow) -> Result<Self> {
        let kind = GenerationKind::parse(&row.kind)
            .with_context(|| format!("Unknown generation kind '{}'", row.kind))?;
        let status = JobStatus::parse(&row.status)
            .with_context(|| format!("Unknown job status '{}'", row.status))?;
        let options = serde_json::from_str(&row.options)
            .with_context(|| format!("Invalid options on generation job {}", row.id))?;

        Ok(Self {
            id: uuid_from_db(&row.id),
            campaign_object_id: uuid_from_db(&row.campaign_object_id),
            kind,
            prompt: row.prompt,
            options,
            status,
            result_url: row.result_url,
            error_message: row.error_message,
            created_at: timestamp_from_db(&row.created_at),
            updated_at: timestamp_from_db(&row.updated_at),
        })
    }
}

const SCOPED_SELECT: &str = r#"
    SELECT j.* FROM generation_jobs j
    JOIN campaign_objects o ON o.id = j.campaign_object_id
    JOIN campaigns c ON c.id = o.campaign_id
    WHERE 1 = 1"#;

pub struct GenerationJobRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> GenerationJobRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    pub async fn find(&mut self, scope: Scope, id: Uuid) -> Result<Option<GenerationJob>> {
        let mut sql = String::from(SCOPED_SELECT);
        sql.push_str(" AND j.id = ?");
        let owner = scope.push_filter(&mut sql, "c.owner_id");

        let mut query = sqlx::query_as::<_, GenerationJobRow>(&sql).bind(id.to_string());
        if let Some(owner) = owner {
            query = query.bind(owner);
        }

        query
            .fetch_optional(&mut *self.conn)
            .await
            .context("Failed to fetch generation job")?
            .map(GenerationJob::try_from)
            .transpose()
    }

    pub async fn list_for_object(
        &mut self,
        scope: Scope,
        campaign_object_id: Uuid,
    ) -> Result<Vec<GenerationJob>> {
        let mut sql = String::from(SCOPED_SELECT);
        sql.push_str(" AND j.campaign_object_id = ?");
        let owner = scope.push_filter(&mut sql, "c.owner_id");
        sql.push_str(" ORDER BY j.created_at DESC");

        let mut query =
            sqlx::query_as::<_, GenerationJobRow>(&sql).bind(campaign_object_id.to_string());
        if let Some(owner) = owner {
            query = query.bind(owner);
        }

        query
            .fetch_all(&mut *self.conn)
            .await
            .context("Failed to list generation jobs")?
            .into_iter()
            .map(GenerationJob::try_from)
            .collect()
    }

    pub async fn insert(&mut self, job: &GenerationJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO generation_jobs (
                id, campaign_object_id, kind, prompt, options, status,
                result_url, error_message, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.id.to_string())
        .bind(job.campaign_object_id.to_string())
        .bind(job.kind.as_str())
        .bind(&job.prompt)
        .bind(job.options.to_string())
        .bind(job.status.as_str())
        .bind(&job.result_url)
        .bind(&job.error_message)
        .bind(db_timestamp(job.created_at))
        .bind(db_timestamp(job.updated_at))
        .execute(&mut *self.conn)
        .await
        .context("Failed to insert generation job")?;

        Ok(())
    }

    /// Persist a status change if the job is still in `expected`
    pub async fn update_status(&mut self, job: &GenerationJob, expected: JobStatus) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE generation_jobs
            SET status = ?, result_url = ?, error_message = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(job.status.as_str())
        .bind(&job.result_url)
        .bind(&job.error_message)
        .bind(db_timestamp(job.updated_at))
        .bind(job.id.to_string())
        .bind(expected.as_str())
        .execute(&mut *self.conn)
        .await
        .context("Failed to update generation job")?;

        Ok(result.rows_affected() > 0)
    }
}
