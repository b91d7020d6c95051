//! Campaign repository

use anyhow::{Context, Result};
use sqlx::{FromRow, SqliteConnection};
use uuid::Uuid;

use super::{
    db_timestamp, optional_timestamp_from_db, page_limit, timestamp_from_db, uuid_from_db, Scope,
};
use crate::models::Campaign;

#[derive(Debug, FromRow)]
struct CampaignRow {
    id: String,
    owner_id: String,
    name: String,
    description: Option<String>,
    starts_at: Option<String>,
    ends_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<CampaignRow> for Campaign {
    fn from(row: CampaignRow) -> Self {
        Self {
            id: uuid_from_db(&row.id),
            owner_id: uuid_from_db(&row.owner_id),
            name: row.name,
            description: row.description,
            starts_at: optional_timestamp_from_db(row.starts_at),
            ends_at: optional_timestamp_from_db(row.ends_at),
            created_at: timestamp_from_db(&row.created_at),
            updated_at: timestamp_from_db(&row.updated_at),
        }
    }
}

pub struct CampaignRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> CampaignRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    pub async fn find(&mut self, scope: Scope, id: Uuid) -> Result<Option<Campaign>> {
        let mut sql = String::from("SELECT * FROM campaigns WHERE id = ?");
        let owner = scope.push_filter(&mut sql, "owner_id");

        let mut query = sqlx::query_as::<_, CampaignRow>(&sql).bind(id.to_string());
        if let Some(owner) = owner {
            query = query.bind(owner);
        }

        let row = query
            .fetch_optional(&mut *self.conn)
            .await
            .context("Failed to fetch campaign")?;

        Ok(row.map(Campaign::from))
    }

    pub async fn list(
        &mut self,
        scope: Scope,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<Campaign>> {
        let mut sql = String::from("SELECT * FROM campaigns WHERE 1 = 1");
        let owner = scope.push_filter(&mut sql, "owner_id");
        sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");

        let mut query = sqlx::query_as::<_, CampaignRow>(&sql);
        if let Some(owner) = owner {
            query = query.bind(owner);
        }

        let rows = query
            .bind(page_limit(limit))
            .bind(offset.unwrap_or(0) as i64)
            .fetch_all(&mut *self.conn)
            .await
            .context("Failed to list campaigns")?;

        Ok(rows.into_iter().map(Campaign::from).collect())
    }

    pub async fn insert(&mut self, campaign: &Campaign) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO campaigns (id, owner_id, name, description, starts_at, ends_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(campaign.id.to_string())
        .bind(campaign.owner_id.to_string())
        .bind(&campaign.name)
        .bind(&campaign.description)
        .bind(campaign.starts_at.map(db_timestamp))
        .bind(campaign.ends_at.map(db_timestamp))
        .bind(db_timestamp(campaign.created_at))
        .bind(db_timestamp(campaign.updated_at))
        .execute(&mut *self.conn)
        .await
        .context("Failed to insert campaign")?;

        Ok(())
    }

    pub async fn update(&mut self, campaign: &Campaign) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE campaigns
            SET name = ?, description = ?, starts_at = ?, ends_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&campaign.name)
        .bind(&campaign.description)
        .bind(campaign.starts_at.map(db_timestamp))
        .bind(campaign.ends_at.map(db_timestamp))
        .bind(db_timestamp(campaign.updated_at))
        .bind(campaign.id.to_string())
        .execute(&mut *self.conn)
        .await
        .context("Failed to update campaign")?;

        Ok(())
    }

    /// Delete a campaign; its content, publications and jobs cascade
    pub async fn delete(&mut self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM campaigns WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *self.conn)
            .await
            .context("Failed to delete campaign")?;

        Ok(result.rows_affected() > 0)
    }
}
