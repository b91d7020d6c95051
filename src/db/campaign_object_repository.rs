//! Campaign object repository
//!
//! Objects are visible through the campaign that owns them.

use anyhow::{Context, Result};
use sqlx::{FromRow, SqliteConnection};
use uuid::Uuid;

use super::{db_timestamp, page_limit, timestamp_from_db, uuid_from_db, Scope};
use crate::models::{CampaignObject, ObjectStatus, ObjectType};

#[derive(Debug, FromRow)]
struct CampaignObjectRow {
    id: String,
    campaign_id: String,
    title: String,
    object_type: String,
    content: Option<String>,
    media_url: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<CampaignObjectRow> for CampaignObject {
    type Error = anyhow::Error;

    fn try_from(row: CampaignObjectRow) -> Result<Self> {
        let object_type = ObjectType::parse(&row.object_type)
            .with_context(|| format!("Unknown object type '{}'", row.object_type))?;
        let status = ObjectStatus::parse(&row.status)
            .with_context(|| format!("Unknown object status '{}'", row.status))?;

        Ok(Self {
            id: uuid_from_db(&row.id),
            campaign_id: uuid_from_db(&row.campaign_id),
            title: row.title,
            object_type,
            content: row.content,
            media_url: row.media_url,
            status,
            created_at: timestamp_from_db(&row.created_at),
            updated_at: timestamp_from_db(&row.updated_at),
        })
    }
}

pub struct CampaignObjectRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> CampaignObjectRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    pub async fn find(&mut self, scope: Scope, id: Uuid) -> Result<Option<CampaignObject>> {
        let mut sql = String::from(
            "SELECT o.* FROM campaign_objects o JOIN campaigns c ON c.id = o.campaign_id WHERE o.id = ?",
        );
        let owner = scope.push_filter(&mut sql, "c.owner_id");

        let mut query = sqlx::query_as::<_, CampaignObjectRow>(&sql).bind(id.to_string());
        if let Some(owner) = owner {
            query = query.bind(owner);
        }

        query
            .fetch_optional(&mut *self.conn)
            .await
            .context("Failed to fetch campaign object")?
            .map(CampaignObject::try_from)
            .transpose()
    }

    pub async fn list(
        &mut self,
        scope: Scope,
        campaign_id: Option<Uuid>,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<CampaignObject>> {
        let mut sql = String::from(
            "SELECT o.* FROM campaign_objects o JOIN campaigns c ON c.id = o.campaign_id WHERE 1 = 1",
        );
        let owner = scope.push_filter(&mut sql, "c.owner_id");
        if campaign_id.is_some() {
            sql.push_str(" AND o.campaign_id = ?");
        }
        sql.push_str(" ORDER BY o.created_at DESC LIMIT ? OFFSET ?");

        let mut query = sqlx::query_as::<_, CampaignObjectRow>(&sql);
        if let Some(owner) = owner {
            query = query.bind(owner);
        }
        if let Some(campaign_id) = campaign_id {
            query = query.bind(campaign_id.to_string());
        }

        query
            .bind(page_limit(limit))
            .bind(offset.unwrap_or(0) as i64)
            .fetch_all(&mut *self.conn)
            .await
            .context("Failed to list campaign objects")?
            .into_iter()
            .map(CampaignObject::try_from)
            .collect()
    }

    pub async fn insert(&mut self, object: &CampaignObject) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO campaign_objects (
                id, campaign_id, title, object_type, content, media_url, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(object.id.to_string())
        .bind(object.campaign_id.to_string())
        .bind(&object.title)
        .bind(object.object_type.as_str())
        .bind(&object.content)
        .bind(&object.media_url)
        .bind(object.status.as_str())
        .bind(db_timestamp(object.created_at))
        .bind(db_timestamp(object.updated_at))
        .execute(&mut *self.conn)
        .await
        .context("Failed to insert campaign object")?;

        Ok(())
    }

    pub async fn update(&mut self, object: &CampaignObject) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE campaign_objects
            SET title = ?, content = ?, media_url = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&object.title)
        .bind(&object.content)
        .bind(&object.media_url)
        .bind(object.status.as_str())
        .bind(db_timestamp(object.updated_at))
        .bind(object.id.to_string())
        .execute(&mut *self.conn)
        .await
        .context("Failed to update campaign object")?;

        Ok(())
    }

    pub async fn delete(&mut self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM campaign_objects WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *self.conn)
            .await
            .context("Failed to delete campaign object")?;

        Ok(result.rows_affected() > 0)
    }
}
