//! Social account repository

use anyhow::{Context, Result};
use sqlx::{FromRow, SqliteConnection};
use uuid::Uuid;

use super::{db_timestamp, page_limit, timestamp_from_db, uuid_from_db, Scope};
use crate::models::{Platform, SocialAccount};

#[derive(Debug, FromRow)]
struct SocialAccountRow {
    id: String,
    owner_id: String,
    platform: String,
    account_name: String,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<SocialAccountRow> for SocialAccount {
    type Error = anyhow::Error;

    fn try_from(row: SocialAccountRow) -> Result<Self> {
        let platform = Platform::parse(&row.platform)
            .with_context(|| format!("Unknown platform '{}' on account {}", row.platform, row.id))?;

        Ok(Self {
            id: uuid_from_db(&row.id),
            owner_id: uuid_from_db(&row.owner_id),
            platform,
            account_name: row.account_name,
            is_active: row.is_active,
            created_at: timestamp_from_db(&row.created_at),
            updated_at: timestamp_from_db(&row.updated_at),
        })
    }
}

pub struct SocialAccountRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> SocialAccountRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    pub async fn find(&mut self, scope: Scope, id: Uuid) -> Result<Option<SocialAccount>> {
        let mut sql = String::from("SELECT * FROM social_accounts WHERE id = ?");
        let owner = scope.push_filter(&mut sql, "owner_id");

        let mut query = sqlx::query_as::<_, SocialAccountRow>(&sql).bind(id.to_string());
        if let Some(owner) = owner {
            query = query.bind(owner);
        }

        query
            .fetch_optional(&mut *self.conn)
            .await
            .context("Failed to fetch social account")?
            .map(SocialAccount::try_from)
            .transpose()
    }

    pub async fn list(
        &mut self,
        scope: Scope,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<SocialAccount>> {
        let mut sql = String::from("SELECT * FROM social_accounts WHERE 1 = 1");
        let owner = scope.push_filter(&mut sql, "owner_id");
        sql.push_str(" ORDER BY platform, account_name LIMIT ? OFFSET ?");

        let mut query = sqlx::query_as::<_, SocialAccountRow>(&sql);
        if let Some(owner) = owner {
            query = query.bind(owner);
        }

        query
            .bind(page_limit(limit))
            .bind(offset.unwrap_or(0) as i64)
            .fetch_all(&mut *self.conn)
            .await
            .context("Failed to list social accounts")?
            .into_iter()
            .map(SocialAccount::try_from)
            .collect()
    }

    pub async fn insert(&mut self, account: &SocialAccount) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO social_accounts (id, owner_id, platform, account_name, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.id.to_string())
        .bind(account.owner_id.to_string())
        .bind(account.platform.as_str())
        .bind(&account.account_name)
        .bind(account.is_active)
        .bind(db_timestamp(account.created_at))
        .bind(db_timestamp(account.updated_at))
        .execute(&mut *self.conn)
        .await
        .context("Failed to insert social account")?;

        Ok(())
    }

    pub async fn update(&mut self, account: &SocialAccount) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE social_accounts
            SET account_name = ?, is_active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&account.account_name)
        .bind(account.is_active)
        .bind(db_timestamp(account.updated_at))
        .bind(account.id.to_string())
        .execute(&mut *self.conn)
        .await
        .context("Failed to update social account")?;

        Ok(())
    }

    pub async fn delete(&mut self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM social_accounts WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *self.conn)
            .await
            .context("Failed to delete social account")?;

        Ok(result.rows_affected() > 0)
    }
}
