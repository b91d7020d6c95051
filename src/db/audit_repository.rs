//! Audit log repository
//!
//! Two tables back the audit trail: `audit_intents` is written inside the
//! mutating transaction, `audit_log` is the append-only record the intents
//! are moved into.

use anyhow::{Context, Result};
use sqlx::{FromRow, SqliteConnection};
use uuid::Uuid;

use super::{db_timestamp, page_limit, timestamp_from_db, uuid_from_db, Scope};
use crate::models::{AuditAction, AuditLogEntry, AuditLogQuery};

#[derive(Debug, FromRow)]
struct AuditRow {
    id: String,
    actor_id: Option<String>,
    action: String,
    entity_type: String,
    entity_id: Option<String>,
    old_values: Option<String>,
    new_values: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: String,
}

#[derive(Debug, FromRow)]
struct IntentRow {
    seq: i64,
    #[sqlx(flatten)]
    entry: AuditRow,
}

impl TryFrom<AuditRow> for AuditLogEntry {
    type Error = anyhow::Error;

    fn try_from(row: AuditRow) -> Result<Self> {
        let action = AuditAction::parse(&row.action)
            .with_context(|| format!("Unknown audit action '{}'", row.action))?;

        Ok(Self {
            id: uuid_from_db(&row.id),
            actor_id: row.actor_id.as_deref().map(uuid_from_db),
            action,
            entity_type: row.entity_type,
            entity_id: row.entity_id.as_deref().map(uuid_from_db),
            old_values: parse_values(row.old_values)?,
            new_values: parse_values(row.new_values)?,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            created_at: timestamp_from_db(&row.created_at),
        })
    }
}

fn parse_values(raw: Option<String>) -> Result<Option<serde_json::Value>> {
    raw.map(|s| serde_json::from_str(&s).context("Invalid JSON in audit values"))
        .transpose()
}

pub struct AuditRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> AuditRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Stage an intent on the current transaction
    pub async fn stage(&mut self, entry: &AuditLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_intents (
                id, actor_id, action, entity_type, entity_id,
                old_values, new_values, ip_address, user_agent, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.actor_id.map(|id| id.to_string()))
        .bind(entry.action.as_str())
        .bind(&entry.entity_type)
        .bind(entry.entity_id.map(|id| id.to_string()))
        .bind(entry.old_values.as_ref().map(|v| v.to_string()))
        .bind(entry.new_values.as_ref().map(|v| v.to_string()))
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(db_timestamp(entry.created_at))
        .execute(&mut *self.conn)
        .await
        .context("Failed to stage audit intent")?;

        Ok(())
    }

    /// Remove up to `limit` of the oldest intents and return them in staging order
    pub async fn take_intents(&mut self, limit: u32) -> Result<Vec<AuditLogEntry>> {
        let mut rows = sqlx::query_as::<_, IntentRow>(
            r#"
            DELETE FROM audit_intents
            WHERE seq IN (SELECT seq FROM audit_intents ORDER BY seq LIMIT ?)
            RETURNING *
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&mut *self.conn)
        .await
        .context("Failed to take audit intents")?;

        rows.sort_by_key(|row| row.seq);
        rows.into_iter()
            .map(|row| AuditLogEntry::try_from(row.entry))
            .collect()
    }

    /// Append an entry to the audit log; an id already present is skipped
    pub async fn append(&mut self, entry: &AuditLogEntry) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO audit_log (
                id, actor_id, action, entity_type, entity_id,
                old_values, new_values, ip_address, user_agent, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.actor_id.map(|id| id.to_string()))
        .bind(entry.action.as_str())
        .bind(&entry.entity_type)
        .bind(entry.entity_id.map(|id| id.to_string()))
        .bind(entry.old_values.as_ref().map(|v| v.to_string()))
        .bind(entry.new_values.as_ref().map(|v| v.to_string()))
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(db_timestamp(entry.created_at))
        .execute(&mut *self.conn)
        .await
        .context("Failed to append audit log entry")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn pending_count(&mut self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM audit_intents")
            .fetch_one(&mut *self.conn)
            .await
            .context("Failed to count audit intents")
    }

    pub async fn find(&mut self, id: Uuid) -> Result<Option<AuditLogEntry>> {
        sqlx::query_as::<_, AuditRow>("SELECT * FROM audit_log WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *self.conn)
            .await
            .context("Failed to fetch audit log entry")?
            .map(AuditLogEntry::try_from)
            .transpose()
    }

    /// List audit entries; a scoped caller only sees entries they authored
    pub async fn list(&mut self, scope: Scope, query: &AuditLogQuery) -> Result<Vec<AuditLogEntry>> {
        let mut sql = String::from("SELECT * FROM audit_log WHERE 1 = 1");
        let actor = scope.push_filter(&mut sql, "actor_id");

        if query.entity_type.is_some() {
            sql.push_str(" AND entity_type = ?");
        }
        if query.entity_id.is_some() {
            sql.push_str(" AND entity_id = ?");
        }
        if query.action.is_some() {
            sql.push_str(" AND action = ?");
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");

        let mut q = sqlx::query_as::<_, AuditRow>(&sql);
        if let Some(actor) = actor {
            q = q.bind(actor);
        }
        if let Some(ref entity_type) = query.entity_type {
            q = q.bind(entity_type);
        }
        if let Some(entity_id) = query.entity_id {
            q = q.bind(entity_id.to_string());
        }
        if let Some(action) = query.action {
            q = q.bind(action.as_str());
        }

        q.bind(page_limit(query.limit))
            .bind(query.offset.unwrap_or(0) as i64)
            .fetch_all(&mut *self.conn)
            .await
            .context("Failed to list audit logs")?
            .into_iter()
            .map(AuditLogEntry::try_from)
            .collect()
    }
}
