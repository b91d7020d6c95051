//! Audit recorder
//!
//! Mutations stage an audit intent on their own transaction, so an entity
//! change and its intent commit or roll back together. [`flush`] later moves
//! committed intents into the append-only `audit_log`; it is safe to run
//! concurrently and to repeat after a crash.

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::SqliteConnection;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::{AuditRepository, DbPool};
use crate::models::{AuditAction, AuditContext, AuditLogEntry, Auditable};

/// Intents moved per flush transaction
const FLUSH_BATCH_SIZE: u32 = 200;

/// Field-level difference between two snapshots.
///
/// Returns `None` when nothing changed; otherwise the old and new values of
/// the changed fields only.
pub fn diff_fields(
    old: &Map<String, Value>,
    new: &Map<String, Value>,
) -> Option<(Map<String, Value>, Map<String, Value>)> {
    let mut old_changed = Map::new();
    let mut new_changed = Map::new();

    for (key, new_value) in new {
        let old_value = old.get(key).unwrap_or(&Value::Null);
        if old_value != new_value {
            old_changed.insert(key.clone(), old_value.clone());
            new_changed.insert(key.clone(), new_value.clone());
        }
    }
    for (key, old_value) in old {
        if !new.contains_key(key) && !old_value.is_null() {
            old_changed.insert(key.clone(), old_value.clone());
            new_changed.insert(key.clone(), Value::Null);
        }
    }

    if new_changed.is_empty() {
        None
    } else {
        Some((old_changed, new_changed))
    }
}

fn is_audit_log<T: Auditable>() -> bool {
    T::ENTITY_TYPE == AuditLogEntry::ENTITY_TYPE
}

fn entry(
    ctx: &AuditContext,
    action: AuditAction,
    entity_type: &str,
    entity_id: Option<Uuid>,
    old_values: Option<Map<String, Value>>,
    new_values: Option<Map<String, Value>>,
) -> AuditLogEntry {
    AuditLogEntry {
        id: Uuid::new_v4(),
        actor_id: ctx.actor_id,
        action,
        entity_type: entity_type.to_string(),
        entity_id,
        old_values: old_values.map(Value::Object),
        new_values: new_values.map(Value::Object),
        ip_address: ctx.ip_address.clone(),
        user_agent: ctx.user_agent.clone(),
        created_at: Utc::now(),
    }
}

/// Audit entry for a created entity, or `None` if the type is not audited
pub fn create_entry<T: Auditable>(ctx: &AuditContext, entity: &T) -> Option<AuditLogEntry> {
    if is_audit_log::<T>() {
        return None;
    }
    Some(entry(
        ctx,
        AuditAction::Create,
        T::ENTITY_TYPE,
        entity.audit_id(),
        None,
        Some(entity.audit_fields()),
    ))
}

/// Audit entry for an update, or `None` if no tracked field changed
pub fn update_entry<T: Auditable>(
    ctx: &AuditContext,
    before: &T,
    after: &T,
) -> Option<AuditLogEntry> {
    if is_audit_log::<T>() {
        return None;
    }
    let (old_values, new_values) = diff_fields(&before.audit_fields(), &after.audit_fields())?;
    Some(entry(
        ctx,
        AuditAction::Update,
        T::ENTITY_TYPE,
        after.audit_id().or_else(|| before.audit_id()),
        Some(old_values),
        Some(new_values),
    ))
}

pub fn delete_entry<T: Auditable>(ctx: &AuditContext, entity: &T) -> Option<AuditLogEntry> {
    if is_audit_log::<T>() {
        return None;
    }
    Some(entry(
        ctx,
        AuditAction::Delete,
        T::ENTITY_TYPE,
        entity.audit_id(),
        Some(entity.audit_fields()),
        None,
    ))
}

async fn stage(conn: &mut SqliteConnection, entry: Option<AuditLogEntry>) -> Result<bool> {
    match entry {
        Some(entry) => {
            AuditRepository::new(conn).stage(&entry).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Stage a create intent on the caller's transaction
pub async fn stage_create<T: Auditable>(
    conn: &mut SqliteConnection,
    ctx: &AuditContext,
    entity: &T,
) -> Result<bool> {
    stage(conn, create_entry(ctx, entity)).await
}

/// Stage an update intent; nothing is written when no field changed
pub async fn stage_update<T: Auditable>(
    conn: &mut SqliteConnection,
    ctx: &AuditContext,
    before: &T,
    after: &T,
) -> Result<bool> {
    stage(conn, update_entry(ctx, before, after)).await
}

pub async fn stage_delete<T: Auditable>(
    conn: &mut SqliteConnection,
    ctx: &AuditContext,
    entity: &T,
) -> Result<bool> {
    stage(conn, delete_entry(ctx, entity)).await
}

/// Move committed intents into the audit log.
///
/// Each batch is taken and appended in one transaction. Returns the number of
/// audit records written.
pub async fn flush(pool: &DbPool) -> Result<usize> {
    let mut written = 0;

    loop {
        let mut tx = pool
            .begin()
            .await
            .context("Failed to begin audit flush transaction")?;

        let mut repo = AuditRepository::new(&mut *tx);
        let intents = repo.take_intents(FLUSH_BATCH_SIZE).await?;
        let taken = intents.len();

        for intent in &intents {
            if repo.append(intent).await? {
                written += 1;
            }
        }

        tx.commit()
            .await
            .context("Failed to commit audit flush transaction")?;

        if taken < FLUSH_BATCH_SIZE as usize {
            break;
        }
    }

    if written > 0 {
        debug!(written, "Flushed audit intents");
    }

    Ok(written)
}

/// Flush after a committed mutation; failures leave intents for the next flush
pub async fn flush_after_commit(pool: &DbPool) {
    if let Err(e) = flush(pool).await {
        warn!(error = %e, "Audit flush failed; intents kept for the next flush");
    }
}
