//! Publication operations
//!
//! Users create, edit, schedule and delete publications while they are in
//! `draft` or `scheduled`. Everything after that belongs to the dispatcher.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::db::{
    CampaignObjectRepository, DbPool, PublicationRepository, Scope, SocialAccountRepository,
};
use crate::models::{
    AuditContext, CreatePublicationRequest, Publication, PublicationQuery, PublicationStatus,
    UpdatePublicationRequest,
};
use crate::services::audit;
use crate::services::campaigns::changed;
use crate::utils::validation::validate_window;
use crate::utils::ServiceError;

fn locked(publication: &Publication) -> anyhow::Error {
    ServiceError::InvalidTransition(format!(
        "publication is {} and can no longer be changed",
        publication.status
    ))
    .into()
}

/// Check that the content object and account are visible to the actor
async fn ensure_targets(
    conn: &mut SqliteConnection,
    scope: Scope,
    campaign_object_id: Uuid,
    social_account_id: Uuid,
) -> Result<()> {
    CampaignObjectRepository::new(&mut *conn)
        .find(scope, campaign_object_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Campaign object".to_string()))?;
    SocialAccountRepository::new(&mut *conn)
        .find(scope, social_account_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Social account".to_string()))?;
    Ok(())
}

pub struct PublicationService {
    pool: DbPool,
}

impl PublicationService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, ctx: &AuditContext, query: &PublicationQuery) -> Result<Vec<Publication>> {
        if !validate_window(query.from, query.to) {
            return Err(ServiceError::Invalid("'to' must not be before 'from'".into()).into());
        }
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        PublicationRepository::new(&mut conn)
            .list(Scope::for_actor(ctx.actor_id), query)
            .await
    }

    pub async fn get(&self, ctx: &AuditContext, id: Uuid) -> Result<Publication> {
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        PublicationRepository::new(&mut conn)
            .find(Scope::for_actor(ctx.actor_id), id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Publication".to_string()).into())
    }

    pub async fn create(
        &self,
        ctx: &AuditContext,
        req: CreatePublicationRequest,
    ) -> Result<Publication> {
        let publication = Publication::new(req);

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        ensure_targets(
            &mut tx,
            Scope::for_actor(ctx.actor_id),
            publication.campaign_object_id,
            publication.social_account_id,
        )
        .await?;

        PublicationRepository::new(&mut tx).insert(&publication).await?;
        audit::stage_create(&mut tx, ctx, &publication).await?;
        tx.commit().await.context("Failed to commit publication")?;

        audit::flush_after_commit(&self.pool).await;
        Ok(publication)
    }

    pub async fn update(
        &self,
        ctx: &AuditContext,
        id: Uuid,
        req: UpdatePublicationRequest,
    ) -> Result<Publication> {
        self.modify(ctx, id, |before| Ok(before.with_update(&req)))
            .await
    }

    /// Schedule a draft, or move the time of an already scheduled publication
    pub async fn schedule(
        &self,
        ctx: &AuditContext,
        id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Publication> {
        self.modify(ctx, id, |before| {
            if before.status != PublicationStatus::Scheduled
                && !before.status.can_transition_to(PublicationStatus::Scheduled)
            {
                return Err(ServiceError::InvalidTransition(format!(
                    "cannot schedule a publication that is {}",
                    before.status
                ))
                .into());
            }
            let mut after = before.clone();
            after.status = PublicationStatus::Scheduled;
            after.scheduled_at = Some(scheduled_at);
            after.updated_at = Utc::now();
            Ok(after)
        })
        .await
    }

    async fn modify<F>(&self, ctx: &AuditContext, id: Uuid, change: F) -> Result<Publication>
    where
        F: FnOnce(&Publication) -> Result<Publication>,
    {
        let scope = Scope::for_actor(ctx.actor_id);
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let before = PublicationRepository::new(&mut tx)
            .find(scope, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Publication".to_string()))?;

        if !before.status.is_editable() {
            return Err(locked(&before));
        }

        let after = change(&before)?;
        if after.status == PublicationStatus::Scheduled && after.scheduled_at.is_none() {
            return Err(ServiceError::Invalid("a scheduled publication needs scheduled_at".into()).into());
        }
        if !changed(&before, &after) {
            return Ok(before);
        }
        if after.social_account_id != before.social_account_id {
            ensure_targets(&mut tx, scope, after.campaign_object_id, after.social_account_id)
                .await?;
        }

        let written = PublicationRepository::new(&mut tx)
            .update_editable(&after, before.status)
            .await?;
        if !written {
            return Err(locked(&before));
        }
        audit::stage_update(&mut tx, ctx, &before, &after).await?;
        tx.commit().await.context("Failed to commit publication update")?;

        audit::flush_after_commit(&self.pool).await;
        Ok(after)
    }

    pub async fn delete(&self, ctx: &AuditContext, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let mut repo = PublicationRepository::new(&mut tx);
        let publication = repo
            .find(Scope::for_actor(ctx.actor_id), id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Publication".to_string()))?;

        if !publication.status.is_editable() || !repo.delete_editable(id).await? {
            return Err(locked(&publication));
        }
        audit::stage_delete(&mut tx, ctx, &publication).await?;
        tx.commit().await.context("Failed to commit publication delete")?;

        audit::flush_after_commit(&self.pool).await;
        Ok(())
    }
}
