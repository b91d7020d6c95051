//! Campaign, content object and social account operations
//!
//! Reads are scoped to the acting user. Every mutation stages its audit intent
//! on the same transaction and flushes after commit.

use anyhow::{Context, Result};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::db::publication_repository::PublicationParent;
use crate::db::{
    CampaignObjectRepository, CampaignRepository, DbPool, PublicationRepository, Scope,
    SocialAccountRepository,
};
use crate::models::{
    AuditContext, Auditable, Campaign, CampaignObject, CreateCampaignObjectRequest,
    CreateCampaignRequest, CreateSocialAccountRequest, ObjectStatus, SocialAccount,
    UpdateCampaignObjectRequest, UpdateCampaignRequest, UpdateSocialAccountRequest,
};
use crate::services::audit;
use crate::utils::validation::validate_window;
use crate::utils::ServiceError;

pub(crate) fn owner_of(ctx: &AuditContext) -> Result<Uuid> {
    ctx.actor_id
        .ok_or_else(|| ServiceError::Invalid("an owning user is required".to_string()).into())
}

/// Refuse a delete that would cascade into a publication being dispatched
async fn ensure_none_in_flight(
    conn: &mut SqliteConnection,
    parent: PublicationParent,
    what: &str,
) -> Result<()> {
    let in_flight = PublicationRepository::new(conn).count_in_flight(parent).await?;
    if in_flight > 0 {
        return Err(ServiceError::InvalidTransition(format!(
            "cannot delete {} while {} publication(s) are being published",
            what, in_flight
        ))
        .into());
    }
    Ok(())
}

pub(crate) fn changed<T: Auditable>(before: &T, after: &T) -> bool {
    before.audit_fields() != after.audit_fields()
}

/// Campaign and content object operations
pub struct CampaignService {
    pool: DbPool,
}

impl CampaignService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        ctx: &AuditContext,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<Campaign>> {
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        CampaignRepository::new(&mut conn)
            .list(Scope::for_actor(ctx.actor_id), limit, offset)
            .await
    }

    pub async fn get(&self, ctx: &AuditContext, id: Uuid) -> Result<Campaign> {
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        CampaignRepository::new(&mut conn)
            .find(Scope::for_actor(ctx.actor_id), id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Campaign".to_string()).into())
    }

    pub async fn create(&self, ctx: &AuditContext, req: CreateCampaignRequest) -> Result<Campaign> {
        let owner_id = owner_of(ctx)?;
        if !validate_window(req.starts_at, req.ends_at) {
            return Err(ServiceError::Invalid("ends_at must not be before starts_at".into()).into());
        }
        let campaign = Campaign::new(owner_id, req);

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        CampaignRepository::new(&mut tx).insert(&campaign).await?;
        audit::stage_create(&mut tx, ctx, &campaign).await?;
        tx.commit().await.context("Failed to commit campaign")?;

        audit::flush_after_commit(&self.pool).await;
        Ok(campaign)
    }

    pub async fn update(
        &self,
        ctx: &AuditContext,
        id: Uuid,
        req: UpdateCampaignRequest,
    ) -> Result<Campaign> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let mut repo = CampaignRepository::new(&mut tx);
        let before = repo
            .find(Scope::for_actor(ctx.actor_id), id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Campaign".to_string()))?;

        let after = before.with_update(&req);
        if !validate_window(after.starts_at, after.ends_at) {
            return Err(ServiceError::Invalid("ends_at must not be before starts_at".into()).into());
        }
        if !changed(&before, &after) {
            return Ok(before);
        }

        repo.update(&after).await?;
        audit::stage_update(&mut tx, ctx, &before, &after).await?;
        tx.commit().await.context("Failed to commit campaign update")?;

        audit::flush_after_commit(&self.pool).await;
        Ok(after)
    }

    /// Delete a campaign together with its content and publications
    pub async fn delete(&self, ctx: &AuditContext, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let campaign = CampaignRepository::new(&mut tx)
            .find(Scope::for_actor(ctx.actor_id), id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Campaign".to_string()))?;

        ensure_none_in_flight(&mut tx, PublicationParent::Campaign(id), "campaign").await?;
        CampaignRepository::new(&mut tx).delete(id).await?;
        audit::stage_delete(&mut tx, ctx, &campaign).await?;
        tx.commit().await.context("Failed to commit campaign delete")?;

        audit::flush_after_commit(&self.pool).await;
        Ok(())
    }

    pub async fn list_objects(
        &self,
        ctx: &AuditContext,
        campaign_id: Option<Uuid>,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<CampaignObject>> {
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        CampaignObjectRepository::new(&mut conn)
            .list(Scope::for_actor(ctx.actor_id), campaign_id, limit, offset)
            .await
    }

    pub async fn get_object(&self, ctx: &AuditContext, id: Uuid) -> Result<CampaignObject> {
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        CampaignObjectRepository::new(&mut conn)
            .find(Scope::for_actor(ctx.actor_id), id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Campaign object".to_string()).into())
    }

    pub async fn create_object(
        &self,
        ctx: &AuditContext,
        req: CreateCampaignObjectRequest,
    ) -> Result<CampaignObject> {
        let object = CampaignObject::new(req);

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        CampaignRepository::new(&mut tx)
            .find(Scope::for_actor(ctx.actor_id), object.campaign_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Campaign".to_string()))?;

        CampaignObjectRepository::new(&mut tx).insert(&object).await?;
        audit::stage_create(&mut tx, ctx, &object).await?;
        tx.commit().await.context("Failed to commit campaign object")?;

        audit::flush_after_commit(&self.pool).await;
        Ok(object)
    }

    pub async fn update_object(
        &self,
        ctx: &AuditContext,
        id: Uuid,
        req: UpdateCampaignObjectRequest,
    ) -> Result<CampaignObject> {
        self.modify_object(ctx, id, |object| Ok(object.with_update(&req)))
            .await
    }

    /// Move an object through its editorial workflow
    pub async fn change_object_status(
        &self,
        ctx: &AuditContext,
        id: Uuid,
        next: ObjectStatus,
    ) -> Result<CampaignObject> {
        self.modify_object(ctx, id, |object| {
            if !object.status.can_transition_to(next) {
                return Err(ServiceError::InvalidTransition(format!(
                    "cannot move content from {} to {}",
                    object.status, next
                ))
                .into());
            }
            let mut updated = object.clone();
            updated.status = next;
            updated.updated_at = chrono::Utc::now();
            Ok(updated)
        })
        .await
    }

    /// Apply `change` to an object inside one audited transaction
    pub(crate) async fn modify_object<F>(
        &self,
        ctx: &AuditContext,
        id: Uuid,
        change: F,
    ) -> Result<CampaignObject>
    where
        F: FnOnce(&CampaignObject) -> Result<CampaignObject>,
    {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let mut repo = CampaignObjectRepository::new(&mut tx);
        let before = repo
            .find(Scope::for_actor(ctx.actor_id), id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Campaign object".to_string()))?;

        let after = change(&before)?;
        if !changed(&before, &after) {
            return Ok(before);
        }

        repo.update(&after).await?;
        audit::stage_update(&mut tx, ctx, &before, &after).await?;
        tx.commit().await.context("Failed to commit campaign object update")?;

        audit::flush_after_commit(&self.pool).await;
        Ok(after)
    }

    pub async fn delete_object(&self, ctx: &AuditContext, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let object = CampaignObjectRepository::new(&mut tx)
            .find(Scope::for_actor(ctx.actor_id), id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Campaign object".to_string()))?;

        ensure_none_in_flight(&mut tx, PublicationParent::CampaignObject(id), "campaign object")
            .await?;
        CampaignObjectRepository::new(&mut tx).delete(id).await?;
        audit::stage_delete(&mut tx, ctx, &object).await?;
        tx.commit().await.context("Failed to commit campaign object delete")?;

        audit::flush_after_commit(&self.pool).await;
        Ok(())
    }
}

/// Social account operations
pub struct AccountService {
    pool: DbPool,
}

impl AccountService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        ctx: &AuditContext,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<SocialAccount>> {
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        SocialAccountRepository::new(&mut conn)
            .list(Scope::for_actor(ctx.actor_id), limit, offset)
            .await
    }

    pub async fn get(&self, ctx: &AuditContext, id: Uuid) -> Result<SocialAccount> {
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        SocialAccountRepository::new(&mut conn)
            .find(Scope::for_actor(ctx.actor_id), id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Social account".to_string()).into())
    }

    pub async fn create(
        &self,
        ctx: &AuditContext,
        req: CreateSocialAccountRequest,
    ) -> Result<SocialAccount> {
        let account = SocialAccount::new(owner_of(ctx)?, req);

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        SocialAccountRepository::new(&mut tx).insert(&account).await?;
        audit::stage_create(&mut tx, ctx, &account).await?;
        tx.commit().await.context("Failed to commit social account")?;

        audit::flush_after_commit(&self.pool).await;
        Ok(account)
    }

    pub async fn update(
        &self,
        ctx: &AuditContext,
        id: Uuid,
        req: UpdateSocialAccountRequest,
    ) -> Result<SocialAccount> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let mut repo = SocialAccountRepository::new(&mut tx);
        let before = repo
            .find(Scope::for_actor(ctx.actor_id), id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Social account".to_string()))?;

        let after = before.with_update(&req);
        if !changed(&before, &after) {
            return Ok(before);
        }

        repo.update(&after).await?;
        audit::stage_update(&mut tx, ctx, &before, &after).await?;
        tx.commit().await.context("Failed to commit social account update")?;

        audit::flush_after_commit(&self.pool).await;
        Ok(after)
    }

    pub async fn delete(&self, ctx: &AuditContext, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let account = SocialAccountRepository::new(&mut tx)
            .find(Scope::for_actor(ctx.actor_id), id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Social account".to_string()))?;

        ensure_none_in_flight(&mut tx, PublicationParent::SocialAccount(id), "social account")
            .await?;
        SocialAccountRepository::new(&mut tx).delete(id).await?;
        audit::stage_delete(&mut tx, ctx, &account).await?;
        tx.commit().await.context("Failed to commit social account delete")?;

        audit::flush_after_commit(&self.pool).await;
        Ok(())
    }
}
