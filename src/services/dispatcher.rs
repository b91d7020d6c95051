//! Scheduled publication dispatcher
//!
//! One pass recovers abandoned claims, atomically claims the publications that
//! are due, publishes each through the configured [`Publisher`] and records
//! the outcome. Every status change is audited under the system actor in the
//! same transaction as the change itself.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::DispatcherConfig;
use crate::db::publication_repository::PublishOutcome;
use crate::db::{
    CampaignObjectRepository, DbPool, PublicationRepository, Scope, SocialAccountRepository,
};
use crate::models::{AuditContext, Publication, PublicationStatus};
use crate::services::audit;
use crate::services::publisher::{PublishRequest, Publisher};

/// What happened to one claimed publication
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DispatchOutcome {
    pub publication_id: Uuid,
    pub status: PublicationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of one dispatch pass
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    pub worker_id: String,
    pub claimed: usize,
    pub published: usize,
    pub failed: usize,
    pub recovered_stale: usize,
    /// Claims taken over by another worker before the outcome was written
    pub lost_claims: usize,
    /// Outcomes that could not be written; those rows stay `publishing`
    pub record_errors: usize,
    pub outcomes: Vec<DispatchOutcome>,
    pub duration_ms: u64,
}

impl DispatchResult {
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.record_errors > 0
    }
}

pub struct PublicationDispatcher {
    pool: DbPool,
    publisher: Arc<dyn Publisher>,
    config: DispatcherConfig,
}

impl PublicationDispatcher {
    pub fn new(pool: DbPool, publisher: Arc<dyn Publisher>, config: DispatcherConfig) -> Self {
        Self {
            pool,
            publisher,
            config,
        }
    }

    /// Publications that a pass at `now` would claim
    pub async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Publication>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire database connection")?;
        PublicationRepository::new(&mut conn).list_due(now).await
    }

    /// Run one dispatch pass.
    ///
    /// Due publications are claimed `batch_size` at a time until none remain.
    pub async fn dispatch_due(&self, now: DateTime<Utc>) -> Result<DispatchResult> {
        let started = Instant::now();
        let worker_id = format!("dispatcher-{}", Uuid::new_v4());
        let ctx = AuditContext::system();

        let recovered = self.recover_stale(&ctx, now).await?;
        if !recovered.is_empty() {
            warn!(count = recovered.len(), "Failed publications with expired claims");
        }

        let mut result = DispatchResult {
            worker_id: worker_id.clone(),
            claimed: 0,
            published: 0,
            failed: 0,
            recovered_stale: recovered.len(),
            lost_claims: 0,
            record_errors: 0,
            outcomes: Vec::new(),
            duration_ms: 0,
        };

        loop {
            let claimed = self.claim(&ctx, &worker_id, now).await?;
            if claimed.is_empty() {
                break;
            }
            debug!(worker_id = %worker_id, claimed = claimed.len(), "Claimed due publications");
            result.claimed += claimed.len();

            for publication in &claimed {
                let outcome = self.publish_one(publication).await;
                match self.record(&ctx, &worker_id, publication, &outcome).await {
                    Ok(Some(updated)) => {
                        match updated.status {
                            PublicationStatus::Published => result.published += 1,
                            _ => result.failed += 1,
                        }
                        result.outcomes.push(DispatchOutcome {
                            publication_id: updated.id,
                            status: updated.status,
                            external_post_id: updated.external_post_id,
                            error: updated.error_message,
                        });
                    }
                    Ok(None) => {
                        warn!(
                            publication_id = %publication.id,
                            worker_id = %worker_id,
                            "Claim lost before the outcome was recorded"
                        );
                        result.lost_claims += 1;
                    }
                    Err(e) => {
                        // The row stays in publishing until stale recovery fails it
                        error!(publication_id = %publication.id, error = %e, "Failed to record outcome");
                        result.record_errors += 1;
                    }
                }
            }

            audit::flush_after_commit(&self.pool).await;
        }

        result.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            worker_id = %result.worker_id,
            claimed = result.claimed,
            published = result.published,
            failed = result.failed,
            recovered_stale = result.recovered_stale,
            record_errors = result.record_errors,
            duration_ms = result.duration_ms,
            "Dispatch pass complete"
        );

        Ok(result)
    }

    async fn recover_stale(&self, ctx: &AuditContext, now: DateTime<Utc>) -> Result<Vec<Publication>> {
        let cutoff = now - Duration::seconds(self.config.claim_timeout_secs as i64);

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let recovered = PublicationRepository::new(&mut tx)
            .recover_stale(cutoff, now)
            .await?;
        for publication in &recovered {
            let mut before = publication.clone();
            before.status = PublicationStatus::Publishing;
            before.error_message = None;
            audit::stage_update(&mut tx, ctx, &before, publication).await?;
        }
        tx.commit().await.context("Failed to commit stale claim recovery")?;

        Ok(recovered)
    }

    async fn claim(
        &self,
        ctx: &AuditContext,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Publication>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let claimed = PublicationRepository::new(&mut tx)
            .claim_due(worker_id, now, self.config.batch_size)
            .await?;
        for publication in &claimed {
            let mut before = publication.clone();
            before.status = PublicationStatus::Scheduled;
            audit::stage_update(&mut tx, ctx, &before, publication).await?;
        }
        tx.commit().await.context("Failed to commit publication claim")?;

        audit::flush_after_commit(&self.pool).await;
        Ok(claimed)
    }

    /// Deliver one claimed publication; every failure becomes an outcome
    async fn publish_one(&self, publication: &Publication) -> PublishOutcome {
        match self.try_publish(publication).await {
            Ok(outcome) => outcome,
            Err(e) => PublishOutcome::Failed {
                error: format!("{:#}", e),
            },
        }
    }

    async fn try_publish(&self, publication: &Publication) -> Result<PublishOutcome> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire database connection")?;

        let object = CampaignObjectRepository::new(&mut conn)
            .find(Scope::Unrestricted, publication.campaign_object_id)
            .await?;
        let account = SocialAccountRepository::new(&mut conn)
            .find(Scope::Unrestricted, publication.social_account_id)
            .await?;
        drop(conn);

        let Some(object) = object else {
            return Ok(PublishOutcome::Failed {
                error: "campaign object not found".to_string(),
            });
        };
        let Some(account) = account else {
            return Ok(PublishOutcome::Failed {
                error: "social account not found".to_string(),
            });
        };
        if !account.is_active {
            return Ok(PublishOutcome::Failed {
                error: format!("social account {} is inactive", account.account_name),
            });
        }

        let request = PublishRequest {
            publication,
            object: &object,
            account: &account,
        };
        let outcome = match self.publisher.publish(request).await {
            Ok(receipt) => PublishOutcome::Published {
                external_post_id: receipt.external_post_id,
            },
            Err(e) => {
                warn!(
                    publication_id = %publication.id,
                    publisher = self.publisher.name(),
                    error = %e,
                    "Publish failed"
                );
                PublishOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        Ok(outcome)
    }

    async fn record(
        &self,
        ctx: &AuditContext,
        worker_id: &str,
        claimed: &Publication,
        outcome: &PublishOutcome,
    ) -> Result<Option<Publication>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let updated = PublicationRepository::new(&mut tx)
            .complete(claimed.id, worker_id, outcome, Utc::now())
            .await?;
        if let Some(ref updated) = updated {
            audit::stage_update(&mut tx, ctx, claimed, updated).await?;
        }
        tx.commit().await.context("Failed to commit publication outcome")?;

        Ok(updated)
    }
}
