//! AI-assisted content operations
//!
//! Text generation goes straight to the generation API. Image and video
//! generation is asynchronous: a job is recorded, handed to the workflow
//! service, and completed later by a signed callback.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{CampaignObjectRepository, DbPool, GenerationJobRepository, Scope};
use crate::models::{
    AuditContext, CampaignObject, ContentType, CreateMediaJobRequest, GenerateForObjectRequest,
    GenerateTextRequest, GeneratedContent, GenerationJob, JobStatus, WorkflowCallback,
};
use crate::services::audit;
use crate::services::campaigns::CampaignService;
use crate::services::generation::GenerationClient;
use crate::services::workflow::{verify_signature, WorkflowClient};
use crate::utils::validation::validate_http_url;
use crate::utils::{IntegrationError, ServiceError};

/// Generated text for a content object, plus the object when it was updated
#[derive(Debug, Clone, Serialize)]
pub struct ObjectGeneration {
    #[serde(flatten)]
    pub generated: GeneratedContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<CampaignObject>,
}

pub struct ContentService {
    pool: DbPool,
    generation: Option<Arc<GenerationClient>>,
    workflow: Option<Arc<WorkflowClient>>,
}

impl ContentService {
    pub fn new(
        pool: DbPool,
        generation: Option<Arc<GenerationClient>>,
        workflow: Option<Arc<WorkflowClient>>,
    ) -> Self {
        Self {
            pool,
            generation,
            workflow,
        }
    }

    fn generation(&self) -> Result<&GenerationClient, IntegrationError> {
        self.generation
            .as_deref()
            .ok_or_else(|| IntegrationError::NotConfigured("Generation API".to_string()))
    }

    fn workflow(&self) -> Result<&WorkflowClient, IntegrationError> {
        self.workflow
            .as_deref()
            .ok_or_else(|| IntegrationError::NotConfigured("Workflow webhook".to_string()))
    }

    /// Free-form text generation
    pub async fn generate_text(&self, req: &GenerateTextRequest) -> Result<GeneratedContent> {
        let client = self.generation()?;
        Ok(client
            .generate(req.content_type, &req.prompt, &req.options)
            .await?)
    }

    /// Generate text for a content object, optionally storing it as its content
    pub async fn generate_for_object(
        &self,
        ctx: &AuditContext,
        object_id: Uuid,
        req: &GenerateForObjectRequest,
    ) -> Result<ObjectGeneration> {
        let client = self.generation()?;
        let campaigns = CampaignService::new(self.pool.clone());
        let object = campaigns.get_object(ctx, object_id).await?;

        let generated = client
            .generate(ContentType::from(object.object_type), &req.prompt, &req.options)
            .await?;

        let object = if req.apply {
            let content = generated.content.clone();
            let updated = campaigns
                .modify_object(ctx, object_id, move |object| {
                    let mut updated = object.clone();
                    updated.content = Some(content);
                    updated.updated_at = Utc::now();
                    Ok(updated)
                })
                .await?;
            Some(updated)
        } else {
            None
        };

        Ok(ObjectGeneration { generated, object })
    }

    pub async fn get_job(&self, ctx: &AuditContext, id: Uuid) -> Result<GenerationJob> {
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        GenerationJobRepository::new(&mut conn)
            .find(Scope::for_actor(ctx.actor_id), id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Generation job".to_string()).into())
    }

    pub async fn list_jobs(&self, ctx: &AuditContext, object_id: Uuid) -> Result<Vec<GenerationJob>> {
        let scope = Scope::for_actor(ctx.actor_id);
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        CampaignObjectRepository::new(&mut conn)
            .find(scope, object_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Campaign object".to_string()))?;
        GenerationJobRepository::new(&mut conn)
            .list_for_object(scope, object_id)
            .await
    }

    /// Record a media job and hand it to the workflow service.
    ///
    /// A delivery failure marks the job failed and is returned to the caller.
    pub async fn create_media_job(
        &self,
        ctx: &AuditContext,
        object_id: Uuid,
        req: CreateMediaJobRequest,
    ) -> Result<GenerationJob> {
        let workflow = self.workflow()?;
        let job = GenerationJob::new(object_id, req);

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        CampaignObjectRepository::new(&mut tx)
            .find(Scope::for_actor(ctx.actor_id), object_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Campaign object".to_string()))?;
        GenerationJobRepository::new(&mut tx).insert(&job).await?;
        audit::stage_create(&mut tx, ctx, &job).await?;
        tx.commit().await.context("Failed to commit generation job")?;
        audit::flush_after_commit(&self.pool).await;

        let delivery = workflow
            .trigger(job.kind, job.id, object_id, &job.prompt, &job.options)
            .await;

        let mut next = job.clone();
        next.updated_at = Utc::now();
        match &delivery {
            Ok(()) => next.status = JobStatus::Processing,
            Err(e) => {
                next.status = JobStatus::Failed;
                next.error_message = Some(e.to_string());
            }
        }

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let mut repo = GenerationJobRepository::new(&mut tx);
        let written = repo.update_status(&next, JobStatus::Pending).await?;
        let current = if written {
            audit::stage_update(&mut tx, ctx, &job, &next).await?;
            next
        } else {
            // The callback already finished the job
            repo.find(Scope::Unrestricted, job.id)
                .await?
                .unwrap_or(next)
        };
        tx.commit().await.context("Failed to commit generation job status")?;
        audit::flush_after_commit(&self.pool).await;

        delivery?;
        Ok(current)
    }

    /// Apply a signed status report from the workflow service
    pub async fn handle_callback(&self, body: &[u8], signature: Option<&str>) -> Result<GenerationJob> {
        let workflow = self.workflow()?;
        let signature = signature
            .ok_or_else(|| ServiceError::Unauthorized("missing webhook signature".to_string()))?;
        if !verify_signature(workflow.webhook_secret(), body, signature) {
            warn!("Rejected workflow callback with an invalid signature");
            return Err(ServiceError::Unauthorized("invalid webhook signature".to_string()).into());
        }

        let callback: WorkflowCallback = serde_json::from_slice(body)
            .map_err(|e| ServiceError::Invalid(format!("invalid callback body: {}", e)))?;
        if !callback.status.is_finished() {
            return Err(ServiceError::Invalid(format!(
                "callback status must be completed or failed, got {}",
                callback.status
            ))
            .into());
        }
        let result_url = match (callback.status, callback.result_url.as_deref()) {
            (JobStatus::Completed, Some(url)) if validate_http_url(url) => Some(url.to_string()),
            (JobStatus::Completed, _) => {
                return Err(ServiceError::Invalid(
                    "a completed callback needs a valid resultUrl".to_string(),
                )
                .into())
            }
            _ => None,
        };

        let ctx = AuditContext::system();
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let before = GenerationJobRepository::new(&mut tx)
            .find(Scope::Unrestricted, callback.job_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Generation job".to_string()))?;

        if before.status.is_finished() {
            if before.status == callback.status {
                return Ok(before);
            }
            return Err(ServiceError::InvalidTransition(format!(
                "generation job is already {}",
                before.status
            ))
            .into());
        }

        let mut after = before.clone();
        after.status = callback.status;
        after.result_url = result_url.clone();
        after.error_message = match callback.status {
            JobStatus::Failed => Some(
                callback
                    .error
                    .clone()
                    .unwrap_or_else(|| "workflow reported failure".to_string()),
            ),
            _ => None,
        };
        after.updated_at = Utc::now();

        if !GenerationJobRepository::new(&mut tx)
            .update_status(&after, before.status)
            .await?
        {
            return Err(ServiceError::InvalidTransition(
                "generation job changed concurrently".to_string(),
            )
            .into());
        }
        audit::stage_update(&mut tx, &ctx, &before, &after).await?;

        if let Some(url) = result_url {
            let mut objects = CampaignObjectRepository::new(&mut tx);
            if let Some(object) = objects.find(Scope::Unrestricted, after.campaign_object_id).await? {
                let mut updated = object.clone();
                updated.media_url = Some(url);
                updated.updated_at = Utc::now();
                objects.update(&updated).await?;
                audit::stage_update(&mut tx, &ctx, &object, &updated).await?;
            }
        }

        tx.commit().await.context("Failed to commit workflow callback")?;
        audit::flush_after_commit(&self.pool).await;

        info!(job_id = %after.id, status = %after.status, "Workflow callback applied");
        Ok(after)
    }
}
