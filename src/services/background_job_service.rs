use anyhow::{anyhow, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::models::Timezone;
use crate::services::SessionService;

/// Periodic maintenance jobs. Currently only the `pending -> assigned` promotion.
pub struct BackgroundJobService {
    scheduler: Arc<RwLock<JobScheduler>>,
    session_service: SessionService,
    timezone: Timezone,
}

impl BackgroundJobService {
    pub async fn new(session_service: SessionService, timezone: Timezone) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| anyhow!("Failed to create job scheduler: {}", e))?;

        Ok(Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
            session_service,
            timezone,
        })
    }

    /// Registers the promotion job on `cron` and starts the scheduler.
    pub async fn start(&self, cron: &str) -> Result<()> {
        self.add_promotion_job(cron).await?;

        let scheduler = self.scheduler.read().await;
        scheduler
            .start()
            .await
            .map_err(|e| anyhow!("Failed to start job scheduler: {}", e))?;

        info!(%cron, timezone = %self.timezone, "Background job scheduler started");
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        let mut scheduler = self.scheduler.write().await;
        scheduler
            .shutdown()
            .await
            .map_err(|e| anyhow!("Failed to stop job scheduler: {}", e))?;

        info!("Background job scheduler stopped");
        Ok(())
    }

    /// One promotion pass, as run by the scheduled job.
    pub async fn run_promotion(&self) -> Result<u64> {
        Self::promotion_job(self.session_service.clone(), self.timezone).await
    }

    async fn add_promotion_job(&self, cron: &str) -> Result<()> {
        let session_service = self.session_service.clone();
        let timezone = self.timezone;

        let job = Job::new_async(cron, move |_uuid, _l| {
            let session_service = session_service.clone();

            Box::pin(async move {
                if let Err(e) = Self::promotion_job(session_service, timezone).await {
                    error!("Session promotion job failed: {}", e);
                }
            })
        })
        .map_err(|e| anyhow!("Failed to create session promotion job: {}", e))?;

        let scheduler = self.scheduler.write().await;
        scheduler
            .add(job)
            .await
            .map_err(|e| anyhow!("Failed to add session promotion job to scheduler: {}", e))?;

        info!("Added session promotion job");
        Ok(())
    }

    async fn promotion_job(session_service: SessionService, timezone: Timezone) -> Result<u64> {
        let promoted = session_service
            .promote_due_sessions(Utc::now(), timezone)
            .await?;
        Ok(promoted)
    }
}
