use crate::config::SchedulerConfig;
use crate::poller::PollController;
use crate::utils::error::Result;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

/// Drives recurring poll cycles on the shared controller. Overlap control
/// lives in the controller itself, so a slow cycle simply swallows the
/// next tick.
pub struct PollScheduler {
    scheduler: JobScheduler,
    controller: Arc<PollController>,
    config: SchedulerConfig,
}

impl PollScheduler {
    pub async fn new(controller: Arc<PollController>, config: SchedulerConfig) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            scheduler,
            controller,
            config,
        })
    }

    /// Registers the cron job and starts ticking. With `run_on_start` set,
    /// one cycle fires immediately instead of waiting out the first
    /// interval.
    pub async fn start(&mut self) -> Result<()> {
        let controller = Arc::clone(&self.controller);
        let job = Job::new_async(self.config.poll_interval.as_str(), move |_uuid, _lock| {
            let controller = Arc::clone(&controller);
            Box::pin(async move {
                controller.run_cycle().await;
            })
        })?;

        self.scheduler.add(job).await?;
        self.scheduler.start().await?;
        info!(
            "Poll scheduler started with interval: {}",
            self.config.poll_interval
        );

        if self.config.run_on_start {
            let controller = Arc::clone(&self.controller);
            tokio::spawn(async move {
                controller.run_cycle().await;
            });
        }

        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler.shutdown().await?;
        info!("Poll scheduler shutdown");
        Ok(())
    }
}
