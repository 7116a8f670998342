use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::{domain::RunStatus, feed::FeedSource};

use super::pipeline::PostPipeline;

/// Period of the recurring check. Fixed; not read from configuration.
pub const REFRESH_PERIOD: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy)]
pub enum Trigger {
    Startup,
    Scheduled,
    OnDemand,
}

impl Trigger {
    fn label(self) -> &'static str {
        match self {
            Trigger::Startup => "startup",
            Trigger::Scheduled => "scheduled",
            Trigger::OnDemand => "on-demand",
        }
    }
}

/// Serializes pipeline runs. At most one run is in flight; timer ticks that
/// arrive during a run are dropped, on-demand requests wait their turn.
pub struct RunCoordinator {
    pipeline: PostPipeline,
    source: Arc<dyn FeedSource>,
    in_flight: Mutex<()>,
}

impl RunCoordinator {
    pub fn new(pipeline: PostPipeline, source: Arc<dyn FeedSource>) -> Self {
        Self {
            pipeline,
            source,
            in_flight: Mutex::new(()),
        }
    }

    /// Returns `None` when the trigger was dropped because a run was active.
    pub async fn run_scheduled(&self, trigger: Trigger) -> Option<RunStatus> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::info!(
                target: "scheduler",
                trigger = trigger.label(),
                "run already in progress; trigger dropped"
            );
            return None;
        };
        Some(self.execute(trigger).await)
    }

    /// Resolves once no run is in flight.
    pub async fn wait_idle(&self) {
        drop(self.in_flight.lock().await);
    }

    pub async fn run_on_demand(&self) -> RunStatus {
        let _guard = self.in_flight.lock().await;
        self.execute(Trigger::OnDemand).await
    }

    async fn execute(&self, trigger: Trigger) -> RunStatus {
        tracing::info!(target: "scheduler", trigger = trigger.label(), "checking for new posts");

        let batch = match self.source.fetch_latest().await {
            Ok(batch) => batch,
            Err(err) => {
                tracing::warn!(
                    target: "feed",
                    error = %err,
                    "feed fetch failed; continuing with an empty batch"
                );
                Vec::new()
            }
        };

        match self.pipeline.run(batch).await {
            Ok(report) => RunStatus::Completed(report),
            Err(err) => {
                tracing::error!(
                    target: "scheduler",
                    trigger = trigger.label(),
                    error = %err,
                    "pipeline run failed"
                );
                RunStatus::Failed(err.to_string())
            }
        }
    }
}

pub async fn configure_refresh_job(
    coordinator: Arc<RunCoordinator>,
    period: Duration,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;
    let job = Job::new_repeated_async(period, move |_id, _l| {
        let coordinator = coordinator.clone();
        Box::pin(async move {
            coordinator.run_scheduled(Trigger::Scheduled).await;
        })
    })?;
    scheduler.add(job).await?;
    scheduler.start().await?;
    tracing::info!(
        target: "scheduler",
        period_secs = period.as_secs(),
        "refresh job registered"
    );
    Ok(scheduler)
}
