//! Coarse loop: checkpoint-gated daily and weekly sweeps.
//!
//! A job runs when `now - checkpoint >= period`. The checkpoint is advanced
//! and persisted before the job body starts; if that write fails the job is
//! not run this tick.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tornsync_core::guild::GuildConfig;
use tornsync_core::scheduling::ScheduledJob;
use tornsync_core::types::{epoch_now, DiscordId};

use crate::config_service::GuildConfigService;
use crate::dispatcher::ActionDispatcher;
use crate::platform::ChatPlatform;
use crate::sweeps::{post, Sweeps};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub guild_id: DiscordId,
    pub job: ScheduledJob,
    pub reason: String,
}

/// Summary of one coarse tick.
#[derive(Debug, Default)]
pub struct ScheduleReport {
    /// Jobs whose checkpoint was advanced.
    pub ran: Vec<(DiscordId, ScheduledJob)>,
    pub failures: Vec<JobFailure>,
}

pub struct CoarseScheduler {
    configs: Arc<GuildConfigService>,
    sweeps: Arc<Sweeps>,
    platform: Arc<dyn ChatPlatform>,
    interval: Duration,
}

impl CoarseScheduler {
    pub fn new(
        configs: Arc<GuildConfigService>,
        sweeps: Arc<Sweeps>,
        platform: Arc<dyn ChatPlatform>,
        interval: Duration,
    ) -> Self {
        Self {
            configs,
            sweeps,
            platform,
            interval,
        }
    }

    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        tracing::info!(interval_secs = self.interval.as_secs(), "Scheduler started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Scheduler cancelled");
                    break;
                }
                _ = interval.tick() => {
                    let report = self.tick(epoch_now()).await;
                    tracing::debug!(
                        ran = report.ran.len(),
                        failed = report.failures.len(),
                        "Scheduler tick finished"
                    );
                }
            }
        }
    }

    /// Run every job that is due at `now`, group by group.
    pub async fn tick(&self, now: i64) -> ScheduleReport {
        let mut report = ScheduleReport::default();

        let configs = match self.configs.load_all().await {
            Ok(configs) => configs,
            Err(e) => {
                tracing::error!(error = %e, "Could not load guild configurations");
                return report;
            }
        };

        for config in configs {
            for job in ScheduledJob::ALL {
                if !config.checkpoints.get(job).is_due(now, job.period_secs()) {
                    continue;
                }
                self.run_job(&config, job, now, &mut report).await;
            }
        }

        report
    }

    async fn run_job(
        &self,
        config: &GuildConfig,
        job: ScheduledJob,
        now: i64,
        report: &mut ScheduleReport,
    ) {
        let guild_id = config.guild_id;

        let config = match self.configs.record_run(guild_id, job, now).await {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(guild_id, job = %job, error = %e, "Could not advance checkpoint, skipping job");
                report.failures.push(JobFailure {
                    guild_id,
                    job,
                    reason: e.to_string(),
                });
                return;
            }
        };
        report.ran.push((guild_id, job));

        let Some(channel) = config.admin_channel else {
            tracing::info!(guild_id, job = %job, "No admin channel, skipping job");
            return;
        };

        tracing::info!(guild_id, job = %job, "Running scheduled job");
        let dispatcher = ActionDispatcher::new(self.platform.clone());
        post(&dispatcher, channel, format!("{} < START >", job.title())).await;

        let result = if job.is_verify() {
            self.sweeps.verify_all(&config, channel, true).await
        } else {
            self.sweeps.check_factions(&config, channel, true).await
        };
        if let Err(e) = result {
            tracing::error!(guild_id, job = %job, error = %e, "Scheduled job failed");
            report.failures.push(JobFailure {
                guild_id,
                job,
                reason: e.to_string(),
            });
        }

        post(&dispatcher, channel, format!("{} < DONE >", job.title())).await;
    }
}

