//! Fine loop: per-entity notification reconciliation.
//!
//! Every tick walks the enabled entities through a streaming cursor, one
//! at a time: fetch snapshot, diff against the persisted state, send the
//! resulting direct messages, persist the new state. A failing entity is
//! logged and recorded in the tick report; the cursor keeps going.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tornsync_core::actions::Action;
use tornsync_core::error::ApiError;
use tornsync_core::notifications::{reconcile, selections_for};
use tornsync_core::redact::redact_key;
use tornsync_core::types::{DiscordId, TornId};
use tornsync_db::models::tracked_entity::NotifierRow;
use tornsync_torn::TornClient;

use crate::dispatcher::ActionDispatcher;
use crate::platform::{ChatPlatform, PlatformError};
use crate::store::{EntityStore, StoreError};

/// Failure of one entity's reconciliation step.
#[derive(Debug, thiserror::Error)]
enum EntityError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

enum Outcome {
    Sent(usize),
    Reset,
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityFailure {
    pub torn_id: TornId,
    /// Redacted failure text.
    pub reason: String,
}

/// Summary of one tick.
#[derive(Debug, Default)]
pub struct NotifyReport {
    pub processed: usize,
    /// Direct messages attempted.
    pub notified: usize,
    /// Entities reset because their member left the main group.
    pub reset: usize,
    pub failures: Vec<EntityFailure>,
}

pub struct NotificationLoop {
    store: Arc<dyn EntityStore>,
    torn: Arc<dyn TornClient>,
    platform: Arc<dyn ChatPlatform>,
    main_guild: DiscordId,
    interval: Duration,
}

impl NotificationLoop {
    pub fn new(
        store: Arc<dyn EntityStore>,
        torn: Arc<dyn TornClient>,
        platform: Arc<dyn ChatPlatform>,
        main_guild: DiscordId,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            torn,
            platform,
            main_guild,
            interval,
        }
    }

    /// Tick until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        tracing::info!(interval_secs = self.interval.as_secs(), "Notification loop started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Notification loop cancelled");
                    break;
                }
                _ = interval.tick() => {
                    match self.tick(&cancel).await {
                        Ok(report) => tracing::debug!(
                            processed = report.processed,
                            notified = report.notified,
                            reset = report.reset,
                            failed = report.failures.len(),
                            "Notification tick finished"
                        ),
                        Err(e) => tracing::error!(error = %e, "Notification tick aborted"),
                    }
                }
            }
        }
    }

    /// One pass over every enabled entity.
    ///
    /// Only a cursor failure aborts the pass. Cancellation is observed
    /// between entities, so an in-flight entity always finishes its write.
    pub async fn tick(&self, cancel: &CancellationToken) -> Result<NotifyReport, StoreError> {
        let dispatcher = ActionDispatcher::new(self.platform.clone());
        let mut report = NotifyReport::default();

        let mut rows = self.store.stream_enabled();
        while let Some(row) = rows.next().await {
            if cancel.is_cancelled() {
                tracing::info!(processed = report.processed, "Notification tick interrupted");
                break;
            }
            let row = row?;
            report.processed += 1;

            match self.process(&dispatcher, &row).await {
                Ok(Outcome::Sent(count)) => report.notified += count,
                Ok(Outcome::Reset) => report.reset += 1,
                Ok(Outcome::Idle) => {}
                Err(e) => {
                    let reason = redact_key(&e.to_string(), Some(&row.api_key));
                    match &e {
                        EntityError::Api(_) => {
                            tracing::warn!(torn_id = row.torn_id, error = %reason, "Notification fetch failed")
                        }
                        _ => tracing::error!(torn_id = row.torn_id, error = %reason, "Notification step failed"),
                    }
                    report.failures.push(EntityFailure {
                        torn_id: row.torn_id,
                        reason,
                    });
                }
            }
        }

        Ok(report)
    }

    async fn process(
        &self,
        dispatcher: &ActionDispatcher,
        row: &NotifierRow,
    ) -> Result<Outcome, EntityError> {
        let discord_id = row.discord_id();

        if self.platform.member(self.main_guild, discord_id).await?.is_none() {
            tracing::info!(torn_id = row.torn_id, discord_id, "Member left the main group, resetting notifications");
            self.store.reset_notifications(row.torn_id).await?;
            return Ok(Outcome::Reset);
        }

        let prev = row.notification_state();
        let enabled = prev.enabled();
        if enabled.is_empty() {
            return Ok(Outcome::Idle);
        }

        let selections = selections_for(&enabled);
        let snapshot = self.torn.user(None, &selections, &row.api_key).await?;
        let result = reconcile(&prev, &snapshot, &enabled);

        let sent = result.actions.len();
        dispatcher
            .run_all(result.actions.into_iter().map(|a| Action::DirectMessage {
                user: discord_id,
                text: a.text,
            }))
            .await;

        self.store.save_notifications(discord_id, &result.state).await?;
        Ok(if sent > 0 { Outcome::Sent(sent) } else { Outcome::Idle })
    }
}
