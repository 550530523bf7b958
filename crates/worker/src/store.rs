//! Persistence seams used by the loops.
//!
//! The Postgres implementations delegate to the repositories in
//! `tornsync-db`; tests substitute in-memory stores.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::RwLock;
use tornsync_core::guild::GuildConfig;
use tornsync_core::notifications::NotificationState;
use tornsync_core::types::{DiscordId, TornId};
use tornsync_db::models::tracked_entity::NotifierRow;
use tornsync_db::repositories::{GuildConfigRepo, TrackedEntityRepo};
use tornsync_db::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Tracked entities
// ---------------------------------------------------------------------------

#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Cursor over entities with notifications enabled.
    fn stream_enabled(&self) -> BoxStream<'_, Result<NotifierRow, StoreError>>;

    async fn save_notifications(
        &self,
        discord_id: DiscordId,
        state: &NotificationState,
    ) -> Result<(), StoreError>;

    /// Empty the state and disable notifications.
    async fn reset_notifications(&self, torn_id: TornId) -> Result<(), StoreError>;

    /// Credential of a tracked account, if linked.
    async fn credential(&self, torn_id: TornId) -> Result<Option<String>, StoreError>;
}

pub struct PgEntityStore {
    pool: DbPool,
}

impl PgEntityStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    fn stream_enabled(&self) -> BoxStream<'_, Result<NotifierRow, StoreError>> {
        TrackedEntityRepo::stream_enabled(&self.pool)
            .map(|row| row.map_err(StoreError::from))
            .boxed()
    }

    async fn save_notifications(
        &self,
        discord_id: DiscordId,
        state: &NotificationState,
    ) -> Result<(), StoreError> {
        if !TrackedEntityRepo::update_notifications(&self.pool, discord_id, state).await? {
            tracing::warn!(discord_id, "No tracked entity to save notifications for");
        }
        Ok(())
    }

    async fn reset_notifications(&self, torn_id: TornId) -> Result<(), StoreError> {
        TrackedEntityRepo::reset_notifications(&self.pool, torn_id).await?;
        Ok(())
    }

    async fn credential(&self, torn_id: TornId) -> Result<Option<String>, StoreError> {
        Ok(TrackedEntityRepo::find_by_torn_id(&self.pool, torn_id)
            .await?
            .map(|e| e.api_key))
    }
}

/// The credential used for group-level calls, if the group names one and
/// it is linked.
pub async fn master_key(
    store: &dyn EntityStore,
    config: &GuildConfig,
) -> Result<Option<String>, StoreError> {
    match config.master_key_owner {
        Some(owner) => store.credential(owner).await,
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Guild configs
// ---------------------------------------------------------------------------

#[async_trait]
pub trait GuildConfigStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<GuildConfig>, StoreError>;

    async fn load(&self, guild_id: DiscordId) -> Result<Option<GuildConfig>, StoreError>;

    /// Persist and return the stored copy.
    async fn save(&self, config: &GuildConfig) -> Result<GuildConfig, StoreError>;
}

pub struct PgGuildConfigStore {
    pool: DbPool,
}

impl PgGuildConfigStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GuildConfigStore for PgGuildConfigStore {
    async fn load_all(&self) -> Result<Vec<GuildConfig>, StoreError> {
        Ok(GuildConfigRepo::list(&self.pool).await?)
    }

    async fn load(&self, guild_id: DiscordId) -> Result<Option<GuildConfig>, StoreError> {
        Ok(GuildConfigRepo::get(&self.pool, guild_id).await?)
    }

    async fn save(&self, config: &GuildConfig) -> Result<GuildConfig, StoreError> {
        Ok(GuildConfigRepo::upsert(&self.pool, config).await?)
    }
}

/// In-memory store seeded up front. Backs the worker's integration tests
/// in place of Postgres.
#[derive(Default)]
pub struct MemoryGuildConfigStore {
    configs: RwLock<BTreeMap<DiscordId, GuildConfig>>,
}

impl MemoryGuildConfigStore {
    pub fn new(configs: impl IntoIterator<Item = GuildConfig>) -> Self {
        Self {
            configs: RwLock::new(configs.into_iter().map(|c| (c.guild_id, c)).collect()),
        }
    }
}

#[async_trait]
impl GuildConfigStore for MemoryGuildConfigStore {
    async fn load_all(&self) -> Result<Vec<GuildConfig>, StoreError> {
        Ok(self.configs.read().await.values().cloned().collect())
    }

    async fn load(&self, guild_id: DiscordId) -> Result<Option<GuildConfig>, StoreError> {
        Ok(self.configs.read().await.get(&guild_id).cloned())
    }

    async fn save(&self, config: &GuildConfig) -> Result<GuildConfig, StoreError> {
        self.configs
            .write()
            .await
            .insert(config.guild_id, config.clone());
        Ok(config.clone())
    }
}
