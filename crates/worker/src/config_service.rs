//! Single access point for guild configuration.
//!
//! Reads are served from an in-memory cache; every write goes to the store
//! first and the cache is refreshed from what the store returns. A failed
//! write evicts the cached entry so the next read goes back to the store.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tornsync_core::guild::GuildConfig;
use tornsync_core::scheduling::ScheduledJob;
use tornsync_core::types::DiscordId;

use crate::store::{GuildConfigStore, StoreError};

pub struct GuildConfigService {
    store: Arc<dyn GuildConfigStore>,
    cache: RwLock<HashMap<DiscordId, GuildConfig>>,
}

impl GuildConfigService {
    pub fn new(store: Arc<dyn GuildConfigStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the cache with every persisted configuration.
    pub async fn load_all(&self) -> Result<Vec<GuildConfig>, StoreError> {
        let configs = self.store.load_all().await?;
        let mut cache = self.cache.write().await;
        cache.clear();
        cache.extend(configs.iter().map(|c| (c.guild_id, c.clone())));
        Ok(configs)
    }

    pub async fn get(&self, guild_id: DiscordId) -> Result<Option<GuildConfig>, StoreError> {
        if let Some(config) = self.cache.read().await.get(&guild_id) {
            return Ok(Some(config.clone()));
        }
        let loaded = self.store.load(guild_id).await?;
        if let Some(config) = &loaded {
            self.cache.write().await.insert(guild_id, config.clone());
        }
        Ok(loaded)
    }

    /// Write through to the store.
    pub async fn save(&self, config: &GuildConfig) -> Result<GuildConfig, StoreError> {
        match self.store.save(config).await {
            Ok(stored) => {
                self.cache.write().await.insert(stored.guild_id, stored.clone());
                Ok(stored)
            }
            Err(e) => {
                self.cache.write().await.remove(&config.guild_id);
                Err(e)
            }
        }
    }

    /// Advance a job's checkpoint to `now` and persist it.
    pub async fn record_run(
        &self,
        guild_id: DiscordId,
        job: ScheduledJob,
        now: i64,
    ) -> Result<GuildConfig, StoreError> {
        let mut config = self
            .get(guild_id)
            .await?
            .ok_or_else(|| StoreError::Unavailable(format!("no configuration for guild {guild_id}")))?;
        config.checkpoints.set(job, now);
        self.save(&config).await
    }
}
