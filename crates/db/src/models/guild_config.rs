//! Guild configuration rows.

use sqlx::types::Json;
use sqlx::FromRow;
use tornsync_core::guild::GuildConfig;
use tornsync_core::types::Timestamp;

/// A row from the `guild_configs` table.
#[derive(Debug, Clone, FromRow)]
pub struct GuildConfigRow {
    pub guild_id: i64,
    pub guild_name: String,
    pub config: Json<GuildConfig>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl GuildConfigRow {
    /// The stored document, with the row's key and name taking precedence.
    pub fn into_config(self) -> GuildConfig {
        let mut config = self.config.0;
        config.guild_id = self.guild_id as u64;
        config.guild_name = self.guild_name;
        config
    }
}
