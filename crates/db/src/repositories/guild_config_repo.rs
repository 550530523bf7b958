//! Repository for the `guild_configs` table.

use sqlx::types::Json;
use sqlx::PgPool;
use tornsync_core::guild::GuildConfig;
use tornsync_core::types::DiscordId;

use crate::models::guild_config::GuildConfigRow;

/// Column list for `guild_configs` queries.
const COLUMNS: &str = "guild_id, guild_name, config, created_at, updated_at";

/// Provides data access for guild configurations.
pub struct GuildConfigRepo;

impl GuildConfigRepo {
    pub async fn list(pool: &PgPool) -> Result<Vec<GuildConfig>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM guild_configs ORDER BY guild_id");
        let rows = sqlx::query_as::<_, GuildConfigRow>(&query)
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(GuildConfigRow::into_config).collect())
    }

    pub async fn get(
        pool: &PgPool,
        guild_id: DiscordId,
    ) -> Result<Option<GuildConfig>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM guild_configs WHERE guild_id = $1");
        let row = sqlx::query_as::<_, GuildConfigRow>(&query)
            .bind(guild_id as i64)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(GuildConfigRow::into_config))
    }

    /// Insert or replace a group's configuration document.
    pub async fn upsert(pool: &PgPool, config: &GuildConfig) -> Result<GuildConfig, sqlx::Error> {
        let query = format!(
            "INSERT INTO guild_configs (guild_id, guild_name, config) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (guild_id) DO UPDATE SET \
                 guild_name = EXCLUDED.guild_name, \
                 config = EXCLUDED.config, \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, GuildConfigRow>(&query)
            .bind(config.guild_id as i64)
            .bind(&config.guild_name)
            .bind(Json(config))
            .fetch_one(pool)
            .await?;
        Ok(row.into_config())
    }
}
