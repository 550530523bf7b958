//! Repository for the `tracked_entities` table.
//!
//! The notification loop reads through [`TrackedEntityRepo::stream_enabled`],
//! a server-side cursor, and writes each entity back with a single
//! `UPDATE ... WHERE discord_id = $2`.

use futures::stream::BoxStream;
use sqlx::PgPool;
use tornsync_core::notifications::NotificationState;
use tornsync_core::types::{DiscordId, TornId};

use crate::models::tracked_entity::{LinkEntity, NotifierRow, TrackedEntity};

/// Column list for `tracked_entities` queries.
const COLUMNS: &str = "\
    id, torn_id, discord_id, api_key, notifications_enabled, notifications, \
    created_at, updated_at";

const STREAM_ENABLED: &str = "\
    SELECT torn_id, discord_id, api_key, notifications \
    FROM tracked_entities \
    WHERE notifications_enabled \
    ORDER BY id";

/// Provides data access for tracked entities.
pub struct TrackedEntityRepo;

impl TrackedEntityRepo {
    /// Stream every entity with notifications enabled.
    ///
    /// Rows arrive as the server produces them; nothing is buffered
    /// beyond the driver's batch.
    pub fn stream_enabled(pool: &PgPool) -> BoxStream<'_, Result<NotifierRow, sqlx::Error>> {
        sqlx::query_as::<_, NotifierRow>(STREAM_ENABLED).fetch(pool)
    }

    /// Persist an entity's notification state.
    ///
    /// Returns `false` if no row matched.
    pub async fn update_notifications(
        pool: &PgPool,
        discord_id: DiscordId,
        state: &NotificationState,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tracked_entities SET notifications = $1, updated_at = NOW() \
             WHERE discord_id = $2",
        )
        .bind(state.to_json())
        .bind(discord_id as i64)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Empty the state and turn notifications off.
    pub async fn reset_notifications(pool: &PgPool, torn_id: TornId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tracked_entities \
             SET notifications = $1, notifications_enabled = FALSE, updated_at = NOW() \
             WHERE torn_id = $2",
        )
        .bind(NotificationState::new().to_json())
        .bind(torn_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Enable or disable notifications, keeping the stored state.
    pub async fn set_notifications_enabled(
        pool: &PgPool,
        discord_id: DiscordId,
        enabled: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tracked_entities SET notifications_enabled = $1, updated_at = NOW() \
             WHERE discord_id = $2",
        )
        .bind(enabled)
        .bind(discord_id as i64)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_torn_id(
        pool: &PgPool,
        torn_id: TornId,
    ) -> Result<Option<TrackedEntity>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tracked_entities WHERE torn_id = $1");
        sqlx::query_as::<_, TrackedEntity>(&query)
            .bind(torn_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_discord_id(
        pool: &PgPool,
        discord_id: DiscordId,
    ) -> Result<Option<TrackedEntity>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tracked_entities WHERE discord_id = $1");
        sqlx::query_as::<_, TrackedEntity>(&query)
            .bind(discord_id as i64)
            .fetch_optional(pool)
            .await
    }

    /// Link an account, or refresh the credential of an existing link.
    ///
    /// New links start with an empty notification state.
    pub async fn link(pool: &PgPool, dto: &LinkEntity) -> Result<TrackedEntity, sqlx::Error> {
        let query = format!(
            "INSERT INTO tracked_entities (torn_id, discord_id, api_key, notifications) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (torn_id) DO UPDATE SET \
                 discord_id = EXCLUDED.discord_id, \
                 api_key = EXCLUDED.api_key, \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TrackedEntity>(&query)
            .bind(dto.torn_id)
            .bind(dto.discord_id as i64)
            .bind(&dto.api_key)
            .bind(NotificationState::new().to_json())
            .fetch_one(pool)
            .await
    }

    /// Remove a link. Returns `true` if a row was deleted.
    pub async fn unlink(pool: &PgPool, torn_id: TornId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tracked_entities WHERE torn_id = $1")
            .bind(torn_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
