//! Tracked entity rows.

use sqlx::FromRow;
use tornsync_core::notifications::NotificationState;
use tornsync_core::types::{DiscordId, Timestamp, TornId};

// ---------------------------------------------------------------------------
// Entity structs (database rows)
// ---------------------------------------------------------------------------

/// A row from the `tracked_entities` table.
///
/// Not `Serialize`: the row carries a credential.
#[derive(Debug, Clone, FromRow)]
pub struct TrackedEntity {
    pub id: i64,
    pub torn_id: TornId,
    pub discord_id: i64,
    pub api_key: String,
    pub notifications_enabled: bool,
    pub notifications: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TrackedEntity {
    pub fn discord_id(&self) -> DiscordId {
        self.discord_id as DiscordId
    }

    /// Decoded notification state (legacy blobs included).
    pub fn notification_state(&self) -> NotificationState {
        NotificationState::from_json(&self.notifications)
    }
}

/// The subset the notification cursor selects.
#[derive(Debug, Clone, FromRow)]
pub struct NotifierRow {
    pub torn_id: TornId,
    pub discord_id: i64,
    pub api_key: String,
    pub notifications: serde_json::Value,
}

impl NotifierRow {
    pub fn discord_id(&self) -> DiscordId {
        self.discord_id as DiscordId
    }

    pub fn notification_state(&self) -> NotificationState {
        NotificationState::from_json(&self.notifications)
    }
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// DTO for linking an account.
#[derive(Debug, Clone)]
pub struct LinkEntity {
    pub torn_id: TornId,
    pub discord_id: DiscordId,
    pub api_key: String,
}
