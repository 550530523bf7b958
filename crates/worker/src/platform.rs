//! Chat-platform capabilities the reconcilers depend on.
//!
//! Each method is one side effect or one lookup.
//! [`DiscordRest`](crate::discord::DiscordRest) implements it over HTTP;
//! tests use in-memory fakes.

use std::collections::BTreeSet;

use async_trait::async_trait;
use tornsync_core::identity::RoleRef;
use tornsync_core::types::DiscordId;

/// A member of a chat group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: DiscordId,
    pub username: String,
    pub display_name: String,
    pub is_bot: bool,
    pub role_ids: BTreeSet<DiscordId>,
}

impl Member {
    pub fn has_role(&self, role: DiscordId) -> bool {
        self.role_ids.contains(&role)
    }
}

/// A role of a chat group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: DiscordId,
    pub name: String,
}

impl From<&Role> for RoleRef {
    fn from(role: &Role) -> Self {
        RoleRef {
            id: role.id,
            name: role.name.clone(),
        }
    }
}

/// Failure of one chat-platform call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    /// The bot lacks the permission for this action.
    #[error("missing permission: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Network failure or any other rejected request.
    #[error("request failed: {0}")]
    Request(String),
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn send_direct_message(&self, user: DiscordId, text: &str) -> Result<(), PlatformError>;

    async fn send_channel_message(
        &self,
        channel: DiscordId,
        text: &str,
    ) -> Result<(), PlatformError>;

    async fn add_role(
        &self,
        guild: DiscordId,
        user: DiscordId,
        role: DiscordId,
    ) -> Result<(), PlatformError>;

    async fn remove_role(
        &self,
        guild: DiscordId,
        user: DiscordId,
        role: DiscordId,
    ) -> Result<(), PlatformError>;

    async fn create_role(&self, guild: DiscordId, name: &str) -> Result<Role, PlatformError>;

    async fn edit_nickname(
        &self,
        guild: DiscordId,
        user: DiscordId,
        nickname: &str,
    ) -> Result<(), PlatformError>;

    async fn guild_members(&self, guild: DiscordId) -> Result<Vec<Member>, PlatformError>;

    async fn guild_roles(&self, guild: DiscordId) -> Result<Vec<Role>, PlatformError>;

    /// `Ok(None)` when the user is not a member of the group.
    async fn member(
        &self,
        guild: DiscordId,
        user: DiscordId,
    ) -> Result<Option<Member>, PlatformError>;
}
