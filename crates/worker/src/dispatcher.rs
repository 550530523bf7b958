//! Executes [`Action`]s against the chat platform.
//!
//! A dispatcher lives for one call (one tick, one verification, one
//! sweep). Failures are logged here; those whose tolerance is
//! [`Tolerance::Report`] are handed back so the caller can put them in its
//! result text. Role creation is attempted at most once per name for the
//! dispatcher's lifetime.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tornsync_core::actions::{Action, Tolerance};
use tornsync_core::types::DiscordId;

use crate::platform::{ChatPlatform, PlatformError, Role};

/// A reported action failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFailure {
    pub action: Action,
    pub error: PlatformError,
}

impl std::fmt::Display for ActionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.action.kind(), self.error)
    }
}

pub struct ActionDispatcher {
    platform: Arc<dyn ChatPlatform>,
    /// Outcome of each role creation attempted so far, keyed by group and name.
    created: Mutex<HashMap<(DiscordId, String), Option<Role>>>,
}

impl ActionDispatcher {
    pub fn new(platform: Arc<dyn ChatPlatform>) -> Self {
        Self {
            platform,
            created: Mutex::new(HashMap::new()),
        }
    }

    pub fn platform(&self) -> &Arc<dyn ChatPlatform> {
        &self.platform
    }

    /// Run one action, applying its failure tolerance.
    ///
    /// Returns the failure only when the action's tolerance is
    /// [`Tolerance::Report`].
    pub async fn run(&self, action: Action) -> Option<ActionFailure> {
        let error = self.execute(&action).await.err()?;
        match action.tolerance() {
            Tolerance::Ignore => {
                tracing::warn!(action = action.kind(), error = %error, "Chat action failed, ignoring");
                None
            }
            Tolerance::Report => {
                tracing::error!(action = action.kind(), error = %error, "Chat action failed");
                Some(ActionFailure { action, error })
            }
        }
    }

    /// Run several actions in order, collecting reported failures.
    pub async fn run_all(&self, actions: impl IntoIterator<Item = Action>) -> Vec<ActionFailure> {
        let mut failures = Vec::new();
        for action in actions {
            if let Some(failure) = self.run(action).await {
                failures.push(failure);
            }
        }
        failures
    }

    /// Create a role unless this dispatcher already tried.
    ///
    /// A failed attempt is remembered and not retried.
    pub async fn create_role(&self, guild: DiscordId, name: &str) -> Result<Role, PlatformError> {
        let key = (guild, name.to_string());
        let mut created = self.created.lock().await;
        if let Some(previous) = created.get(&key) {
            return previous.clone().ok_or_else(|| {
                PlatformError::Request(format!("role {name} could not be created earlier"))
            });
        }

        let result = self.platform.create_role(guild, name).await;
        created.insert(key, result.as_ref().ok().cloned());
        if let Ok(role) = &result {
            tracing::info!(guild_id = guild, role_id = role.id, role = %role.name, "Role created");
        }
        result
    }

    async fn execute(&self, action: &Action) -> Result<(), PlatformError> {
        match action {
            Action::DirectMessage { user, text } => {
                self.platform.send_direct_message(*user, text).await
            }
            Action::ChannelMessage { channel, text } => {
                self.platform.send_channel_message(*channel, text).await
            }
            Action::AddRole { guild, user, role } => self.platform.add_role(*guild, *user, *role).await,
            Action::RemoveRole { guild, user, role } => {
                self.platform.remove_role(*guild, *user, *role).await
            }
            Action::EditNickname {
                guild,
                user,
                nickname,
            } => self.platform.edit_nickname(*guild, *user, nickname).await,
            Action::CreateRole { guild, name } => self.create_role(*guild, name).await.map(|_| ()),
        }
    }
}
