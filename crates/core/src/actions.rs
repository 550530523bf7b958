//! Chat-platform side effects and how their failures are treated.

use crate::types::DiscordId;

/// One side effect against the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    DirectMessage {
        user: DiscordId,
        text: String,
    },
    ChannelMessage {
        channel: DiscordId,
        text: String,
    },
    AddRole {
        guild: DiscordId,
        user: DiscordId,
        role: DiscordId,
    },
    RemoveRole {
        guild: DiscordId,
        user: DiscordId,
        role: DiscordId,
    },
    CreateRole {
        guild: DiscordId,
        name: String,
    },
    EditNickname {
        guild: DiscordId,
        user: DiscordId,
        nickname: String,
    },
}

/// What happens to a failed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tolerance {
    /// Logged, otherwise ignored.
    Ignore,
    /// Logged and handed back to the caller for its result text.
    Report,
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DirectMessage { .. } => "direct_message",
            Self::ChannelMessage { .. } => "channel_message",
            Self::AddRole { .. } => "add_role",
            Self::RemoveRole { .. } => "remove_role",
            Self::CreateRole { .. } => "create_role",
            Self::EditNickname { .. } => "edit_nickname",
        }
    }

    /// Message sends and nickname edits are best effort; role mutations
    /// are operator-actionable and get reported.
    pub fn tolerance(&self) -> Tolerance {
        match self {
            Self::DirectMessage { .. } | Self::ChannelMessage { .. } | Self::EditNickname { .. } => {
                Tolerance::Ignore
            }
            Self::AddRole { .. } | Self::RemoveRole { .. } | Self::CreateRole { .. } => {
                Tolerance::Report
            }
        }
    }
}
