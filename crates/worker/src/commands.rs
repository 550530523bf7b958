//! Operator commands and the member-join hook.
//!
//! Commands arrive as message text from whatever gateway the host wires
//! up; this module parses them, checks where they are allowed and drives
//! the reconciler or a sweep.

use std::sync::Arc;

use tornsync_core::actions::Action;
use tornsync_core::guild::GuildConfig;
use tornsync_core::identity::{parse_target, VerifyTarget};
use tornsync_core::types::DiscordId;

use crate::config_service::GuildConfigService;
use crate::dispatcher::ActionDispatcher;
use crate::platform::{ChatPlatform, Member};
use crate::store::master_key;
use crate::sweeps::{post, SweepError, SweepReport, Sweeps};
use crate::verify::VerificationOutcome;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `!verify [id | @mention]`
    Verify(Option<String>),
    /// `!verifyAll [force]`
    VerifyAll { force: bool },
    /// `!checkFactions [force]`
    CheckFactions { force: bool },
}

/// Parse a message into a command. Unknown commands yield `None`.
pub fn parse_command(content: &str) -> Option<Command> {
    let rest = content.trim().strip_prefix('!')?;
    let mut words = rest.split_whitespace();
    let name = words.next()?;
    let arg = words.next();
    let force = arg.is_some_and(|a| a.eq_ignore_ascii_case("force"));

    match name {
        "verify" | "v" => Some(Command::Verify(arg.map(str::to_string))),
        "verifyAll" | "verifyall" => Some(Command::VerifyAll { force }),
        "checkFactions" | "checkfactions" => Some(Command::CheckFactions { force }),
        _ => None,
    }
}

/// What a handled command did.
#[derive(Debug)]
pub enum Handled {
    /// Not allowed here, or the group is not configured.
    Ignored,
    /// A single reply was posted.
    Replied(String),
    /// A sweep ran; it posted its own lines.
    Swept(SweepReport),
}

pub struct CommandHandler {
    configs: Arc<GuildConfigService>,
    sweeps: Arc<Sweeps>,
    platform: Arc<dyn ChatPlatform>,
}

impl CommandHandler {
    pub fn new(
        configs: Arc<GuildConfigService>,
        sweeps: Arc<Sweeps>,
        platform: Arc<dyn ChatPlatform>,
    ) -> Self {
        Self {
            configs,
            sweeps,
            platform,
        }
    }

    async fn config(&self, guild: DiscordId) -> Option<GuildConfig> {
        match self.configs.get(guild).await {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(guild_id = guild, error = %e, "Could not load guild configuration");
                None
            }
        }
    }

    pub async fn handle(
        &self,
        guild: DiscordId,
        channel: DiscordId,
        author: &Member,
        command: Command,
    ) -> Handled {
        tracing::info!(guild_id = guild, discord_id = author.id, command = ?command, "Command received");
        let Some(config) = self.config(guild).await else {
            return Handled::Ignored;
        };
        let dispatcher = ActionDispatcher::new(self.platform.clone());

        match command {
            Command::Verify(arg) => {
                if !config.verify_allowed_in(channel) {
                    return Handled::Ignored;
                }
                let reply = self.verify(&dispatcher, &config, author, arg.as_deref()).await;
                post(&dispatcher, channel, reply.clone()).await;
                Handled::Replied(reply)
            }
            Command::VerifyAll { force } | Command::CheckFactions { force }
                if !config.is_admin_channel(channel) =>
            {
                tracing::debug!(guild_id = guild, force, "Sweep requested outside the admin channel");
                Handled::Ignored
            }
            Command::VerifyAll { force } => swept(self.sweeps.verify_all(&config, channel, force).await),
            Command::CheckFactions { force } => {
                swept(self.sweeps.check_factions(&config, channel, force).await)
            }
        }
    }

    async fn verify(
        &self,
        dispatcher: &ActionDispatcher,
        config: &GuildConfig,
        author: &Member,
        arg: Option<&str>,
    ) -> String {
        let key = match master_key(&**self.sweeps.entities(), config).await {
            Ok(Some(key)) => key,
            Ok(None) => return "# verify\n< error > No master key given".to_string(),
            Err(e) => {
                tracing::error!(guild_id = config.guild_id, error = %e, "Master key lookup failed");
                return "# verify\n< error > No master key given".to_string();
            }
        };
        if config.verified_role.is_none() {
            return "# verify\n< error > No verified role given".to_string();
        }

        let target = match parse_target(arg) {
            Ok(target) => target,
            Err(msg) => return format!("# Verify\n< error > {msg}"),
        };

        let outcome = self
            .sweeps
            .verifier()
            .verify(dispatcher, config, &key, author.id, target)
            .await;
        format!("# Verify\n{}", outcome.message)
    }

    /// Verify a member as they join and greet them in the welcome channel.
    ///
    /// Returns `None` when nothing was attempted.
    pub async fn handle_member_join(
        &self,
        guild: DiscordId,
        member: &Member,
    ) -> Option<VerificationOutcome> {
        if member.is_bot {
            return None;
        }
        tracing::info!(guild_id = guild, discord_id = member.id, "Member joined");

        let config = self.config(guild).await?;
        let verified_role = config.verified_role?;
        let key = match master_key(&**self.sweeps.entities(), &config).await {
            Ok(key) => key?,
            Err(e) => {
                tracing::error!(guild_id = guild, error = %e, "Master key lookup failed");
                return None;
            }
        };

        let dispatcher = ActionDispatcher::new(self.platform.clone());
        let outcome = self
            .sweeps
            .verifier()
            .verify(&dispatcher, &config, &key, member.id, VerifyTarget::Member(member.id))
            .await;

        let Some(channel) = config.welcome_channel else {
            return Some(outcome);
        };
        post(&dispatcher, channel, format!("# Verify\n {}", outcome.message)).await;

        if !outcome.success && config.force_verify {
            dispatcher
                .run(Action::DirectMessage {
                    user: member.id,
                    text: welcome_message(&config.guild_name, &member.username, verified_role),
                })
                .await;
        }

        Some(outcome)
    }
}

fn swept(result: Result<SweepReport, SweepError>) -> Handled {
    match result {
        Ok(report) => Handled::Swept(report),
        Err(e) => {
            tracing::warn!(error = %e, "Sweep did not run");
            Handled::Replied(e.to_string())
        }
    }
}

fn welcome_message(guild_name: &str, username: &str, verified_role: DiscordId) -> String {
    [
        format!("**Welcome to the {guild_name}'s discord server {username} o/**"),
        "This server requires that you verify your account in order to identify who you are in Torn.".to_string(),
        format!(
            "Go to the official discord server and get verified there: https://torn.com/discord, \
             then come back in the {guild_name} server and type `!verify` in a channel."
        ),
        format!(
            "This process changes your nickname to your Torn name, gives you the <@&{verified_role}> role \
             and roles corresponding to your faction (depending on the server configuration)."
        ),
        "If you change your name or faction you can repeat this verification whenever you want.".to_string(),
    ]
    .join("\n")
}
