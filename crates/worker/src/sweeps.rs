//! Bulk sweeps over a group's members.
//!
//! Both sweeps process members sequentially with the group's master
//! credential, report one line per failed member and always end with an
//! explicit done marker.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tornsync_core::actions::Action;
use tornsync_core::guild::GuildConfig;
use tornsync_core::identity::{parse_torn_id_from_display_name, VerifyTarget};
use tornsync_core::scheduling::state_machine::{validate_transition, VerificationState};
use tornsync_core::text::unescape_html;
use tornsync_core::types::DiscordId;
use tornsync_torn::TornClient;

use crate::dispatcher::ActionDispatcher;
use crate::platform::{ChatPlatform, Member, PlatformError};
use crate::store::{master_key, EntityStore, StoreError};
use crate::verify::IdentityReconciler;

/// Selections needed to read a faction roster.
const ROSTER_SELECTIONS: &[&str] = &["basic"];

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("no master key")]
    NoMasterKey,

    #[error("no verified role set")]
    NoVerifiedRole,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Outcome of one sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Members a verification was attempted for.
    pub processed: usize,
    /// One entry per failed member.
    pub failures: Vec<(DiscordId, String)>,
    /// Final verification state of every member visited.
    pub states: BTreeMap<DiscordId, VerificationState>,
}

impl SweepReport {
    fn advance(&mut self, member: DiscordId, to: VerificationState) {
        let from = self
            .states
            .get(&member)
            .copied()
            .unwrap_or(VerificationState::Unverified);
        if let Err(e) = validate_transition(from, to) {
            tracing::warn!(discord_id = member, error = %e, "Unexpected verification transition");
        }
        self.states.insert(member, to);
    }
}

pub struct Sweeps {
    verifier: Arc<IdentityReconciler>,
    torn: Arc<dyn TornClient>,
    platform: Arc<dyn ChatPlatform>,
    entities: Arc<dyn EntityStore>,
}

impl Sweeps {
    pub fn new(
        verifier: Arc<IdentityReconciler>,
        torn: Arc<dyn TornClient>,
        platform: Arc<dyn ChatPlatform>,
        entities: Arc<dyn EntityStore>,
    ) -> Self {
        Self {
            verifier,
            torn,
            platform,
            entities,
        }
    }

    pub fn verifier(&self) -> &Arc<IdentityReconciler> {
        &self.verifier
    }

    pub fn entities(&self) -> &Arc<dyn EntityStore> {
        &self.entities
    }

    /// Verify every member of the group.
    ///
    /// Without `force`, members already holding the verified role are
    /// skipped and every result is posted; with `force`, everyone is
    /// re-checked and only failures are posted.
    pub async fn verify_all(
        &self,
        config: &GuildConfig,
        channel: DiscordId,
        force: bool,
    ) -> Result<SweepReport, SweepError> {
        let dispatcher = ActionDispatcher::new(self.platform.clone());
        let title = format!("# Verifying all members of {}", config.guild_name);

        let Some(key) = master_key(&*self.entities, config).await? else {
            post(&dispatcher, channel, format!("{title}\n< error > no master key")).await;
            return Err(SweepError::NoMasterKey);
        };
        let Some(verified_role) = config.verified_role else {
            post(&dispatcher, channel, format!("{title}\n< error > no verified roles set")).await;
            return Err(SweepError::NoVerifiedRole);
        };

        let roles = self.platform.guild_roles(config.guild_id).await?;
        let role_name = roles
            .iter()
            .find(|r| r.id == verified_role)
            .map(|r| r.name.clone())
            .unwrap_or_else(|| verified_role.to_string());
        let members = self.platform.guild_members(config.guild_id).await?;

        post(
            &dispatcher,
            channel,
            format!("{title}\n< Force > {force}\n< Verified role > @{role_name}"),
        )
        .await;

        let candidates: Vec<&Member> = members
            .iter()
            .filter(|m| !m.is_bot)
            .filter(|m| force || !m.has_role(verified_role))
            .collect();
        let total = candidates.len();

        let mut report = SweepReport::default();
        for (i, member) in candidates.into_iter().enumerate() {
            if member.has_role(verified_role) {
                report.states.insert(member.id, VerificationState::Verified);
            }
            report.advance(member.id, VerificationState::Resolving);

            let outcome = self
                .verifier
                .verify(&dispatcher, config, &key, member.id, VerifyTarget::Member(member.id))
                .await;
            report.processed += 1;

            if outcome.success {
                report.advance(member.id, VerificationState::Verified);
            } else {
                tracing::info!(guild_id = config.guild_id, discord_id = member.id, "Member failed verification");
                report.advance(member.id, VerificationState::Failed);
                report.failures.push((member.id, outcome.message.clone()));
            }

            if !force || !outcome.success {
                post(
                    &dispatcher,
                    channel,
                    format!(
                        "< {:03}/{total:03} > {}: {}",
                        i + 1,
                        member.display_name,
                        outcome.message
                    ),
                )
                .await;
            }
        }

        post(&dispatcher, channel, "# done verifying").await;
        tracing::info!(
            guild_id = config.guild_id,
            processed = report.processed,
            failed = report.failures.len(),
            "Verification sweep finished"
        );
        Ok(report)
    }

    /// Check that members holding a faction's unique role are still in
    /// that faction's roster.
    ///
    /// With `force`, members who left lose all of the faction's roles and
    /// are verified again through their own linked account; the id in the
    /// display name only identifies them for the roster check.
    pub async fn check_factions(
        &self,
        config: &GuildConfig,
        channel: DiscordId,
        force: bool,
    ) -> Result<SweepReport, SweepError> {
        let dispatcher = ActionDispatcher::new(self.platform.clone());
        let title = format!("# Checking factions of {}", config.guild_name);

        let Some(key) = master_key(&*self.entities, config).await? else {
            post(&dispatcher, channel, format!("{title}\n< error > no master key")).await;
            return Err(SweepError::NoMasterKey);
        };

        let members = self.platform.guild_members(config.guild_id).await?;
        post(&dispatcher, channel, format!("{title}\n< Force > {force}")).await;

        let mut report = SweepReport::default();
        for (faction_key, roles) in &config.factions {
            let unique = config.unique_roles(faction_key);
            if unique.is_empty() {
                let listed: Vec<String> = roles.iter().map(|r| format!("<@&{r}>")).collect();
                post(
                    &dispatcher,
                    channel,
                    format!(
                        "# Faction {faction_key}\n< error > None of the following roles are unique: {}",
                        listed.join(", ")
                    ),
                )
                .await;
                continue;
            }

            let Ok(faction_id) = faction_key.parse::<u64>() else {
                post(
                    &dispatcher,
                    channel,
                    format!("# Faction {faction_key}\n< error > not a faction id"),
                )
                .await;
                continue;
            };

            let roster = match self.torn.faction(faction_id, ROSTER_SELECTIONS, &key).await {
                Ok(roster) => roster,
                Err(e) => {
                    tracing::warn!(guild_id = config.guild_id, faction_id, error = %e, "Faction roster unavailable");
                    let owner = config
                        .master_key_owner
                        .map(|o| o.to_string())
                        .unwrap_or_default();
                    post(
                        &dispatcher,
                        channel,
                        format!("API key error for master key [{owner}]: *{}*", e.message),
                    )
                    .await;
                    break;
                }
            };

            let name = roster
                .str_at("/name")
                .map(unescape_html)
                .unwrap_or_else(|| faction_key.clone());
            let in_roster: HashSet<&str> = roster
                .object_at("/members")
                .map(|m| m.keys().map(String::as_str).collect())
                .unwrap_or_default();

            post(&dispatcher, channel, format!("# Checking {name} [{faction_id}]")).await;

            let holders = members
                .iter()
                .filter(|m| !m.is_bot)
                .filter(|m| unique.iter().any(|r| m.has_role(*r)));

            for member in holders {
                report.processed += 1;

                let Some(torn_id) = parse_torn_id_from_display_name(&member.display_name) else {
                    let line = format!(
                        "< {} > could not find torn ID within their display name",
                        member.display_name
                    );
                    post(&dispatcher, channel, line.clone()).await;
                    report.failures.push((member.id, line));
                    continue;
                };
                if in_roster.contains(torn_id.to_string().as_str()) {
                    continue;
                }

                let line = format!(
                    "< {} > [{torn_id}] is not a member of {name}",
                    member.display_name
                );
                tracing::info!(guild_id = config.guild_id, faction_id, torn_id, "Member left faction");
                report.failures.push((member.id, line.clone()));

                if !force {
                    post(&dispatcher, channel, line).await;
                    continue;
                }

                let removals = roles.iter().filter(|r| member.has_role(**r)).map(|role| {
                    Action::RemoveRole {
                        guild: config.guild_id,
                        user: member.id,
                        role: *role,
                    }
                });
                let mut text = line;
                for failure in dispatcher.run_all(removals.collect::<Vec<_>>()).await {
                    text.push_str(&format!("\n< error > {failure}"));
                }

                report.advance(member.id, VerificationState::Resolving);
                let outcome = self
                    .verifier
                    .verify(&dispatcher, config, &key, member.id, VerifyTarget::Member(member.id))
                    .await;
                report.advance(
                    member.id,
                    if outcome.success {
                        VerificationState::Verified
                    } else {
                        VerificationState::Failed
                    },
                );
                text.push('\n');
                text.push_str(&outcome.message);
                post(&dispatcher, channel, text).await;
            }
        }

        post(&dispatcher, channel, "# done checking").await;
        tracing::info!(
            guild_id = config.guild_id,
            processed = report.processed,
            failed = report.failures.len(),
            "Faction check finished"
        );
        Ok(report)
    }
}

/// Post a markdown block to a channel. Failures are logged by the dispatcher.
pub(crate) async fn post(dispatcher: &ActionDispatcher, channel: DiscordId, body: impl Into<String>) {
    dispatcher
        .run(Action::ChannelMessage {
            channel,
            text: format!("```md\n{}```", body.into()),
        })
        .await;
}
