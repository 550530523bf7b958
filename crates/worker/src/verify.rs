//! Identity reconciler: chat identity → verified external profile → roles.
//!
//! Resolution never touches the chat platform's state; side effects only
//! start once the profile is resolved and its declared linkage matches the
//! identity being verified. A mismatch therefore leaves the member untouched.

use std::sync::Arc;

use tornsync_core::actions::Action;
use tornsync_core::error::ReconcileError;
use tornsync_core::guild::GuildConfig;
use tornsync_core::identity::{
    plan_roles, Linkage, Profile, RoleContext, RoleRef, VerifyTarget, LINKAGE_SELECTIONS,
    PROFILE_SELECTIONS,
};
use tornsync_core::text::unescape_html;
use tornsync_core::types::{DiscordId, TornId};
use tornsync_torn::TornClient;

use crate::dispatcher::{ActionDispatcher, ActionFailure};
use crate::platform::{Member, PlatformError};

/// Result of one verification, shown to operators as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub message: String,
    pub success: bool,
    /// Why verification stopped, if it did.
    pub error: Option<ReconcileError>,
    /// Reported role failures.
    pub failures: Vec<ActionFailure>,
}

impl VerificationOutcome {
    fn failed(error: ReconcileError) -> Self {
        Self {
            message: describe(&error),
            success: false,
            error: Some(error),
            failures: Vec::new(),
        }
    }

    fn refused(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: false,
            error: None,
            failures: Vec::new(),
        }
    }
}

/// Operator-facing text for a resolution failure.
pub fn describe(error: &ReconcileError) -> String {
    match error {
        ReconcileError::UnknownAccount(id) => {
            format!("< error > Torn ID {id} is not known. Please check again.")
        }
        ReconcileError::ExternalService(msg) => {
            format!("< error > There is an API key problem ({msg}).")
        }
        ReconcileError::IdentityMismatch { expected, found } => {
            format!("< error > That's odd... {expected} != {found}.")
        }
        ReconcileError::NotVerified(who) => format!("{who} is not officially verified by Torn"),
        ReconcileError::PermissionDenied(msg) => format!("< error > {msg}"),
    }
}

fn platform_error(e: PlatformError) -> ReconcileError {
    match e {
        PlatformError::PermissionDenied(msg) => ReconcileError::PermissionDenied(msg),
        other => ReconcileError::ExternalService(other.to_string()),
    }
}

/// A profile whose declared linkage has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub profile: Profile,
    pub discord_id: DiscordId,
}

pub struct IdentityReconciler {
    torn: Arc<dyn TornClient>,
}

impl IdentityReconciler {
    pub fn new(torn: Arc<dyn TornClient>) -> Self {
        Self { torn }
    }

    /// Resolve `target` to a profile without side effects.
    ///
    /// `author` is the identity asking; `label` names the subject in
    /// messages when it is a chat member.
    pub async fn resolve(
        &self,
        target: VerifyTarget,
        author: DiscordId,
        key: &str,
        label: Option<&str>,
    ) -> Result<Resolved, ReconcileError> {
        let (torn_id, expected) = match target {
            VerifyTarget::SelfAuthor => (self.linked_account(author, key, label).await?, Some(author)),
            VerifyTarget::Member(id) => (self.linked_account(id, key, label).await?, Some(id)),
            VerifyTarget::TornId(id) => (id, None),
        };

        tracing::info!(torn_id, "Verifying account");
        let snapshot = self
            .torn
            .user(Some(torn_id.unsigned_abs()), PROFILE_SELECTIONS, key)
            .await
            .map_err(|e| ReconcileError::from_api(e, torn_id))?;
        let profile = Profile::from_snapshot(&snapshot)
            .ok_or_else(|| ReconcileError::ExternalService("malformed profile".into()))?;

        let Some(discord_id) = profile.linkage.discord_id else {
            return Err(ReconcileError::NotVerified(profile.nickname()));
        };
        if profile.linkage.torn_id != Some(torn_id) {
            return Err(ReconcileError::mismatch(
                torn_id,
                describe_id(profile.linkage.torn_id),
            ));
        }
        if let Some(expected) = expected.filter(|e| *e != discord_id) {
            return Err(ReconcileError::mismatch(expected, discord_id));
        }

        Ok(Resolved {
            profile,
            discord_id,
        })
    }

    /// External account linked to a chat identity.
    async fn linked_account(
        &self,
        discord_id: DiscordId,
        key: &str,
        label: Option<&str>,
    ) -> Result<TornId, ReconcileError> {
        let who = || label.map(str::to_string).unwrap_or_else(|| format!("<@{discord_id}>"));

        let snapshot = self
            .torn
            .user(Some(discord_id), LINKAGE_SELECTIONS, key)
            .await
            .map_err(|e| {
                if e.is_unknown_id() {
                    ReconcileError::NotVerified(who())
                } else {
                    ReconcileError::ExternalService(e.message)
                }
            })?;

        let linkage = Linkage::from_snapshot(&snapshot)
            .ok_or_else(|| ReconcileError::ExternalService("missing linkage".into()))?;
        if let Some(declared) = linkage.discord_id.filter(|d| *d != discord_id) {
            return Err(ReconcileError::mismatch(discord_id, declared));
        }
        linkage.torn_id.ok_or_else(|| ReconcileError::NotVerified(who()))
    }

    /// Verify one member of `config`'s group and apply nickname and roles.
    pub async fn verify(
        &self,
        dispatcher: &ActionDispatcher,
        config: &GuildConfig,
        key: &str,
        author: DiscordId,
        target: VerifyTarget,
    ) -> VerificationOutcome {
        let guild = config.guild_id;
        let Some(verified_role) = config.verified_role else {
            return VerificationOutcome::refused("< error > No verified role given");
        };
        let platform = dispatcher.platform();

        let subject = match target {
            VerifyTarget::SelfAuthor => Some(author),
            VerifyTarget::Member(id) => Some(id),
            VerifyTarget::TornId(_) => None,
        };
        let subject_member = match subject {
            Some(id) => match platform.member(guild, id).await {
                Ok(member) => member,
                Err(e) => return VerificationOutcome::failed(platform_error(e)),
            },
            None => None,
        };
        let label = subject_member.as_ref().map(|m| m.username.clone());

        let resolved = match self.resolve(target, author, key, label.as_deref()).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::info!(guild_id = guild, error = %e, "Verification refused");
                return VerificationOutcome::failed(e);
            }
        };

        let member = match subject_member.filter(|m| m.id == resolved.discord_id) {
            Some(member) => member,
            None => match platform.member(guild, resolved.discord_id).await {
                Ok(Some(member)) => member,
                Ok(None) => {
                    return VerificationOutcome::refused(format!(
                        "You are trying to verify < {} > but they didn't join this server... \
                         Maybe they are using a different discord account on the official Torn discord server.",
                        resolved.profile.nickname()
                    ))
                }
                Err(e) => return VerificationOutcome::failed(platform_error(e)),
            },
        };

        let own = matches!(target, VerifyTarget::SelfAuthor);
        self.apply(dispatcher, config, verified_role, &resolved.profile, &member, own)
            .await
    }

    async fn apply(
        &self,
        dispatcher: &ActionDispatcher,
        config: &GuildConfig,
        verified_role: DiscordId,
        profile: &Profile,
        member: &Member,
        own: bool,
    ) -> VerificationOutcome {
        let guild = config.guild_id;
        let guild_roles = match dispatcher.platform().guild_roles(guild).await {
            Ok(roles) => roles,
            Err(e) => return VerificationOutcome::failed(platform_error(e)),
        };
        let role_refs: Vec<RoleRef> = guild_roles.iter().map(RoleRef::from).collect();

        let faction_id = profile.faction.as_ref().map(|f| f.faction_id);
        let plan = plan_roles(
            profile,
            &RoleContext {
                verified_role,
                faction_roles: faction_id.map(|id| config.faction_roles(id)).unwrap_or_default(),
                positions_enabled: faction_id.is_some_and(|id| config.positions_enabled(id)),
                guild_roles: &role_refs,
                member_roles: &member.role_ids,
            },
        );

        let nickname = profile.nickname();
        let mut actions = vec![Action::EditNickname {
            guild,
            user: member.id,
            nickname: nickname.clone(),
        }];
        actions.extend(plan.remove.iter().map(|role| Action::RemoveRole {
            guild,
            user: member.id,
            role: *role,
        }));
        let mut failures = dispatcher.run_all(actions).await;

        let mut granted = Vec::new();
        for role in &plan.add {
            let add = Action::AddRole {
                guild,
                user: member.id,
                role: *role,
            };
            match dispatcher.run(add).await {
                Some(failure) => failures.push(failure),
                None => granted.push(
                    role_refs
                        .iter()
                        .find(|r| r.id == *role)
                        .map(|r| unescape_html(&r.name))
                        .unwrap_or_else(|| role.to_string()),
                ),
            }
        }

        if let Some(label) = &plan.create {
            match dispatcher.create_role(guild, label).await {
                Ok(role) => {
                    let add = Action::AddRole {
                        guild,
                        user: member.id,
                        role: role.id,
                    };
                    match dispatcher.run(add).await {
                        Some(failure) => failures.push(failure),
                        None => granted.push(role.name),
                    }
                }
                Err(error) => {
                    tracing::error!(guild_id = guild, role = %label, error = %error, "Position role creation failed");
                    failures.push(ActionFailure {
                        action: Action::CreateRole {
                            guild,
                            name: label.clone(),
                        },
                        error,
                    });
                }
            }
        }

        let subject = if own { "You" } else { "They" };
        let roles = match granted.len() {
            0 => format!("{subject} have not been given any role."),
            n => format!(
                "{subject} have been given the role{}:\n- @{}",
                if n > 1 { "s" } else { "" },
                granted.join("\n- @"),
            ),
        };
        let mut message = format!(
            "< {} >\n{subject} have been verified and are now known as < {nickname} >. {roles}",
            member.username,
        );
        for failure in &failures {
            message.push_str(&format!("\n< error > {failure}"));
        }

        let error = failures.iter().find_map(|f| match &f.error {
            PlatformError::PermissionDenied(msg) => Some(ReconcileError::PermissionDenied(msg.clone())),
            _ => None,
        });

        VerificationOutcome {
            message,
            success: failures.is_empty(),
            error,
            failures,
        }
    }
}

fn describe_id(id: Option<TornId>) -> String {
    id.map(|i| i.to_string()).unwrap_or_else(|| "none".to_string())
}
