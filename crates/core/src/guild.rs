//! Per-group configuration record.
//!
//! Stored as one JSON document per group. Role and channel references are
//! chat-platform ids; faction keys are external faction ids as strings, the
//! way the remote API keys them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scheduling::{CheckpointState, ScheduledJob};
use crate::types::{DiscordId, TornId};

/// Persisted scheduling checkpoints. Each is an epoch timestamp, or
/// absent/false when the job is disabled for the group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_verify: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_verify: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_check: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_check: Option<Value>,
}

impl Checkpoints {
    fn slot(&self, job: ScheduledJob) -> &Option<Value> {
        match job {
            ScheduledJob::DailyVerify => &self.daily_verify,
            ScheduledJob::WeeklyVerify => &self.weekly_verify,
            ScheduledJob::DailyCheck => &self.daily_check,
            ScheduledJob::WeeklyCheck => &self.weekly_check,
        }
    }

    fn slot_mut(&mut self, job: ScheduledJob) -> &mut Option<Value> {
        match job {
            ScheduledJob::DailyVerify => &mut self.daily_verify,
            ScheduledJob::WeeklyVerify => &mut self.weekly_verify,
            ScheduledJob::DailyCheck => &mut self.daily_check,
            ScheduledJob::WeeklyCheck => &mut self.weekly_check,
        }
    }

    pub fn get(&self, job: ScheduledJob) -> CheckpointState {
        CheckpointState::from_value(self.slot(job).as_ref())
    }

    /// Record a run at `now`, enabling the job if it was not.
    pub fn set(&mut self, job: ScheduledJob, now: i64) {
        *self.slot_mut(job) = Some(Value::from(now));
    }
}

/// Configuration of one chat group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildConfig {
    pub guild_id: DiscordId,
    #[serde(default)]
    pub guild_name: String,
    #[serde(default)]
    pub verified_role: Option<DiscordId>,
    /// Faction id → roles granted to its members.
    #[serde(default)]
    pub factions: BTreeMap<String, Vec<DiscordId>>,
    /// Faction id → whether position roles are handed out.
    #[serde(default)]
    pub positions: BTreeMap<String, bool>,
    #[serde(default)]
    pub admin_channel: Option<DiscordId>,
    #[serde(default)]
    pub welcome_channel: Option<DiscordId>,
    /// Channels `!verify` is allowed in; empty means anywhere.
    #[serde(default)]
    pub verify_channels: Vec<DiscordId>,
    /// DM members that could not be verified on join.
    #[serde(default)]
    pub force_verify: bool,
    /// External account whose credential is used for group-level calls.
    #[serde(default)]
    pub master_key_owner: Option<TornId>,
    #[serde(default)]
    pub checkpoints: Checkpoints,
}

impl GuildConfig {
    pub fn new(guild_id: DiscordId, guild_name: impl Into<String>) -> Self {
        Self {
            guild_id,
            guild_name: guild_name.into(),
            ..Default::default()
        }
    }

    pub fn faction_roles(&self, faction_id: i64) -> &[DiscordId] {
        self.factions
            .get(&faction_id.to_string())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Position roles apply only to factions that are also mapped.
    pub fn positions_enabled(&self, faction_id: i64) -> bool {
        let key = faction_id.to_string();
        self.factions.contains_key(&key) && self.positions.get(&key).copied().unwrap_or(false)
    }

    /// Roles mapped to exactly one faction, for the given faction.
    pub fn unique_roles(&self, faction_id: &str) -> Vec<DiscordId> {
        let Some(roles) = self.factions.get(faction_id) else {
            return Vec::new();
        };
        roles
            .iter()
            .copied()
            .filter(|role| {
                self.factions
                    .values()
                    .flatten()
                    .filter(|r| *r == role)
                    .count()
                    == 1
            })
            .collect()
    }

    pub fn verify_allowed_in(&self, channel: DiscordId) -> bool {
        self.verify_channels.is_empty() || self.verify_channels.contains(&channel)
    }

    pub fn is_admin_channel(&self, channel: DiscordId) -> bool {
        self.admin_channel == Some(channel)
    }
}
