//! Identity resolution inputs and role planning.
//!
//! Everything here is pure: parsing verify targets, reading a profile out
//! of a snapshot, and computing which roles a verified member should gain
//! or lose. The worker's reconciler performs the I/O around it.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::snapshot::{as_i64, Snapshot};
use crate::text::unescape_html;
use crate::types::{DiscordId, TornId};

/// API selections needed to read a linkage only.
pub const LINKAGE_SELECTIONS: &[&str] = &["discord"];

/// API selections needed to verify an account.
pub const PROFILE_SELECTIONS: &[&str] = &["profile", "discord"];

// ---------------------------------------------------------------------------
// Verify targets
// ---------------------------------------------------------------------------

/// Who a verify request is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyTarget {
    /// The requesting member verifies themself.
    SelfAuthor,
    /// A chat member, by mention or id.
    Member(DiscordId),
    /// An external account id given directly.
    TornId(TornId),
}

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<@!?(\d+)>$").expect("valid mention regex"));

static DISPLAY_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d{1,7})\]").expect("valid display id regex"));

/// Parse the optional argument of a verify command.
///
/// Bare digits are an external account id; `<@id>` / `<@!id>` is a member
/// mention. Ids below 1 are rejected since the remote API would then
/// answer for the credential owner instead.
pub fn parse_target(arg: Option<&str>) -> Result<VerifyTarget, String> {
    let Some(arg) = arg.map(str::trim).filter(|a| !a.is_empty()) else {
        return Ok(VerifyTarget::SelfAuthor);
    };

    if arg.chars().all(|c| c.is_ascii_digit()) {
        return match arg.parse::<TornId>() {
            Ok(id) if id > 0 => Ok(VerifyTarget::TornId(id)),
            _ => Err(format!("invalid id {arg}")),
        };
    }

    if let Some(caps) = MENTION_RE.captures(arg) {
        return match caps[1].parse::<DiscordId>() {
            Ok(id) if id > 0 => Ok(VerifyTarget::Member(id)),
            _ => Err(format!("could not read a member id in mention {arg}")),
        };
    }

    Err("Use !verify tornId or !verify @Member".to_string())
}

/// Extract an external id embedded in a display name like `Name [1234]`.
///
/// Exactly one bracketed id must be present.
pub fn parse_torn_id_from_display_name(display_name: &str) -> Option<TornId> {
    let mut ids = DISPLAY_ID_RE
        .captures_iter(display_name)
        .filter_map(|c| c[1].parse::<TornId>().ok());
    match (ids.next(), ids.next()) {
        (Some(id), None) => Some(id),
        _ => None,
    }
}

/// Canonical nickname for a verified member.
pub fn nickname(name: &str, torn_id: TornId) -> String {
    format!("{name} [{torn_id}]")
}

// ---------------------------------------------------------------------------
// Profile and linkage
// ---------------------------------------------------------------------------

/// Remote-declared linkage between an external account and a chat identity.
///
/// Empty strings in the payload mean "not linked".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Linkage {
    pub torn_id: Option<TornId>,
    pub discord_id: Option<DiscordId>,
}

impl Linkage {
    /// Read the `discord` selection; `None` if absent altogether.
    pub fn from_snapshot(snapshot: &Snapshot) -> Option<Self> {
        let discord = snapshot.get("/discord")?.as_object()?;
        let torn_id = discord.get("userID").and_then(as_i64).filter(|id| *id > 0);
        let discord_id = discord
            .get("discordID")
            .and_then(as_i64)
            .filter(|id| *id > 0)
            .map(|id| id as DiscordId);
        Some(Self {
            torn_id,
            discord_id,
        })
    }
}

/// Faction membership as reported by the profile selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactionInfo {
    pub faction_id: i64,
    pub faction_name: String,
    pub position: String,
}

/// The parts of a remote profile that verification needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub torn_id: TornId,
    pub name: String,
    pub faction: Option<FactionInfo>,
    pub linkage: Linkage,
}

impl Profile {
    /// Read `profile,discord` selections. `None` if the payload lacks the
    /// id or the linkage block.
    pub fn from_snapshot(snapshot: &Snapshot) -> Option<Self> {
        let linkage = Linkage::from_snapshot(snapshot)?;
        let torn_id = snapshot
            .i64_at("/player_id")
            .or(linkage.torn_id)
            .filter(|id| *id > 0)?;
        let name = snapshot.str_at("/name").unwrap_or("???").to_string();

        let faction = snapshot
            .i64_at("/faction/faction_id")
            .filter(|id| *id > 0)
            .map(|faction_id| FactionInfo {
                faction_id,
                faction_name: snapshot
                    .str_at("/faction/faction_name")
                    .unwrap_or_default()
                    .to_string(),
                position: snapshot
                    .str_at("/faction/position")
                    .unwrap_or_default()
                    .to_string(),
            });

        Some(Self {
            torn_id,
            name,
            faction,
            linkage,
        })
    }

    pub fn nickname(&self) -> String {
        nickname(&self.name, self.torn_id)
    }
}

// ---------------------------------------------------------------------------
// Position roles
// ---------------------------------------------------------------------------

/// Stable key of a position role. The display name is derived from it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PositionRoleKey {
    pub faction_id: i64,
    pub position: String,
}

impl PositionRoleKey {
    pub fn new(faction_id: i64, position: &str) -> Self {
        Self {
            faction_id,
            position: unescape_html(position),
        }
    }

    /// `"{position} of {faction}"`, with entities unescaped.
    pub fn label(&self, faction_name: &str) -> String {
        format!("{} of {}", self.position, unescape_html(faction_name))
    }
}

/// True if `role_name` is a position role of `faction_name`.
pub fn is_position_role_of(role_name: &str, faction_name: &str) -> bool {
    role_name
        .rsplit_once(" of ")
        .is_some_and(|(_, faction)| faction == unescape_html(faction_name))
}

// ---------------------------------------------------------------------------
// Role planning
// ---------------------------------------------------------------------------

/// A role as the planner sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRef {
    pub id: u64,
    pub name: String,
}

/// Inputs describing the member and the group.
#[derive(Debug, Clone)]
pub struct RoleContext<'a> {
    pub verified_role: u64,
    /// Roles mapped to the profile's faction in the group config.
    pub faction_roles: &'a [u64],
    /// Whether the group hands out position roles for that faction.
    pub positions_enabled: bool,
    /// All roles of the group.
    pub guild_roles: &'a [RoleRef],
    /// Role ids the member currently holds.
    pub member_roles: &'a BTreeSet<u64>,
}

/// Role delta for one member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePlan {
    pub add: Vec<u64>,
    pub remove: Vec<u64>,
    /// Position role label that does not exist yet and must be created,
    /// then assigned.
    pub create: Option<String>,
}

/// Compute the target role set for a verified profile.
///
/// The verified role is always assigned; faction roles come from the group
/// mapping (unknown role ids are ignored); when positions are enabled, at
/// most one position role per faction is kept.
pub fn plan_roles(profile: &Profile, ctx: &RoleContext<'_>) -> RolePlan {
    let known: BTreeSet<u64> = ctx.guild_roles.iter().map(|r| r.id).collect();
    let mut plan = RolePlan::default();

    plan.add.push(ctx.verified_role);
    plan.add.extend(
        ctx.faction_roles
            .iter()
            .copied()
            .filter(|id| known.contains(id) && *id != ctx.verified_role),
    );

    let Some(faction) = profile.faction.as_ref().filter(|_| ctx.positions_enabled) else {
        return plan;
    };
    if faction.position.is_empty() {
        return plan;
    }

    let label = PositionRoleKey::new(faction.faction_id, &faction.position).label(&faction.faction_name);
    let target = ctx.guild_roles.iter().find(|r| r.name == label);

    for role in ctx.guild_roles {
        if ctx.member_roles.contains(&role.id)
            && Some(role.id) != target.map(|t| t.id)
            && is_position_role_of(&role.name, &faction.faction_name)
        {
            plan.remove.push(role.id);
        }
    }

    match target {
        Some(role) => plan.add.push(role.id),
        None => plan.create = Some(label),
    }
    plan
}
