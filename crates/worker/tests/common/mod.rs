//! In-memory fakes shared by the worker integration tests.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use tornsync_core::error::ApiError;
use tornsync_core::notifications::NotificationState;
use tornsync_core::snapshot::Snapshot;
use tornsync_core::types::{DiscordId, TornId};
use tornsync_db::models::tracked_entity::NotifierRow;
use tornsync_torn::{Section, TornClient};
use tornsync_worker::platform::{ChatPlatform, Member, PlatformError, Role};
use tornsync_worker::store::{EntityStore, StoreError};

pub const KEY: &str = "masterkey0000001";

pub fn member(id: DiscordId, name: &str, roles: &[DiscordId]) -> Member {
    Member {
        id,
        username: name.to_string(),
        display_name: name.to_string(),
        is_bot: false,
        role_ids: roles.iter().copied().collect(),
    }
}

// ---------------------------------------------------------------------------
// Chat platform
// ---------------------------------------------------------------------------

/// Records every side effect as a short string, e.g. `add_role:1:42:7`.
#[derive(Default)]
pub struct FakePlatform {
    members: Mutex<Vec<(DiscordId, Member)>>,
    roles: Mutex<Vec<(DiscordId, Role)>>,
    calls: Mutex<Vec<String>>,
    /// Action kinds answered with `PermissionDenied`.
    denied: Mutex<HashSet<&'static str>>,
    next_role: Mutex<DiscordId>,
    /// Answer for every single-member lookup, when set.
    lookup_error: Mutex<Option<PlatformError>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            next_role: Mutex::new(9000),
            ..Default::default()
        }
    }

    pub fn with_member(self, guild: DiscordId, member: Member) -> Self {
        self.members.lock().unwrap().push((guild, member));
        self
    }

    pub fn with_role(self, guild: DiscordId, id: DiscordId, name: &str) -> Self {
        self.roles.lock().unwrap().push((
            guild,
            Role {
                id,
                name: name.to_string(),
            },
        ));
        self
    }

    pub fn deny(&self, kind: &'static str) {
        self.denied.lock().unwrap().insert(kind);
    }

    pub fn fail_lookups(&self, error: PlatformError) {
        *self.lookup_error.lock().unwrap() = Some(error);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that change member or group state (messages excluded).
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("dm:") && !c.starts_with("channel:"))
            .collect()
    }

    pub fn channel_messages(&self, channel: DiscordId) -> Vec<String> {
        let prefix = format!("channel:{channel}:");
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn direct_messages(&self, user: DiscordId) -> Vec<String> {
        let prefix = format!("dm:{user}:");
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn member_roles(&self, guild: DiscordId, user: DiscordId) -> BTreeSet<DiscordId> {
        self.members
            .lock()
            .unwrap()
            .iter()
            .find(|(g, m)| *g == guild && m.id == user)
            .map(|(_, m)| m.role_ids.clone())
            .unwrap_or_default()
    }

    fn record(&self, kind: &'static str, call: String) -> Result<(), PlatformError> {
        self.calls.lock().unwrap().push(call);
        if self.denied.lock().unwrap().contains(kind) {
            return Err(PlatformError::PermissionDenied(format!("{kind} not allowed")));
        }
        Ok(())
    }

    fn update_member(&self, guild: DiscordId, user: DiscordId, f: impl FnOnce(&mut Member)) {
        if let Some((_, m)) = self
            .members
            .lock()
            .unwrap()
            .iter_mut()
            .find(|(g, m)| *g == guild && m.id == user)
        {
            f(m);
        }
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn send_direct_message(&self, user: DiscordId, text: &str) -> Result<(), PlatformError> {
        self.record("dm", format!("dm:{user}:{text}"))
    }

    async fn send_channel_message(
        &self,
        channel: DiscordId,
        text: &str,
    ) -> Result<(), PlatformError> {
        self.record("channel", format!("channel:{channel}:{text}"))
    }

    async fn add_role(
        &self,
        guild: DiscordId,
        user: DiscordId,
        role: DiscordId,
    ) -> Result<(), PlatformError> {
        self.record("add_role", format!("add_role:{guild}:{user}:{role}"))?;
        self.update_member(guild, user, |m| {
            m.role_ids.insert(role);
        });
        Ok(())
    }

    async fn remove_role(
        &self,
        guild: DiscordId,
        user: DiscordId,
        role: DiscordId,
    ) -> Result<(), PlatformError> {
        self.record("remove_role", format!("remove_role:{guild}:{user}:{role}"))?;
        self.update_member(guild, user, |m| {
            m.role_ids.remove(&role);
        });
        Ok(())
    }

    async fn create_role(&self, guild: DiscordId, name: &str) -> Result<Role, PlatformError> {
        self.record("create_role", format!("create_role:{guild}:{name}"))?;
        let id = {
            let mut next = self.next_role.lock().unwrap();
            *next += 1;
            *next
        };
        let role = Role {
            id,
            name: name.to_string(),
        };
        self.roles.lock().unwrap().push((guild, role.clone()));
        Ok(role)
    }

    async fn edit_nickname(
        &self,
        guild: DiscordId,
        user: DiscordId,
        nickname: &str,
    ) -> Result<(), PlatformError> {
        self.record("edit_nickname", format!("edit_nickname:{guild}:{user}:{nickname}"))?;
        self.update_member(guild, user, |m| m.display_name = nickname.to_string());
        Ok(())
    }

    async fn guild_members(&self, guild: DiscordId) -> Result<Vec<Member>, PlatformError> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .filter(|(g, _)| *g == guild)
            .map(|(_, m)| m.clone())
            .collect())
    }

    async fn guild_roles(&self, guild: DiscordId) -> Result<Vec<Role>, PlatformError> {
        Ok(self
            .roles
            .lock()
            .unwrap()
            .iter()
            .filter(|(g, _)| *g == guild)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn member(
        &self,
        guild: DiscordId,
        user: DiscordId,
    ) -> Result<Option<Member>, PlatformError> {
        if let Some(error) = self.lookup_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .find(|(g, m)| *g == guild && m.id == user)
            .map(|(_, m)| m.clone()))
    }
}

// ---------------------------------------------------------------------------
// External API
// ---------------------------------------------------------------------------

/// Canned answers keyed by `section/id@key` (`id` is `self` for the key
/// owner). Unknown requests fail as transport errors.
#[derive(Default)]
pub struct FakeTorn {
    answers: Mutex<HashMap<String, Result<Value, ApiError>>>,
    requests: Mutex<Vec<String>>,
}

fn request_key(section: Section, id: Option<u64>, key: &str) -> String {
    let id = id.map(|i| i.to_string()).unwrap_or_else(|| "self".to_string());
    format!("{}/{id}@{key}", section.as_str())
}

impl FakeTorn {
    pub fn answer(&self, section: Section, id: Option<u64>, key: &str, body: Value) {
        self.answers
            .lock()
            .unwrap()
            .insert(request_key(section, id, key), Ok(body));
    }

    pub fn fail(&self, section: Section, id: Option<u64>, key: &str, error: ApiError) {
        self.answers
            .lock()
            .unwrap()
            .insert(request_key(section, id, key), Err(error));
    }

    /// Requests made so far, as `section/id@key?selections`.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TornClient for FakeTorn {
    async fn fetch(
        &self,
        section: Section,
        id: Option<u64>,
        selections: &[&str],
        key: &str,
    ) -> Result<Snapshot, ApiError> {
        let request = request_key(section, id, key);
        self.requests
            .lock()
            .unwrap()
            .push(format!("{request}?{}", selections.join(",")));
        let answer = self.answers.lock().unwrap().get(&request).cloned();
        match answer {
            Some(body) => body.map(Snapshot::new),
            None => Err(ApiError::transport()),
        }
    }
}

// ---------------------------------------------------------------------------
// Entity store
// ---------------------------------------------------------------------------

/// Rows are updated in place on save so consecutive ticks see their own
/// writes.
#[derive(Default)]
pub struct FakeEntityStore {
    rows: Mutex<Vec<NotifierRow>>,
    credentials: Mutex<HashMap<TornId, String>>,
    resets: Mutex<Vec<TornId>>,
}

impl FakeEntityStore {
    pub fn with_entity(
        self,
        torn_id: TornId,
        discord_id: DiscordId,
        key: &str,
        state: &NotificationState,
    ) -> Self {
        self.rows.lock().unwrap().push(NotifierRow {
            torn_id,
            discord_id: discord_id as i64,
            api_key: key.to_string(),
            notifications: state.to_json(),
        });
        self.credentials
            .lock()
            .unwrap()
            .insert(torn_id, key.to_string());
        self
    }

    pub fn with_credential(self, torn_id: TornId, key: &str) -> Self {
        self.credentials
            .lock()
            .unwrap()
            .insert(torn_id, key.to_string());
        self
    }

    pub fn state_of(&self, torn_id: TornId) -> Option<NotificationState> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.torn_id == torn_id)
            .map(NotifierRow::notification_state)
    }

    pub fn resets(&self) -> Vec<TornId> {
        self.resets.lock().unwrap().clone()
    }
}

#[async_trait]
impl EntityStore for FakeEntityStore {
    fn stream_enabled(&self) -> BoxStream<'_, Result<NotifierRow, StoreError>> {
        let rows = self.rows.lock().unwrap().clone();
        stream::iter(rows.into_iter().map(Ok)).boxed()
    }

    async fn save_notifications(
        &self,
        discord_id: DiscordId,
        state: &NotificationState,
    ) -> Result<(), StoreError> {
        for row in self.rows.lock().unwrap().iter_mut() {
            if row.discord_id() == discord_id {
                row.notifications = state.to_json();
            }
        }
        Ok(())
    }

    async fn reset_notifications(&self, torn_id: TornId) -> Result<(), StoreError> {
        self.resets.lock().unwrap().push(torn_id);
        self.rows.lock().unwrap().retain(|r| r.torn_id != torn_id);
        Ok(())
    }

    async fn credential(&self, torn_id: TornId) -> Result<Option<String>, StoreError> {
        Ok(self.credentials.lock().unwrap().get(&torn_id).cloned())
    }
}
