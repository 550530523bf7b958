//! REST client for the Discord HTTP API.
//!
//! Implements [`ChatPlatform`] with plain REST calls (no gateway). Ids
//! travel as strings in JSON and are parsed back into snowflakes.

use std::collections::BTreeSet;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tornsync_core::types::DiscordId;

use crate::platform::{ChatPlatform, Member, PlatformError, Role};

/// Page size for member listing (API maximum).
const MEMBERS_PAGE: usize = 1000;

/// JSON error code of a 404 for a user who is not in the guild. Any other
/// 404 (unknown guild, unknown user) is an error.
const UNKNOWN_MEMBER: i64 = 10007;

/// HTTP client for the Discord REST API.
pub struct DiscordRest {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
    username: String,
    #[serde(default)]
    global_name: Option<String>,
    #[serde(default)]
    bot: bool,
}

#[derive(Debug, Deserialize)]
struct ApiMember {
    user: ApiUser,
    #[serde(default)]
    nick: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApiRole {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiChannel {
    id: String,
}

/// `code` of a JSON error body.
fn error_code(body: &str) -> Option<i64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("code")?
        .as_i64()
}

fn snowflake(id: &str) -> Result<DiscordId, PlatformError> {
    id.parse()
        .map_err(|_| PlatformError::Request(format!("invalid snowflake {id}")))
}

impl TryFrom<ApiMember> for Member {
    type Error = PlatformError;

    fn try_from(m: ApiMember) -> Result<Self, Self::Error> {
        let display_name = m
            .nick
            .clone()
            .or_else(|| m.user.global_name.clone())
            .unwrap_or_else(|| m.user.username.clone());
        Ok(Member {
            id: snowflake(&m.user.id)?,
            username: m.user.username,
            display_name,
            is_bot: m.user.bot,
            role_ids: m
                .roles
                .iter()
                .map(|r| snowflake(r))
                .collect::<Result<BTreeSet<_>, _>>()?,
        })
    }
}

impl TryFrom<ApiRole> for Role {
    type Error = PlatformError;

    fn try_from(r: ApiRole) -> Result<Self, Self::Error> {
        Ok(Role {
            id: snowflake(&r.id)?,
            name: r.name,
        })
    }
}

impl DiscordRest {
    /// * `api_url` - Base URL, e.g. `https://discord.com/api/v10`.
    pub fn new(client: reqwest::Client, api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.api_url))
            .header("Authorization", format!("Bot {}", self.token))
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, PlatformError> {
        let response = builder
            .send()
            .await
            .map_err(|e| PlatformError::Request(e.to_string()))?;
        Self::ensure_success(response).await
    }

    // ---- private helpers ----

    /// Map non-2xx statuses onto [`PlatformError`].
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, PlatformError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(match status {
            StatusCode::FORBIDDEN => PlatformError::PermissionDenied(body),
            StatusCode::NOT_FOUND => PlatformError::NotFound(body),
            _ => PlatformError::Request(format!("{}: {body}", status.as_u16())),
        })
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PlatformError> {
        response
            .json::<T>()
            .await
            .map_err(|e| PlatformError::Request(e.to_string()))
    }

    async fn post_message(&self, channel: DiscordId, text: &str) -> Result<(), PlatformError> {
        self.send(
            self.request(reqwest::Method::POST, &format!("/channels/{channel}/messages"))
                .json(&json!({ "content": text })),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ChatPlatform for DiscordRest {
    async fn send_direct_message(&self, user: DiscordId, text: &str) -> Result<(), PlatformError> {
        let response = self
            .send(
                self.request(reqwest::Method::POST, "/users/@me/channels")
                    .json(&json!({ "recipient_id": user.to_string() })),
            )
            .await?;
        let channel: ApiChannel = Self::parse_response(response).await?;
        self.post_message(snowflake(&channel.id)?, text).await
    }

    async fn send_channel_message(
        &self,
        channel: DiscordId,
        text: &str,
    ) -> Result<(), PlatformError> {
        self.post_message(channel, text).await
    }

    async fn add_role(
        &self,
        guild: DiscordId,
        user: DiscordId,
        role: DiscordId,
    ) -> Result<(), PlatformError> {
        self.send(self.request(
            reqwest::Method::PUT,
            &format!("/guilds/{guild}/members/{user}/roles/{role}"),
        ))
        .await?;
        Ok(())
    }

    async fn remove_role(
        &self,
        guild: DiscordId,
        user: DiscordId,
        role: DiscordId,
    ) -> Result<(), PlatformError> {
        self.send(self.request(
            reqwest::Method::DELETE,
            &format!("/guilds/{guild}/members/{user}/roles/{role}"),
        ))
        .await?;
        Ok(())
    }

    async fn create_role(&self, guild: DiscordId, name: &str) -> Result<Role, PlatformError> {
        let response = self
            .send(
                self.request(reqwest::Method::POST, &format!("/guilds/{guild}/roles"))
                    .json(&json!({ "name": name })),
            )
            .await?;
        Self::parse_response::<ApiRole>(response).await?.try_into()
    }

    async fn edit_nickname(
        &self,
        guild: DiscordId,
        user: DiscordId,
        nickname: &str,
    ) -> Result<(), PlatformError> {
        self.send(
            self.request(reqwest::Method::PATCH, &format!("/guilds/{guild}/members/{user}"))
                .json(&json!({ "nick": nickname })),
        )
        .await?;
        Ok(())
    }

    async fn guild_members(&self, guild: DiscordId) -> Result<Vec<Member>, PlatformError> {
        let mut members = Vec::new();
        let mut after: DiscordId = 0;
        loop {
            let response = self
                .send(
                    self.request(reqwest::Method::GET, &format!("/guilds/{guild}/members"))
                        .query(&[("limit", MEMBERS_PAGE.to_string()), ("after", after.to_string())]),
                )
                .await?;
            let page: Vec<ApiMember> = Self::parse_response(response).await?;
            let full = page.len() == MEMBERS_PAGE;
            for raw in page {
                let member = Member::try_from(raw)?;
                after = after.max(member.id);
                members.push(member);
            }
            if !full {
                return Ok(members);
            }
        }
    }

    async fn guild_roles(&self, guild: DiscordId) -> Result<Vec<Role>, PlatformError> {
        let response = self
            .send(self.request(reqwest::Method::GET, &format!("/guilds/{guild}/roles")))
            .await?;
        Self::parse_response::<Vec<ApiRole>>(response)
            .await?
            .into_iter()
            .map(Role::try_from)
            .collect()
    }

    async fn member(
        &self,
        guild: DiscordId,
        user: DiscordId,
    ) -> Result<Option<Member>, PlatformError> {
        let result = self
            .send(self.request(reqwest::Method::GET, &format!("/guilds/{guild}/members/{user}")))
            .await;
        match result {
            Ok(response) => Ok(Some(Self::parse_response::<ApiMember>(response).await?.try_into()?)),
            Err(PlatformError::NotFound(body)) if error_code(&body) == Some(UNKNOWN_MEMBER) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
