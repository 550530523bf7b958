//! HTTP adapter for `GET /{section}/{id}?selections=...&key=...`.
//!
//! Every failure ends up as an [`ApiError`]: remote `{"error": {...}}`
//! payloads keep their code and message, anything else (network, non-2xx,
//! unparsable body) becomes [`ApiError::transport`]. No retries happen
//! here; callers decide.

use async_trait::async_trait;
use serde_json::Value;
use tornsync_core::error::ApiError;
use tornsync_core::redact::redact_key;
use tornsync_core::snapshot::{as_i64, Snapshot};

/// Default public endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.torn.com";

/// Top-level resource of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    User,
    Faction,
}

impl Section {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Faction => "faction",
        }
    }
}

/// Fetch one entity's snapshot with a caller-supplied credential.
#[async_trait]
pub trait TornClient: Send + Sync {
    /// `id = None` addresses the credential owner.
    async fn fetch(
        &self,
        section: Section,
        id: Option<u64>,
        selections: &[&str],
        key: &str,
    ) -> Result<Snapshot, ApiError>;

    async fn user(
        &self,
        id: Option<u64>,
        selections: &[&str],
        key: &str,
    ) -> Result<Snapshot, ApiError> {
        self.fetch(Section::User, id, selections, key).await
    }

    async fn faction(&self, id: u64, selections: &[&str], key: &str) -> Result<Snapshot, ApiError> {
        self.fetch(Section::Faction, Some(id), selections, key).await
    }
}

/// HTTP client for the Torn API.
pub struct TornApi {
    client: reqwest::Client,
    base_url: String,
}

impl TornApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Reuse an existing [`reqwest::Client`] (timeouts, pooling).
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn url(&self, section: Section, id: Option<u64>) -> String {
        match id {
            Some(id) => format!("{}/{}/{id}", self.base_url, section.as_str()),
            None => format!("{}/{}/", self.base_url, section.as_str()),
        }
    }

    // ---- private helpers ----

    /// Classify a decoded body.
    fn classify(body: Value, key: &str) -> Result<Snapshot, ApiError> {
        if !body.is_object() {
            return Err(ApiError::transport());
        }
        match body.get("error") {
            Some(err) => {
                let code = err.get("code").and_then(as_i64).unwrap_or(ApiError::TRANSPORT);
                let message = err
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error");
                Err(ApiError::new(code, redact_key(message, Some(key))))
            }
            None => Ok(Snapshot::new(body)),
        }
    }
}

#[async_trait]
impl TornClient for TornApi {
    async fn fetch(
        &self,
        section: Section,
        id: Option<u64>,
        selections: &[&str],
        key: &str,
    ) -> Result<Snapshot, ApiError> {
        let selections = selections.join(",");
        let response = self
            .client
            .get(self.url(section, id))
            .query(&[("selections", selections.as_str()), ("key", key)])
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(
                    section = section.as_str(),
                    error = %redact_key(&e.to_string(), Some(key)),
                    "Torn API request failed"
                );
                ApiError::transport()
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(section = section.as_str(), status = status.as_u16(), "Torn API returned non-success status");
            return Err(ApiError::transport());
        }

        let body = response.json::<Value>().await.map_err(|e| {
            tracing::warn!(
                section = section.as_str(),
                error = %redact_key(&e.to_string(), Some(key)),
                "Torn API returned an unparsable body"
            );
            ApiError::transport()
        })?;

        Self::classify(body, key)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn url_with_and_without_id() {
        let api = TornApi::new("https://api.torn.com/");
        assert_eq!(api.url(Section::User, None), "https://api.torn.com/user/");
        assert_eq!(api.url(Section::Faction, Some(33241)), "https://api.torn.com/faction/33241");
    }

    #[test]
    fn error_payload_is_classified_and_redacted() {
        let body = json!({"error": {"code": 2, "error": "Incorrect key abcd1234"}});
        let err = TornApi::classify(body, "abcd1234").unwrap_err();
        assert_eq!(err.code, 2);
        assert_eq!(err.message, "Incorrect key ***");
    }

    #[test]
    fn non_object_is_transport() {
        assert_eq!(TornApi::classify(json!([1, 2]), "k").unwrap_err(), ApiError::transport());
    }
}
