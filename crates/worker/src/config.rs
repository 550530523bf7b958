use std::time::Duration;

use tornsync_core::types::DiscordId;

/// Shortest accepted fine loop period.
pub const MIN_NOTIFY_INTERVAL_SECS: u64 = 60;

/// Errors from reading the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has an invalid value: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    /// Bot token for the chat platform REST API.
    pub discord_token: String,
    /// Group whose membership gates personal notifications.
    pub main_guild_id: DiscordId,
    pub torn_api_url: String,
    pub discord_api_url: String,
    /// Fine loop period (default: `60`).
    pub notify_interval_secs: u64,
    /// Coarse loop period (default: `3600`).
    pub schedule_interval_secs: u64,
    /// Whether the fine loop runs at all (default: `true`).
    pub notifications_enabled: bool,
    /// Per-request HTTP timeout (default: `10`).
    pub http_timeout_secs: u64,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                  | Default                       |
    /// |--------------------------|-------------------------------|
    /// | `DATABASE_URL`           | required                      |
    /// | `DISCORD_TOKEN`          | required                      |
    /// | `MAIN_GUILD_ID`          | required                      |
    /// | `TORN_API_URL`           | `https://api.torn.com`        |
    /// | `DISCORD_API_URL`        | `https://discord.com/api/v10` |
    /// | `NOTIFY_INTERVAL_SECS`   | `60`                          |
    /// | `SCHEDULE_INTERVAL_SECS` | `3600`                        |
    /// | `NOTIFICATIONS_ENABLED`  | `true`                        |
    /// | `HTTP_TIMEOUT_SECS`      | `10`                          |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |var: &'static str| lookup(var).ok_or(ConfigError::Missing(var));
        let or_default = |var: &str, default: &str| lookup(var).unwrap_or_else(|| default.into());

        let main_guild_id = parse("MAIN_GUILD_ID", required("MAIN_GUILD_ID")?)?;
        let notify_interval_secs = at_least(
            "NOTIFY_INTERVAL_SECS",
            parse("NOTIFY_INTERVAL_SECS", or_default("NOTIFY_INTERVAL_SECS", "60"))?,
            MIN_NOTIFY_INTERVAL_SECS,
        )?;
        let schedule_interval_secs = at_least(
            "SCHEDULE_INTERVAL_SECS",
            parse("SCHEDULE_INTERVAL_SECS", or_default("SCHEDULE_INTERVAL_SECS", "3600"))?,
            1,
        )?;
        let notifications_enabled =
            parse("NOTIFICATIONS_ENABLED", or_default("NOTIFICATIONS_ENABLED", "true"))?;
        let http_timeout_secs = at_least(
            "HTTP_TIMEOUT_SECS",
            parse("HTTP_TIMEOUT_SECS", or_default("HTTP_TIMEOUT_SECS", "10"))?,
            1,
        )?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            discord_token: required("DISCORD_TOKEN")?,
            main_guild_id,
            torn_api_url: or_default("TORN_API_URL", tornsync_torn::api::DEFAULT_BASE_URL),
            discord_api_url: or_default("DISCORD_API_URL", "https://discord.com/api/v10"),
            notify_interval_secs,
            schedule_interval_secs,
            notifications_enabled,
            http_timeout_secs,
        })
    }

    pub fn notify_interval(&self) -> Duration {
        Duration::from_secs(self.notify_interval_secs)
    }

    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// How long shutdown waits for a loop to finish its current entity:
    /// one request plus the writes after it.
    pub fn shutdown_grace(&self) -> Duration {
        self.http_timeout() * 2 + Duration::from_secs(5)
    }
}

fn parse<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { var, value })
}

fn at_least(var: &'static str, value: u64, min: u64) -> Result<u64, ConfigError> {
    if value < min {
        return Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
        });
    }
    Ok(value)
}
