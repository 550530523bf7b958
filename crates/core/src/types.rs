/// Chat-platform snowflake ids (users, guilds, roles, channels).
pub type DiscordId = u64;

/// External account ids as issued by the Torn API.
pub type TornId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Current time as whole epoch seconds, the unit checkpoints are stored in.
pub fn epoch_now() -> i64 {
    chrono::Utc::now().timestamp()
}
