//! Row structs and DTOs.
//!
//! Chat-platform snowflakes are stored as `BIGINT`; the accessors on each
//! row convert back to [`DiscordId`](tornsync_core::types::DiscordId).

pub mod guild_config;
pub mod tracked_entity;
