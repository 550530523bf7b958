//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod guild_config_repo;
pub mod tracked_entity_repo;

pub use guild_config_repo::GuildConfigRepo;
pub use tracked_entity_repo::TrackedEntityRepo;
