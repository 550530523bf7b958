//! Chat-side reconciliation service.
//!
//! Wires the pure engine in `tornsync-core` to the external API client,
//! the Postgres store and the chat platform, and runs the fine
//! (notifications) and coarse (scheduled sweeps) loops.

pub mod commands;
pub mod config;
pub mod config_service;
pub mod discord;
pub mod dispatcher;
pub mod notify_loop;
pub mod platform;
pub mod scheduler;
pub mod store;
pub mod sweeps;
pub mod verify;
