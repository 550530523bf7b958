//! Read-only client for the Torn API.
//!
//! [`TornClient`] is the seam the reconciliation loops depend on;
//! [`TornApi`] is the HTTP implementation.

pub mod api;

pub use api::{Section, TornApi, TornClient};
