pub mod actions;
pub mod error;
pub mod guild;
pub mod identity;
pub mod notifications;
pub mod redact;
pub mod scheduling;
pub mod snapshot;
pub mod text;
pub mod types;
