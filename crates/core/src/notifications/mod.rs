//! Personal notification reconciliation.
//!
//! - [`Category`]: the closed set of notification concerns.
//! - [`NotificationState`]: typed, versioned per-entity state blob.
//! - [`rules`]: one declarative [`Rule`](rules::Rule) per category.
//! - [`engine`]: the pure evaluator diffing state against a snapshot.

pub mod category;
pub mod engine;
pub mod rules;
pub mod state;

pub use category::{Category, Shape};
pub use engine::{reconcile, reconcile_enabled, Decision, NotifyAction, Reconciliation};
pub use rules::{rule_for, selections_for, Rule, RuleKind, THRESHOLD_SECS};
pub use state::{CategoryState, NotificationState, TravelMark, STATE_VERSION};
