//! Pure diff engine: previous state + fresh snapshot → new state + actions.
//!
//! Each enabled category is evaluated independently through its
//! [`Rule`](super::rules::Rule). A category whose required snapshot fields
//! are missing is skipped for the tick: no action and its previous
//! sub-state is carried over untouched. The engine performs no I/O and is
//! deterministic, so evaluating the same inputs twice yields the same
//! result.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use super::category::Category;
use super::rules::{rule_for, Guard, Message, RuleKind};
use super::state::{CategoryState, NotificationState, TravelMark};
use crate::snapshot::{is_truthy, Snapshot};

/// A direct message to send to the entity's chat identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyAction {
    pub category: Category,
    pub text: String,
}

/// What the engine decided for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Actions emitted, sub-state unchanged.
    Notify,
    /// Actions emitted and sub-state updated.
    NotifyAndMark,
    /// Sub-state reset to its cleared form.
    Clear,
    /// Nothing to do (sub-state may have been refreshed).
    NoOp,
    /// Required fields missing; category left untouched.
    Skipped,
}

/// Output of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub state: NotificationState,
    pub actions: Vec<NotifyAction>,
    pub decisions: BTreeMap<Category, Decision>,
}

impl Reconciliation {
    pub fn skipped(&self) -> Vec<Category> {
        self.decisions
            .iter()
            .filter(|(_, d)| **d == Decision::Skipped)
            .map(|(c, _)| *c)
            .collect()
    }
}

/// Evaluate every category enabled in `prev`.
pub fn reconcile_enabled(prev: &NotificationState, snapshot: &Snapshot) -> Reconciliation {
    reconcile(prev, snapshot, &prev.enabled())
}

/// Evaluate `enabled` categories against `snapshot`.
///
/// Categories not listed keep their previous sub-state.
pub fn reconcile(
    prev: &NotificationState,
    snapshot: &Snapshot,
    enabled: &[Category],
) -> Reconciliation {
    let mut state = prev.clone();
    let mut actions = Vec::new();
    let mut decisions = BTreeMap::new();

    let categories: BTreeSet<Category> = enabled.iter().copied().collect();
    for category in categories {
        let before = prev.sub_state(category);
        let Some((after, texts)) = evaluate(category, &before, snapshot) else {
            decisions.insert(category, Decision::Skipped);
            continue;
        };

        let decision = classify(&before, &after, !texts.is_empty());
        decisions.insert(category, decision);
        actions.extend(texts.into_iter().map(|text| NotifyAction { category, text }));
        state.categories.insert(category, after);
    }

    Reconciliation {
        state,
        actions,
        decisions,
    }
}

fn classify(before: &CategoryState, after: &CategoryState, notified: bool) -> Decision {
    match (notified, before == after) {
        (true, true) => Decision::Notify,
        (true, false) => Decision::NotifyAndMark,
        (false, false) if after.is_cleared() => Decision::Clear,
        (false, _) => Decision::NoOp,
    }
}

/// Evaluate one category; `None` means skip.
fn evaluate(
    category: Category,
    before: &CategoryState,
    snapshot: &Snapshot,
) -> Option<(CategoryState, Vec<String>)> {
    match (rule_for(category).kind, before) {
        (
            RuleKind::List {
                feed,
                unread,
                message,
            },
            CategoryState::List { notified },
        ) => evaluate_list(snapshot, feed, unread, &message, notified),
        (RuleKind::Counter { count, message }, CategoryState::Counter { notified }) => {
            evaluate_counter(snapshot, count, &message, *notified)
        }
        (
            RuleKind::Threshold {
                remaining,
                below,
                guard,
                message,
            },
            CategoryState::Threshold { notified },
        ) => evaluate_threshold(snapshot, remaining, below, guard, &message, *notified),
        (
            RuleKind::Travel {
                remaining,
                destination,
                below,
                message,
            },
            CategoryState::Travel { last },
        ) => evaluate_travel(snapshot, remaining, destination, below, &message, last.as_ref()),
        // `sub_state` always hands back the rule's own shape.
        _ => None,
    }
}

fn evaluate_list(
    snapshot: &Snapshot,
    feed: &str,
    unread: &str,
    message: &Message,
    notified: &BTreeSet<String>,
) -> Option<(CategoryState, Vec<String>)> {
    let cleared = || {
        Some((
            CategoryState::List {
                notified: BTreeSet::new(),
            },
            Vec::new(),
        ))
    };

    if !snapshot.truthy_at(unread)? {
        return cleared();
    }
    let items = snapshot.object_at(feed)?;
    if items.is_empty() {
        return cleared();
    }

    let mut next = notified.clone();
    let mut texts = Vec::new();
    // serde_json maps iterate in key order, which keeps output stable.
    for (id, item) in items {
        let seen = item.get("seen").is_some_and(is_truthy);
        if !seen && !notified.contains(id) {
            if let Some(text) = message.render(item, None) {
                texts.push(text);
                next.insert(id.clone());
            }
        } else if seen {
            next.remove(id);
        }
    }

    Some((CategoryState::List { notified: next }, texts))
}

fn evaluate_counter(
    snapshot: &Snapshot,
    count_at: &str,
    message: &Message,
    notified: Option<i64>,
) -> Option<(CategoryState, Vec<String>)> {
    let count = snapshot.i64_at(count_at)?;
    if count <= 0 {
        return Some((CategoryState::Counter { notified: None }, Vec::new()));
    }
    if notified == Some(count) {
        return Some((CategoryState::Counter { notified }, Vec::new()));
    }
    let text = message.render(snapshot.raw(), Some(count))?;
    Some((
        CategoryState::Counter {
            notified: Some(count),
        },
        vec![text],
    ))
}

fn evaluate_threshold(
    snapshot: &Snapshot,
    remaining_at: &str,
    below: i64,
    guard: Option<Guard>,
    message: &Message,
    notified: bool,
) -> Option<(CategoryState, Vec<String>)> {
    let remaining = snapshot.i64_at(remaining_at)?;
    let guarded = match guard {
        Some(g) => snapshot.i64_at(g.pointer)? > g.above,
        None => true,
    };

    if !(remaining < below && guarded) {
        return Some((CategoryState::Threshold { notified: false }, Vec::new()));
    }
    if notified {
        return Some((CategoryState::Threshold { notified: true }, Vec::new()));
    }
    let text = message.render(snapshot.raw(), None)?;
    Some((CategoryState::Threshold { notified: true }, vec![text]))
}

fn evaluate_travel(
    snapshot: &Snapshot,
    remaining_at: &str,
    destination_at: &str,
    below: i64,
    message: &Message,
    last: Option<&TravelMark>,
) -> Option<(CategoryState, Vec<String>)> {
    let remaining = snapshot.i64_at(remaining_at)?;
    if remaining >= below {
        return Some((CategoryState::Travel { last: None }, Vec::new()));
    }

    let destination = snapshot.get(destination_at).and_then(Value::as_str)?;
    let mark = TravelMark {
        destination: destination.to_string(),
        time_left: remaining,
    };

    let already = last.is_some_and(|l| l.destination == destination);
    let texts = if already {
        Vec::new()
    } else {
        vec![message.render(snapshot.raw(), None)?]
    };
    Some((CategoryState::Travel { last: Some(mark) }, texts))
}
