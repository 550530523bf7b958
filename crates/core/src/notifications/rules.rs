//! Declarative rule table: one descriptor per [`Category`].
//!
//! Every category is one of four rule kinds interpreted by
//! [`engine`](super::engine). Field locations are JSON pointers into the
//! snapshot (or into a feed item, for list rules) and message text is a
//! template with positional `{0}`, `{1}` … placeholders. `{s}` expands to a
//! plural suffix for counter rules.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use super::category::{Category, Shape};
use crate::snapshot::as_i64;
use crate::text::clean_event_text;

/// Seconds-remaining bound below which timer categories fire.
pub const THRESHOLD_SECS: i64 = 90;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\d+|s)\}").expect("static placeholder regex"));

/// How a message field is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Strings verbatim, numbers in plain decimal.
    Plain,
    /// Thousands-separated integer amount.
    Money,
    /// Remote HTML stripped down to plain text.
    Html,
}

/// One templated value.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub pointer: &'static str,
    pub format: Format,
}

/// A message template and the fields it interpolates.
#[derive(Debug, Clone, Copy)]
pub struct Message {
    pub template: &'static str,
    pub fields: &'static [Field],
}

/// Extra condition a threshold rule requires.
#[derive(Debug, Clone, Copy)]
pub struct Guard {
    pub pointer: &'static str,
    /// The guarded value must be strictly greater than this.
    pub above: i64,
}

#[derive(Debug, Clone, Copy)]
pub enum RuleKind {
    /// Per-item feed with a "seen" flag; `unread` gates the whole feed.
    List {
        feed: &'static str,
        unread: &'static str,
        message: Message,
    },
    /// Notify whenever a positive count changes.
    Counter {
        count: &'static str,
        message: Message,
    },
    /// Notify once per trigger window (`remaining < below` plus guard).
    Threshold {
        remaining: &'static str,
        below: i64,
        guard: Option<Guard>,
        message: Message,
    },
    /// Notify when landing soon at a destination not yet notified.
    Travel {
        remaining: &'static str,
        destination: &'static str,
        below: i64,
        message: Message,
    },
}

/// Everything needed to poll and evaluate one category.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub category: Category,
    /// API selections the rule reads from.
    pub selections: &'static [&'static str],
    pub kind: RuleKind,
}

impl Rule {
    pub fn shape(&self) -> Shape {
        match self.kind {
            RuleKind::List { .. } => Shape::List,
            RuleKind::Counter { .. } => Shape::Counter,
            RuleKind::Threshold { .. } => Shape::Threshold,
            RuleKind::Travel { .. } => Shape::Travel,
        }
    }
}

macro_rules! plain {
    ($pointer:literal) => {
        Field {
            pointer: $pointer,
            format: Format::Plain,
        }
    };
}

const fn timer(
    category: Category,
    selections: &'static [&'static str],
    remaining: &'static str,
    template: &'static str,
    fields: &'static [Field],
) -> Rule {
    Rule {
        category,
        selections,
        kind: RuleKind::Threshold {
            remaining,
            below: THRESHOLD_SECS,
            guard: None,
            message: Message { template, fields },
        },
    }
}

/// The rule table, in [`Category::ALL`] order.
pub static RULES: [Rule; 12] = [
    Rule {
        category: Category::Event,
        selections: &["events", "notifications"],
        kind: RuleKind::List {
            feed: "/events",
            unread: "/notifications/events",
            message: Message {
                template: "{0}",
                fields: &[Field {
                    pointer: "/event",
                    format: Format::Html,
                }],
            },
        },
    },
    Rule {
        category: Category::Message,
        selections: &["messages", "notifications"],
        kind: RuleKind::List {
            feed: "/messages",
            unread: "/notifications/messages",
            message: Message {
                template: "New message from {0}: {1}",
                fields: &[plain!("/name"), plain!("/title")],
            },
        },
    },
    Rule {
        category: Category::Award,
        selections: &["notifications"],
        kind: RuleKind::Counter {
            count: "/notifications/awards",
            message: Message {
                template: "You have {0} new award{s}",
                fields: &[plain!("/notifications/awards")],
            },
        },
    },
    timer(
        Category::Energy,
        &["bars"],
        "/energy/fulltime",
        "Energy at {0} / {1}",
        &[plain!("/energy/current"), plain!("/energy/maximum")],
    ),
    timer(
        Category::Nerve,
        &["bars"],
        "/nerve/fulltime",
        "Nerve at {0} / {1}",
        &[plain!("/nerve/current"), plain!("/nerve/maximum")],
    ),
    Rule {
        category: Category::Chain,
        selections: &["bars"],
        kind: RuleKind::Threshold {
            remaining: "/chain/timeout",
            below: THRESHOLD_SECS,
            guard: Some(Guard {
                pointer: "/chain/current",
                above: 10,
            }),
            message: Message {
                template: "Chain timeout in {0} seconds",
                fields: &[plain!("/chain/timeout")],
            },
        },
    },
    timer(
        Category::Education,
        &["education"],
        "/education_timeleft",
        "Education ends in {0} seconds",
        &[plain!("/education_timeleft")],
    ),
    timer(
        Category::Bank,
        &["money"],
        "/city_bank/time_left",
        "Bank investment ends in {0} seconds (${1})",
        &[
            plain!("/city_bank/time_left"),
            Field {
                pointer: "/city_bank/amount",
                format: Format::Money,
            },
        ],
    ),
    timer(
        Category::Drug,
        &["cooldowns"],
        "/cooldowns/drug",
        "Drug cooldown ends in {0} seconds",
        &[plain!("/cooldowns/drug")],
    ),
    timer(
        Category::Medical,
        &["cooldowns"],
        "/cooldowns/medical",
        "Medical cooldown ends in {0} seconds",
        &[plain!("/cooldowns/medical")],
    ),
    timer(
        Category::Booster,
        &["cooldowns"],
        "/cooldowns/booster",
        "Booster cooldown ends in {0} seconds",
        &[plain!("/cooldowns/booster")],
    ),
    Rule {
        category: Category::Travel,
        selections: &["travel"],
        kind: RuleKind::Travel {
            remaining: "/travel/time_left",
            destination: "/travel/destination",
            below: THRESHOLD_SECS,
            message: Message {
                template: "Landing in {0} in {1} seconds",
                fields: &[plain!("/travel/destination"), plain!("/travel/time_left")],
            },
        },
    },
];

pub fn rule_for(category: Category) -> &'static Rule {
    RULES
        .iter()
        .find(|r| r.category == category)
        .unwrap_or_else(|| unreachable!("every category has a rule"))
}

/// Sorted, de-duplicated API selections needed to evaluate `categories`.
pub fn selections_for(categories: &[Category]) -> Vec<&'static str> {
    categories
        .iter()
        .flat_map(|c| rule_for(*c).selections.iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

impl Message {
    /// Render against `source`; `None` if any field is missing.
    ///
    /// Only placeholders of the template are expanded; field values are
    /// inserted verbatim.
    pub fn render(&self, source: &Value, plural: Option<i64>) -> Option<String> {
        let values = self
            .fields
            .iter()
            .map(|field| format_field(source.pointer(field.pointer)?, field.format))
            .collect::<Option<Vec<String>>>()?;
        let suffix = if plural.is_some_and(|n| n > 1) { "s" } else { "" };

        let out = PLACEHOLDER.replace_all(self.template, |caps: &Captures<'_>| match &caps[1] {
            "s" => suffix.to_string(),
            index => index
                .parse::<usize>()
                .ok()
                .and_then(|i| values.get(i).cloned())
                .unwrap_or_else(|| caps[0].to_string()),
        });
        Some(out.into_owned())
    }
}

fn format_field(value: &Value, format: Format) -> Option<String> {
    match format {
        Format::Plain => match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        },
        Format::Money => as_i64(value).map(thousands),
        Format::Html => value.as_str().map(clean_event_text),
    }
}

/// `1234567` → `1,234,567`.
fn thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if n < 0 {
        out.insert(0, '-');
    }
    out
}
