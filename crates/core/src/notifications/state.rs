//! Typed, versioned per-entity notification state.
//!
//! A category is enabled for an entity when it has an entry in
//! [`NotificationState::categories`]; clearing a category resets its
//! sub-state but keeps the entry.
//!
//! Blobs persisted before versioning carried a flat
//! `{category: {...}}` object. [`NotificationState::from_json`] accepts
//! both shapes.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::category::{Category, Shape};
use crate::snapshot::{as_i64, is_truthy};

/// Current on-disk format version.
pub const STATE_VERSION: u32 = 1;

/// Last notified landing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelMark {
    pub destination: String,
    pub time_left: i64,
}

/// Sub-state of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CategoryState {
    /// Remote item ids already notified and not yet seen remotely.
    List { notified: BTreeSet<String> },
    /// Last notified count.
    Counter { notified: Option<i64> },
    /// Whether the current trigger window has already been notified.
    Threshold { notified: bool },
    /// Last notified destination, if currently in the trigger window.
    Travel { last: Option<TravelMark> },
}

impl CategoryState {
    /// The cleared sub-state for a shape.
    pub fn empty(shape: Shape) -> Self {
        match shape {
            Shape::List => Self::List {
                notified: BTreeSet::new(),
            },
            Shape::Counter => Self::Counter { notified: None },
            Shape::Threshold => Self::Threshold { notified: false },
            Shape::Travel => Self::Travel { last: None },
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Self::List { .. } => Shape::List,
            Self::Counter { .. } => Shape::Counter,
            Self::Threshold { .. } => Shape::Threshold,
            Self::Travel { .. } => Shape::Travel,
        }
    }

    pub fn is_cleared(&self) -> bool {
        *self == Self::empty(self.shape())
    }

    /// Decode one category from the pre-versioning flat format.
    fn from_legacy(shape: Shape, value: &Value) -> Self {
        match shape {
            Shape::List => Self::List {
                notified: value
                    .as_object()
                    .map(|o| {
                        o.iter()
                            .filter(|(_, v)| is_truthy(v))
                            .map(|(k, _)| k.clone())
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            Shape::Counter => Self::Counter {
                notified: value.get("notified").and_then(as_i64).filter(|n| *n > 0),
            },
            Shape::Threshold => Self::Threshold {
                notified: value.get("notified").is_some_and(is_truthy),
            },
            Shape::Travel => Self::Travel {
                last: value
                    .get("destination")
                    .and_then(Value::as_str)
                    .filter(|d| !d.is_empty())
                    .map(|d| TravelMark {
                        destination: d.to_string(),
                        time_left: value.get("time_left").and_then(as_i64).unwrap_or(0),
                    }),
            },
        }
    }
}

/// All notification sub-states for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationState {
    pub version: u32,
    #[serde(default)]
    pub categories: BTreeMap<Category, CategoryState>,
}

impl Default for NotificationState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            categories: BTreeMap::new(),
        }
    }
}

impl NotificationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State with the given categories enabled and cleared.
    pub fn with_categories(categories: impl IntoIterator<Item = Category>) -> Self {
        let mut state = Self::new();
        for c in categories {
            state.enable(c);
        }
        state
    }

    /// Enable a category; an existing sub-state is kept.
    pub fn enable(&mut self, category: Category) {
        self.categories
            .entry(category)
            .or_insert_with(|| CategoryState::empty(category.shape()));
    }

    pub fn enabled(&self) -> Vec<Category> {
        self.categories.keys().copied().collect()
    }

    pub fn get(&self, category: Category) -> Option<&CategoryState> {
        self.categories.get(&category)
    }

    /// Sub-state of `category`, or its cleared form if absent or of the
    /// wrong shape.
    pub fn sub_state(&self, category: Category) -> CategoryState {
        match self.categories.get(&category) {
            Some(s) if s.shape() == category.shape() => s.clone(),
            _ => CategoryState::empty(category.shape()),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Decode a persisted blob, versioned or legacy.
    ///
    /// Unknown categories are dropped and sub-states whose shape does not
    /// match their category are reset. Anything unreadable yields the
    /// empty state.
    pub fn from_json(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::new();
        };

        let mut state = if object.contains_key("version") {
            Self::decode_versioned(value)
        } else {
            Self::decode_legacy(object)
        };

        state.version = STATE_VERSION;
        for (category, sub) in state.categories.iter_mut() {
            if sub.shape() != category.shape() {
                *sub = CategoryState::empty(category.shape());
            }
        }
        state
    }

    fn decode_versioned(value: &Value) -> Self {
        let Some(raw) = value.get("categories").and_then(Value::as_object) else {
            return Self::new();
        };
        let mut state = Self::new();
        for (name, sub) in raw {
            let Some(category) = Category::from_name(name) else {
                continue;
            };
            let decoded = serde_json::from_value::<CategoryState>(sub.clone())
                .unwrap_or_else(|_| CategoryState::empty(category.shape()));
            state.categories.insert(category, decoded);
        }
        state
    }

    fn decode_legacy(object: &serde_json::Map<String, Value>) -> Self {
        let mut state = Self::new();
        for (name, sub) in object {
            if let Some(category) = Category::from_name(name) {
                state
                    .categories
                    .insert(category, CategoryState::from_legacy(category.shape(), sub));
            }
        }
        state
    }
}
