//! The fixed set of notification categories.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One independently-triggered notification concern.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Event,
    Message,
    Award,
    Energy,
    Nerve,
    Chain,
    Education,
    Bank,
    Drug,
    Medical,
    Booster,
    Travel,
}

/// The four sub-state shapes a category can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    List,
    Counter,
    Threshold,
    Travel,
}

impl Category {
    pub const ALL: [Category; 12] = [
        Category::Event,
        Category::Message,
        Category::Award,
        Category::Energy,
        Category::Nerve,
        Category::Chain,
        Category::Education,
        Category::Bank,
        Category::Drug,
        Category::Medical,
        Category::Booster,
        Category::Travel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Event => "event",
            Category::Message => "message",
            Category::Award => "award",
            Category::Energy => "energy",
            Category::Nerve => "nerve",
            Category::Chain => "chain",
            Category::Education => "education",
            Category::Bank => "bank",
            Category::Drug => "drug",
            Category::Medical => "medical",
            Category::Booster => "booster",
            Category::Travel => "travel",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }

    pub fn shape(self) -> Shape {
        match self {
            Category::Event | Category::Message => Shape::List,
            Category::Award => Shape::Counter,
            Category::Travel => Shape::Travel,
            _ => Shape::Threshold,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
