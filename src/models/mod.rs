use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub mod tracked_item;

// Re-exports for convenience
pub use tracked_item::*;

/// Lifecycle of a tracked item. `Notified` is terminal; `Cooldown` items
/// become pollable again once their deadline passes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    Pending,
    Notified,
    Cooldown,
}

/// Canonical size vocabulary in rank order. Declaration order is the rank:
/// deriving `Ord` makes sorting a size list produce the canonical order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum SizeLabel {
    Xxs,
    Xs,
    S,
    M,
    L,
    Xl,
    Xxl,
}

impl SizeLabel {
    pub const ALL: [SizeLabel; 7] = [
        SizeLabel::Xxs,
        SizeLabel::Xs,
        SizeLabel::S,
        SizeLabel::M,
        SizeLabel::L,
        SizeLabel::Xl,
        SizeLabel::Xxl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeLabel::Xxs => "XXS",
            SizeLabel::Xs => "XS",
            SizeLabel::S => "S",
            SizeLabel::M => "M",
            SizeLabel::L => "L",
            SizeLabel::Xl => "XL",
            SizeLabel::Xxl => "XXL",
        }
    }
}

impl FromStr for SizeLabel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "XXS" => Ok(SizeLabel::Xxs),
            "XS" => Ok(SizeLabel::Xs),
            "S" => Ok(SizeLabel::S),
            "M" => Ok(SizeLabel::M),
            "L" => Ok(SizeLabel::L),
            "XL" => Ok(SizeLabel::Xl),
            "XXL" => Ok(SizeLabel::Xxl),
            _ => Err(()),
        }
    }
}

impl fmt::Display for SizeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Helper function to generate opaque item ids
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
