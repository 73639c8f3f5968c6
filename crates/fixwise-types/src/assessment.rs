//! Vision assessment types.
//!
//! An `ItemAssessment` is what the vision classifier reports about the
//! photographed item. Each discovery turn produces a fresh assessment that
//! supersedes the previous one; assessments are never merged.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How badly the item is damaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Moderate,
    Severe,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Minor => write!(f, "minor"),
            Severity::Moderate => write!(f, "moderate"),
            Severity::Severe => write!(f, "severe"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "minor" | "low" => Ok(Severity::Minor),
            "moderate" | "medium" => Ok(Severity::Moderate),
            "severe" | "high" | "critical" => Ok(Severity::Severe),
            other => Err(format!("invalid severity: '{other}'")),
        }
    }
}

/// The vision classifier's reading of a photographed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemAssessment {
    /// Free-text item category (e.g. "blender", "bike tire").
    pub item_type: String,
    /// Observed damage, e.g. "cracked base", "frayed cord".
    pub damage_tags: BTreeSet<String>,
    pub severity: Severity,
    /// Classifier confidence in [0, 1].
    pub confidence: f64,
}

impl ItemAssessment {
    /// Build an assessment, clamping confidence into [0, 1].
    pub fn new(
        item_type: impl Into<String>,
        damage_tags: impl IntoIterator<Item = String>,
        severity: Severity,
        confidence: f64,
    ) -> Self {
        Self {
            item_type: item_type.into().trim().to_string(),
            damage_tags: damage_tags
                .into_iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            severity,
            confidence: clamp_unit(confidence),
        }
    }

    /// Case- and whitespace-insensitive item type comparison.
    pub fn same_item_as(&self, other: &ItemAssessment) -> bool {
        normalize_item_type(&self.item_type) == normalize_item_type(&other.item_type)
    }

    /// Whether the classifier actually identified something.
    pub fn is_identified(&self) -> bool {
        let normalized = normalize_item_type(&self.item_type);
        !normalized.is_empty() && normalized != "unknown"
    }
}

/// Normalize an item type for comparison: lowercase, single spaces.
pub fn normalize_item_type(item_type: &str) -> String {
    item_type
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Clamp a score into [0, 1], mapping NaN to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}
