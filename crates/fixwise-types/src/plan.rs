//! Repair plan types.
//!
//! A `RepairPlan` is the synthesized output of a discovery pass: ordered
//! steps, tools, difficulty, confidence, and the sources it was derived
//! from.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assessment::clamp_unit;
use crate::source::{SourceKind, SourceResult};

/// Aggregate difficulty of a repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
            Difficulty::Expert => write!(f, "expert"),
        }
    }
}

/// A pointer back to a `SourceResult` a plan was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: Uuid,
    pub source: SourceKind,
    pub title: String,
    pub link: String,
}

impl From<&SourceResult> for SourceRef {
    fn from(result: &SourceResult) -> Self {
        Self {
            id: result.id,
            source: result.source,
            title: result.title.clone(),
            link: result.link.clone(),
        }
    }
}

/// Structured repair plan.
///
/// Invariant: `difficulty == Expert` implies `can_user_fix == false`.
/// Construct through [`RepairPlan::new`] or [`RepairPlan::insufficient`]
/// so the invariant holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairPlan {
    pub steps: Vec<String>,
    pub tools: BTreeSet<String>,
    pub difficulty: Difficulty,
    /// Aggregate confidence in [0, 1].
    pub confidence: f64,
    pub references: Vec<SourceRef>,
    pub insufficient_evidence: bool,
    pub can_user_fix: bool,
}

impl RepairPlan {
    pub fn new(
        steps: Vec<String>,
        tools: BTreeSet<String>,
        difficulty: Difficulty,
        confidence: f64,
        references: Vec<SourceRef>,
    ) -> Self {
        let can_user_fix = difficulty != Difficulty::Expert && !steps.is_empty();
        Self {
            steps,
            tools,
            difficulty,
            confidence: clamp_unit(confidence),
            references,
            insufficient_evidence: false,
            can_user_fix,
        }
    }

    /// The plan returned when there is no usable evidence at all.
    pub fn insufficient(difficulty: Difficulty) -> Self {
        Self {
            steps: Vec::new(),
            tools: BTreeSet::new(),
            difficulty,
            confidence: 0.0,
            references: Vec::new(),
            insufficient_evidence: true,
            can_user_fix: false,
        }
    }

    /// Links of every referenced source, in reference order.
    pub fn source_links(&self) -> Vec<String> {
        self.references
            .iter()
            .filter(|r| !r.link.is_empty())
            .map(|r| r.link.clone())
            .collect()
    }

    pub fn step(&self, index: usize) -> Option<&str> {
        self.steps.get(index).map(String::as_str)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}
