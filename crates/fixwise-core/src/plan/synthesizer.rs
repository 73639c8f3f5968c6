//! Plan synthesis.
//!
//! Pure control logic: pick which sources feed the plan, merge their steps,
//! compute aggregate confidence and map difficulty. Same inputs, same plan.
//!
//! Confidence combines evidence as independent signals:
//!
//! ```text
//! E    = 1 - prod(1 - 0.9 * c_i * f_i)       over all usable sources
//! conf = 1 - (1 - 0.45 * a) * (1 - E)
//! ```
//!
//! where `a` is the assessment confidence, `c_i` a source's confidence and
//! `f_i` is 1.0 when the source shares a step with another usable source,
//! 0.8 otherwise. Every term only ever pushes confidence up, so adding usable
//! evidence never lowers it. The `max_sources` cap limits which sources feed
//! steps and references, never the evidence score.

use std::collections::BTreeSet;

use tracing::debug;

use fixwise_types::assessment::ItemAssessment;
use fixwise_types::plan::{RepairPlan, SourceRef};
use fixwise_types::source::SourceResult;

use super::difficulty::map_difficulty;
use super::text::{content_tokens, contains_phrase, jaccard, normalize};
use crate::research::ranking;

/// Weight of a single source at full confidence.
const SOURCE_WEIGHT: f64 = 0.9;
/// Weight of the vision assessment at full confidence.
const ASSESSMENT_WEIGHT: f64 = 0.45;
/// Factor for a source whose steps no other source shares.
const UNCORROBORATED_FACTOR: f64 = 0.8;
/// Token overlap at which two steps count as the same step.
const STEP_MATCH: f64 = 0.5;
/// Below this assessment confidence, no sources means no evidence at all.
const MIN_ASSESSMENT: f64 = 0.5;

/// Tool names recognized inside step text.
const TOOL_VOCABULARY: &[&str] = &[
    "screwdriver",
    "phillips screwdriver",
    "torx screwdriver",
    "pliers",
    "needle nose pliers",
    "multimeter",
    "soldering iron",
    "spudger",
    "wrench",
    "allen key",
    "hex key",
    "epoxy",
    "super glue",
    "electrical tape",
    "tire lever",
    "sandpaper",
    "heat gun",
];

/// A step reduced to the forms used for matching.
struct StepKey {
    normalized: String,
    tokens: BTreeSet<String>,
}

impl StepKey {
    fn new(text: &str) -> Option<Self> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return None;
        }
        Some(Self {
            tokens: content_tokens(text),
            normalized,
        })
    }

    fn matches(&self, other: &StepKey) -> bool {
        self.normalized == other.normalized || jaccard(&self.tokens, &other.tokens) >= STEP_MATCH
    }
}

/// A merged step, keyed by the first source that proposed it.
struct MergedStep {
    text: String,
    key: StepKey,
}

/// Builds a [`RepairPlan`] from an assessment and research results.
#[derive(Debug, Clone)]
pub struct PlanSynthesizer {
    max_steps: usize,
    max_sources: usize,
}

impl Default for PlanSynthesizer {
    fn default() -> Self {
        Self::new(12, 5)
    }
}

impl PlanSynthesizer {
    pub fn new(max_steps: usize, max_sources: usize) -> Self {
        Self {
            max_steps: max_steps.max(1),
            max_sources: max_sources.max(1),
        }
    }

    /// Synthesize a plan. Never fails: missing evidence yields an
    /// `insufficient_evidence` plan.
    pub fn synthesize(
        &self,
        assessment: Option<&ItemAssessment>,
        sources: &[SourceResult],
    ) -> RepairPlan {
        let usable = usable_sources(sources);
        let selected = &usable[..usable.len().min(self.max_sources)];
        let a = assessment.map_or(0.0, |a| a.confidence);

        if usable.is_empty() {
            let difficulty = map_difficulty(assessment, &[], &BTreeSet::new(), 0.0);
            let mut plan = RepairPlan::insufficient(difficulty);
            if a >= MIN_ASSESSMENT {
                plan.confidence = ASSESSMENT_WEIGHT * a;
            }
            debug!(assessment_confidence = a, "no usable sources, insufficient evidence");
            return plan;
        }

        let corroborated = corroborated_sources(&usable);
        let evidence = 1.0
            - usable
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    let factor = if corroborated.contains(&i) {
                        1.0
                    } else {
                        UNCORROBORATED_FACTOR
                    };
                    1.0 - SOURCE_WEIGHT * s.confidence * factor
                })
                .product::<f64>();
        let confidence = 1.0 - (1.0 - ASSESSMENT_WEIGHT * a) * (1.0 - evidence);

        let mut steps: Vec<String> = merge_steps(selected).into_iter().map(|m| m.text).collect();
        if steps.is_empty() {
            steps = selected
                .iter()
                .map(|s| format!("Follow the guide \"{}\"", s.title.trim()))
                .collect();
        }
        steps.truncate(self.max_steps);

        let tools = collect_tools(selected, &steps);
        let difficulty = map_difficulty(assessment, &steps, &tools, confidence);
        let references = selected.iter().map(|s| SourceRef::from(*s)).collect();

        debug!(
            usable = usable.len(),
            sources = selected.len(),
            corroborated = corroborated.len(),
            steps = steps.len(),
            confidence,
            %difficulty,
            "plan synthesized"
        );

        RepairPlan::new(steps, tools, difficulty, confidence, references)
    }
}

/// Usable sources in rank order.
fn usable_sources(sources: &[SourceResult]) -> Vec<&SourceResult> {
    let mut usable: Vec<&SourceResult> = sources.iter().filter(|s| s.is_usable()).collect();
    usable.sort_by(|a, b| ranking::compare(a, b));
    usable
}

/// Merge steps across sources, keeping first-seen order.
fn merge_steps(sources: &[&SourceResult]) -> Vec<MergedStep> {
    let mut merged: Vec<MergedStep> = Vec::new();
    for source in sources {
        for step in &source.steps {
            let text = step.trim();
            let Some(key) = StepKey::new(text) else {
                continue;
            };
            if !merged.iter().any(|m| m.key.matches(&key)) {
                merged.push(MergedStep {
                    text: text.to_string(),
                    key,
                });
            }
        }
    }
    merged
}

/// Indices of sources sharing at least one step with another source.
///
/// Decided pairwise, so adding a source never takes corroboration away
/// from another.
fn corroborated_sources(sources: &[&SourceResult]) -> BTreeSet<usize> {
    let keys: Vec<Vec<StepKey>> = sources
        .iter()
        .map(|s| s.steps.iter().filter_map(|t| StepKey::new(t.trim())).collect())
        .collect();

    let mut corroborated = BTreeSet::new();
    for (i, steps_i) in keys.iter().enumerate() {
        for (j, steps_j) in keys.iter().enumerate().skip(i + 1) {
            if steps_i.iter().any(|a| steps_j.iter().any(|b| a.matches(b))) {
                corroborated.insert(i);
                corroborated.insert(j);
            }
        }
    }
    corroborated
}

fn collect_tools(sources: &[&SourceResult], steps: &[String]) -> BTreeSet<String> {
    let mut tools: BTreeSet<String> = sources
        .iter()
        .flat_map(|s| s.tools.iter())
        .map(|t| normalize(t))
        .filter(|t| !t.is_empty())
        .collect();

    for step in steps {
        for term in TOOL_VOCABULARY {
            if contains_phrase(step, term) {
                tools.insert((*term).to_string());
            }
        }
    }
    tools
}
