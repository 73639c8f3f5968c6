//! Difficulty mapping.
//!
//! Total over every input: hazardous repairs are always `Expert`; anything
//! else is scored from severity, plan length, tool count and confidence,
//! and every score lands in exactly one band.

use std::collections::BTreeSet;

use fixwise_types::assessment::{ItemAssessment, Severity};
use fixwise_types::plan::Difficulty;

use super::text::contains_phrase;

/// Terms that mark a repair as unsafe for a non-professional.
pub const HAZARD_TERMS: &[&str] = &[
    "gas",
    "gas line",
    "refrigerant",
    "mains",
    "high voltage",
    "microwave",
    "capacitor",
    "swollen battery",
    "airbag",
    "asbestos",
];

/// Whether any of the given texts mentions a hazard.
pub fn is_hazardous<'a>(texts: impl IntoIterator<Item = &'a str>) -> bool {
    texts
        .into_iter()
        .any(|text| HAZARD_TERMS.iter().any(|term| contains_phrase(text, term)))
}

/// Map a candidate plan onto one of the four difficulty levels.
pub fn map_difficulty(
    assessment: Option<&ItemAssessment>,
    steps: &[String],
    tools: &BTreeSet<String>,
    confidence: f64,
) -> Difficulty {
    let assessment_texts = assessment
        .into_iter()
        .flat_map(|a| std::iter::once(a.item_type.as_str()).chain(a.damage_tags.iter().map(String::as_str)));
    let step_texts = steps.iter().map(String::as_str);
    if is_hazardous(assessment_texts.chain(step_texts)) {
        return Difficulty::Expert;
    }

    let severity = match assessment.map(|a| a.severity) {
        Some(Severity::Minor) => 0,
        Some(Severity::Moderate) | None => 1,
        Some(Severity::Severe) => 2,
    };
    let length = match steps.len() {
        0..=4 => 0,
        5..=8 => 1,
        _ => 2,
    };
    let tooling = match tools.len() {
        0..=2 => 0,
        3..=4 => 1,
        _ => 2,
    };
    let uncertainty = if confidence < 0.4 { 1 } else { 0 };

    match severity + length + tooling + uncertainty {
        0..=1 => Difficulty::Easy,
        2..=3 => Difficulty::Medium,
        4..=5 => Difficulty::Hard,
        _ => Difficulty::Expert,
    }
}
