//! Readiness policy: the explicit Discovery -> Guidance transition
//! predicate.

use fixwise_types::assessment::ItemAssessment;
use fixwise_types::plan::RepairPlan;

use crate::research::ResearchOutcome;

/// Below this the item type is treated as uncertain.
const UNCERTAIN_ITEM: f64 = 0.5;

/// The weakest evidence dimension behind a "not ready" decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceGap {
    /// Every knowledge source failed.
    ResearchUnavailable,
    /// No assessment at all; a photo would help.
    MissingImage,
    /// The item was not identified with enough confidence.
    UncertainItem,
    /// Sources answered but none matched.
    NoSources,
    /// Evidence exists but the plan is below the threshold.
    LowConfidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessDecision {
    pub ready: bool,
    pub gap: Option<EvidenceGap>,
}

/// Decides whether a discovery pass produced enough to start guiding.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessPolicy {
    threshold: f64,
}

impl ReadinessPolicy {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: fixwise_types::assessment::clamp_unit(threshold),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Ready when the plan clears the threshold and research produced at
    /// least one usable result. All sources failing forces not-ready.
    pub fn evaluate(
        &self,
        plan: &RepairPlan,
        assessment: Option<&ItemAssessment>,
        research: &ResearchOutcome,
    ) -> ReadinessDecision {
        let ready = !research.all_unavailable()
            && research.has_usable()
            && !plan.insufficient_evidence
            && plan.confidence >= self.threshold;

        if ready {
            return ReadinessDecision { ready, gap: None };
        }

        let gap = if research.all_unavailable() {
            EvidenceGap::ResearchUnavailable
        } else {
            match assessment {
                None => EvidenceGap::MissingImage,
                Some(a) if a.confidence < UNCERTAIN_ITEM || !a.is_identified() => {
                    EvidenceGap::UncertainItem
                }
                Some(_) if !research.has_usable() => EvidenceGap::NoSources,
                Some(_) => EvidenceGap::LowConfidence,
            }
        };

        ReadinessDecision {
            ready: false,
            gap: Some(gap),
        }
    }
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self::new(0.6)
    }
}
