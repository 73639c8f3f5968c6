//! Discovery coordinator.
//!
//! Runs vision and research concurrently for one session turn, joins them,
//! synthesizes a plan from the joined snapshot, and applies the readiness
//! policy. Neither branch can abort the turn: a failed or timed-out branch
//! contributes nothing.

use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use fixwise_types::assessment::ItemAssessment;
use fixwise_types::plan::RepairPlan;
use fixwise_types::reply::{AgentReply, InboundImage};
use fixwise_types::session::{Sender, Session, SessionMode};

use super::prompt::ReplyComposer;
use crate::capability::BoxVisionClassifier;
use crate::plan::{PlanSynthesizer, ReadinessPolicy};
use crate::research::{ResearchAggregator, ResearchOutcome};

/// Result of one discovery pass.
#[derive(Debug, Clone)]
pub struct DiscoveryOutcome {
    pub reply: AgentReply,
    /// Whether the session should move to guidance.
    pub ready: bool,
    /// The assessment produced this turn, if vision ran and succeeded.
    pub assessment: Option<ItemAssessment>,
    pub plan: RepairPlan,
    pub research: ResearchOutcome,
}

/// Classify an image under a hard timeout. Failures yield `None`.
pub(crate) async fn classify_image(
    vision: Option<&BoxVisionClassifier>,
    image: Option<&InboundImage>,
    timeout: Duration,
) -> Option<ItemAssessment> {
    let (vision, image) = match (vision, image) {
        (Some(v), Some(i)) if !i.data.is_empty() => (v, i),
        (None, Some(_)) => {
            warn!("image received but no vision classifier configured");
            return None;
        }
        _ => return None,
    };

    let started = Instant::now();
    match tokio::time::timeout(timeout, vision.classify(&image.data)).await {
        Ok(Ok(assessment)) => {
            info!(
                classifier = vision.name(),
                item_type = %assessment.item_type,
                severity = %assessment.severity,
                confidence = assessment.confidence,
                latency_ms = started.elapsed().as_millis() as u64,
                "image classified"
            );
            Some(assessment)
        }
        Ok(Err(e)) => {
            warn!(classifier = vision.name(), error = %e, "vision unavailable, using prior assessment");
            None
        }
        Err(_) => {
            warn!(
                classifier = vision.name(),
                timeout_ms = timeout.as_millis() as u64,
                "vision timed out, using prior assessment"
            );
            None
        }
    }
}

/// Orchestrates a discovery pass.
pub struct Coordinator {
    vision: Option<BoxVisionClassifier>,
    research: ResearchAggregator,
    synthesizer: PlanSynthesizer,
    policy: ReadinessPolicy,
    vision_timeout: Duration,
}

impl Coordinator {
    pub fn new(
        vision: Option<BoxVisionClassifier>,
        research: ResearchAggregator,
        synthesizer: PlanSynthesizer,
        policy: ReadinessPolicy,
        vision_timeout: Duration,
    ) -> Self {
        Self {
            vision,
            research,
            synthesizer,
            policy,
            vision_timeout,
        }
    }

    pub fn policy(&self) -> &ReadinessPolicy {
        &self.policy
    }

    /// Run one discovery pass for `session`.
    ///
    /// The session is read, never mutated; the caller applies the outcome.
    #[instrument(skip_all, fields(session_id = %session.id))]
    pub async fn run_discovery_turn(
        &self,
        session: &Session,
        text: Option<&str>,
        image: Option<&InboundImage>,
    ) -> DiscoveryOutcome {
        let prior = session.last_assessment.as_ref();
        let query = build_query(session, text, prior);
        let item_hint = prior
            .filter(|a| a.is_identified())
            .map(|a| a.item_type.clone());

        let vision_branch = classify_image(self.vision.as_ref(), image, self.vision_timeout);
        let research_branch = self.research.gather(&query, item_hint.as_deref());
        let (fresh, research) = tokio::join!(vision_branch, research_branch);

        let assessment = fresh.as_ref().or(prior);
        let plan = self.synthesizer.synthesize(assessment, &research.results);
        let decision = self.policy.evaluate(&plan, assessment, &research);

        info!(
            query = %query,
            results = research.results.len(),
            failed_sources = research.failed_count(),
            confidence = plan.confidence,
            insufficient = plan.insufficient_evidence,
            ready = decision.ready,
            "discovery pass complete"
        );

        let reply = match decision.gap {
            None if decision.ready => AgentReply::new(
                ReplyComposer::plan_summary(&plan, assessment),
                SessionMode::Guidance,
            )
            .with_plan(plan.clone()),
            gap => {
                let gap = gap.unwrap_or(crate::plan::EvidenceGap::LowConfidence);
                let links = research
                    .results
                    .iter()
                    .filter(|r| !r.link.is_empty())
                    .map(|r| r.link.clone())
                    .collect();
                AgentReply::new(ReplyComposer::follow_up(gap, assessment), SessionMode::Discovery)
                    .with_source_links(links)
            }
        };

        DiscoveryOutcome {
            reply,
            ready: decision.ready,
            assessment: fresh,
            plan,
            research,
        }
    }
}

/// Research query for this turn.
///
/// The current text, or the last thing the user said. When the item is not
/// yet known, the opening description of this discovery episode is
/// prepended so answers like "the base is cracked" still search for the
/// item.
fn build_query(session: &Session, text: Option<&str>, prior: Option<&ItemAssessment>) -> String {
    let current = text
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or_else(|| session.last_user_text())
        .unwrap_or_default()
        .to_string();

    if prior.is_some_and(ItemAssessment::is_identified) {
        return current;
    }

    let opening = session
        .discovery_turns()
        .iter()
        .filter(|t| t.sender == Sender::User)
        .map(|t| t.text.trim())
        .find(|t| !t.is_empty());

    match opening {
        Some(first) if !current.is_empty() && first != current => format!("{first} {current}"),
        Some(first) if current.is_empty() => first.to_string(),
        _ => current,
    }
}
