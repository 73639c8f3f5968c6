//! Conversational guide for sessions in guidance mode.
//!
//! Answers from the stored plan and the session's step index. It may call
//! the vision classifier on a new image, but never runs research or
//! synthesis; detecting a different problem is reported back to the
//! session manager, which restarts discovery.

use std::time::Duration;

use tracing::{debug, info, instrument};

use fixwise_types::assessment::ItemAssessment;
use fixwise_types::plan::RepairPlan;
use fixwise_types::reply::{AgentReply, InboundImage};
use fixwise_types::session::{Session, SessionMode};

use super::coordinator::classify_image;
use super::intent::{Intent, classify_intent};
use super::prompt::ReplyComposer;
use crate::capability::BoxVisionClassifier;
use crate::plan::text::content_tokens;

/// Minimum vision confidence before a new item type counts as a new problem.
pub const NEW_ITEM_CONFIDENCE: f64 = 0.5;

/// What the guide decided for one turn.
#[derive(Debug, Clone)]
pub struct GuideReply {
    pub reply: AgentReply,
    /// Step index the session should record.
    pub step_index: usize,
    /// The user moved on to a different problem; discovery must restart.
    pub new_problem: bool,
    /// Fresh assessment from a new image, if one was classified.
    pub assessment: Option<ItemAssessment>,
}

pub struct ConversationalGuide {
    vision: Option<BoxVisionClassifier>,
    vision_timeout: Duration,
}

impl ConversationalGuide {
    pub fn new(vision: Option<BoxVisionClassifier>, vision_timeout: Duration) -> Self {
        Self {
            vision,
            vision_timeout,
        }
    }

    #[instrument(skip_all, fields(session_id = %session.id, step = session.current_step_index))]
    pub async fn respond(
        &self,
        session: &Session,
        text: Option<&str>,
        image: Option<&InboundImage>,
    ) -> GuideReply {
        let text = text.unwrap_or_default();
        let fresh = classify_image(self.vision.as_ref(), image, self.vision_timeout).await;
        let index = session.current_step_index;

        let Some(plan) = session.last_plan() else {
            // Guidance without a plan cannot continue; start over.
            return Self::restart(index, fresh);
        };

        if let Some(new) = fresh.as_ref() {
            if is_different_item(session.last_assessment.as_ref(), new) {
                info!(item_type = %new.item_type, "new image shows a different item");
                return Self::restart(index, fresh);
            }
        }

        let intent = classify_intent(text);
        debug!(?intent, "guidance intent");

        let (reply, step_index) = match intent {
            Intent::NewProblem => return Self::restart(index, fresh),
            Intent::Resolved => (
                AgentReply::new(ReplyComposer::resolved(), SessionMode::Guidance).resolved(),
                index,
            ),
            Intent::Stuck => (Self::handoff(plan), index),
            _ if !plan.can_user_fix => (Self::handoff(plan), index),
            Intent::StepDone => {
                let next = (index + 1).min(plan.step_count());
                (Self::guidance(ReplyComposer::step_done(plan, next)), next)
            }
            Intent::PreviousStep => {
                let previous = index.saturating_sub(1);
                (Self::guidance(ReplyComposer::current_step(plan, previous)), previous)
            }
            Intent::RepeatStep => (Self::guidance(ReplyComposer::current_step(plan, index)), index),
            Intent::ShowPlan => (
                Self::guidance(ReplyComposer::full_plan(plan, index))
                    .with_source_links(plan.source_links()),
                index,
            ),
            Intent::Question => {
                let reply = if let Some(matched) = match_step(plan, text) {
                    ReplyComposer::step_answer(plan, matched, index)
                } else if let Some(new) = fresh.as_ref() {
                    ReplyComposer::progress_photo(new, plan, index)
                } else {
                    ReplyComposer::nudge(plan, index)
                };
                (Self::guidance(reply), index)
            }
        };

        GuideReply {
            reply,
            step_index,
            new_problem: false,
            assessment: fresh,
        }
    }

    fn guidance(text: String) -> AgentReply {
        AgentReply::new(text, SessionMode::Guidance)
    }

    fn handoff(plan: &RepairPlan) -> AgentReply {
        AgentReply::new(ReplyComposer::handoff(plan), SessionMode::Guidance)
            .with_source_links(plan.source_links())
    }

    fn restart(index: usize, fresh: Option<ItemAssessment>) -> GuideReply {
        GuideReply {
            reply: AgentReply::new(ReplyComposer::new_problem(), SessionMode::Discovery),
            step_index: index,
            new_problem: true,
            assessment: fresh,
        }
    }
}

/// A confident classification of an item other than the one being repaired.
pub fn is_different_item(current: Option<&ItemAssessment>, new: &ItemAssessment) -> bool {
    match current {
        Some(current) => {
            new.confidence >= NEW_ITEM_CONFIDENCE
                && new.is_identified()
                && current.is_identified()
                && !current.same_item_as(new)
        }
        None => false,
    }
}

/// The plan step a free-form question most overlaps with.
fn match_step(plan: &RepairPlan, question: &str) -> Option<usize> {
    let asked = content_tokens(question);
    if asked.is_empty() {
        return None;
    }
    plan.steps
        .iter()
        .enumerate()
        .map(|(i, step)| (i, content_tokens(step).intersection(&asked).count()))
        .filter(|(_, overlap)| *overlap > 0)
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(i, _)| i)
}
