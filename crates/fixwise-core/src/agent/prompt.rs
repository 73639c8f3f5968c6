//! User-facing reply text for discovery and guidance turns.
//!
//! Every message the engine sends is assembled here so wording stays
//! consistent between the coordinator and the guide.

use fixwise_types::assessment::ItemAssessment;
use fixwise_types::plan::RepairPlan;

use crate::plan::EvidenceGap;

/// Builds reply text. Stateless.
pub struct ReplyComposer;

impl ReplyComposer {
    fn item_name(assessment: Option<&ItemAssessment>) -> String {
        match assessment {
            Some(a) if a.is_identified() => a.item_type.trim().to_lowercase(),
            _ => "item".to_string(),
        }
    }

    /// Closing discovery message: plan summary plus where it came from.
    pub fn plan_summary(plan: &RepairPlan, assessment: Option<&ItemAssessment>) -> String {
        let item = Self::item_name(assessment);
        let mut lines = Vec::with_capacity(plan.steps.len() + 6);

        if plan.can_user_fix {
            lines.push(format!(
                "I have a repair plan for your {item} (difficulty: {}, confidence {:.0}%).",
                plan.difficulty,
                plan.confidence * 100.0
            ));
        } else {
            lines.push(format!(
                "This {item} repair is rated {} and is best left to a local repair professional.",
                plan.difficulty
            ));
            lines.push("Here is what the job involves so you know what to ask for:".to_string());
        }

        if !plan.tools.is_empty() {
            let tools: Vec<&str> = plan.tools.iter().map(String::as_str).collect();
            lines.push(format!("Tools: {}.", tools.join(", ")));
        }

        for (i, step) in plan.steps.iter().enumerate() {
            lines.push(format!("{}. {}", i + 1, step));
        }

        let links = plan.source_links();
        if !links.is_empty() {
            lines.push(format!("Sources: {}", links.join(" , ")));
        }

        if plan.can_user_fix {
            lines.push(
                "We'll go one step at a time. Say \"done\" after each step, or tell me if you get stuck."
                    .to_string(),
            );
        }
        lines.join("\n")
    }

    /// Clarifying question targeting the weakest evidence dimension.
    pub fn follow_up(gap: EvidenceGap, assessment: Option<&ItemAssessment>) -> String {
        let item = Self::item_name(assessment);
        match gap {
            EvidenceGap::ResearchUnavailable => "Repair research is temporarily unavailable, so I can't \
                 build a reliable plan right now. Please try again in a moment."
                .to_string(),
            EvidenceGap::MissingImage => "Could you send a photo of the item showing the damage, \
                 and tell me the brand and model if you know them?"
                .to_string(),
            EvidenceGap::UncertainItem => "I can't tell exactly what this is yet. What is the item, \
                 and what brand or model is it?"
                .to_string(),
            EvidenceGap::NoSources => format!(
                "I couldn't find a repair guide for your {item} yet. Can you describe what happens \
                 when you try to use it, or share the brand and model?"
            ),
            EvidenceGap::LowConfidence => format!(
                "I found a few possible fixes for your {item}, but I'm not confident yet. \
                 What exactly is wrong with it, and when did it start?"
            ),
        }
    }

    pub fn current_step(plan: &RepairPlan, index: usize) -> String {
        match plan.step(index) {
            Some(step) => format!("Step {} of {}: {}", index + 1, plan.step_count(), step),
            None => "You've reached the end of the plan. Is it working now?".to_string(),
        }
    }

    pub fn step_done(plan: &RepairPlan, next_index: usize) -> String {
        if next_index >= plan.step_count() {
            "Nice work, that was the last step. Is it working now?".to_string()
        } else {
            format!("Great. {}", Self::current_step(plan, next_index))
        }
    }

    pub fn full_plan(plan: &RepairPlan, index: usize) -> String {
        let mut lines: Vec<String> = plan
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let marker = if i == index { "->" } else { "  " };
                format!("{marker} {}. {s}", i + 1)
            })
            .collect();
        if !plan.tools.is_empty() {
            let tools: Vec<&str> = plan.tools.iter().map(String::as_str).collect();
            lines.push(format!("Tools: {}.", tools.join(", ")));
        }
        lines.join("\n")
    }

    pub fn step_answer(plan: &RepairPlan, matched: usize, current: usize) -> String {
        let mut text = format!(
            "That's covered in step {}: {}",
            matched + 1,
            plan.step(matched).unwrap_or_default()
        );
        if matched != current {
            text.push('\n');
            text.push_str(&format!("You're currently on {}", Self::current_step(plan, current)));
        }
        text
    }

    pub fn nudge(plan: &RepairPlan, index: usize) -> String {
        format!(
            "{}\nSay \"done\" when you've finished it, \"plan\" to see every step, or tell me if you're stuck.",
            Self::current_step(plan, index)
        )
    }

    pub fn progress_photo(assessment: &ItemAssessment, plan: &RepairPlan, index: usize) -> String {
        let damage = if assessment.damage_tags.is_empty() {
            "no obvious damage".to_string()
        } else {
            assessment.damage_tags.iter().cloned().collect::<Vec<_>>().join(", ")
        };
        format!(
            "Thanks for the photo. I can see: {damage} ({} severity).\n{}",
            assessment.severity,
            Self::current_step(plan, index)
        )
    }

    pub fn handoff(plan: &RepairPlan) -> String {
        let mut text = "No problem. This one is worth handing to a local repair shop or technician. \
             Bring the item and mention what you've tried so far."
            .to_string();
        let links = plan.source_links();
        if !links.is_empty() {
            text.push_str(&format!("\nThese guides describe the repair: {}", links.join(" , ")));
        }
        text
    }

    pub fn resolved() -> String {
        "Fantastic, glad it's working again! Thanks for fixing instead of replacing.".to_string()
    }

    pub fn new_problem() -> String {
        "Sounds like a different problem. Let's take a fresh look.".to_string()
    }
}
