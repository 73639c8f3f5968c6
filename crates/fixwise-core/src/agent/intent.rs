//! Intent classification for guidance turns.
//!
//! Phrase matching over normalized text. Categories are checked in a fixed
//! order. A success phrase only counts when no negation directly precedes
//! it, so "not working now" is `Stuck` while "it works now, it was not
//! working before" is `Resolved`.

use crate::plan::text::{contains_phrase, normalize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// The user is describing a different problem or item.
    NewProblem,
    /// The user cannot continue or wants a professional.
    Stuck,
    /// The repair worked.
    Resolved,
    /// The current step is finished.
    StepDone,
    PreviousStep,
    RepeatStep,
    ShowPlan,
    /// Anything else: a free-form follow-up.
    Question,
}

const NEW_PROBLEM: &[&str] = &[
    "new problem",
    "different problem",
    "another problem",
    "new issue",
    "different issue",
    "another issue",
    "something else is broken",
    "something else broke",
    "different item",
    "start over",
];

const STUCK: &[&str] = &[
    "not fixed",
    "still broken",
    "still not working",
    "not working",
    "doesnt work",
    "does not work",
    "didnt work",
    "did not work",
    "stuck",
    "cant",
    "cannot",
    "give up",
    "too hard",
    "professional",
    "repair shop",
    "technician",
];

const RESOLVED: &[&str] = &[
    "its fixed",
    "it is fixed",
    "fixed it",
    "all fixed",
    "it works",
    "works now",
    "working now",
    "works again",
    "working again",
    "problem solved",
    "solved it",
    "that worked",
    "success",
];

const STEP_DONE: &[&str] = &["done", "next", "next step", "finished", "completed", "did that", "ok done"];

const PREVIOUS_STEP: &[&str] = &["previous", "previous step", "go back", "step back", "back one", "last step"];

const REPEAT_STEP: &[&str] = &["repeat", "again", "say that again", "what was that", "current step"];

const SHOW_PLAN: &[&str] = &["the plan", "show plan", "all steps", "whole plan", "full plan", "list steps", "show steps"];

const NEGATORS: &[&str] = &[
    "not", "no", "never", "isnt", "arent", "wasnt", "doesnt", "dont", "hasnt", "havent",
];

fn matches_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| contains_phrase(text, p))
}

/// Whether `phrase` occurs in `text` without a negator right before it.
fn affirmed(text: &str, phrase: &str) -> bool {
    let text = normalize(text);
    let phrase = normalize(phrase);
    let words: Vec<&str> = text.split(' ').collect();
    let target: Vec<&str> = phrase.split(' ').filter(|w| !w.is_empty()).collect();
    if target.is_empty() {
        return false;
    }
    words
        .windows(target.len())
        .enumerate()
        .any(|(i, window)| window == target.as_slice() && (i == 0 || !NEGATORS.contains(&words[i - 1])))
}

/// Classify a guidance-mode message.
pub fn classify_intent(text: &str) -> Intent {
    if matches_any(text, NEW_PROBLEM) {
        return Intent::NewProblem;
    }
    if RESOLVED.iter().any(|p| affirmed(text, p)) {
        return Intent::Resolved;
    }
    let ordered: [(&[&str], Intent); 5] = [
        (STUCK, Intent::Stuck),
        (STEP_DONE, Intent::StepDone),
        (PREVIOUS_STEP, Intent::PreviousStep),
        (REPEAT_STEP, Intent::RepeatStep),
        (SHOW_PLAN, Intent::ShowPlan),
    ];
    ordered
        .into_iter()
        .find(|(phrases, _)| matches_any(text, phrases))
        .map_or(Intent::Question, |(_, intent)| intent)
}
