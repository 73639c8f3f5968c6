//! Repair session and conversation turn types.
//!
//! A `Session` is the unit of conversation memory: its mode (discovery or
//! guidance), the append-only history of turns, and the latest assessment
//! and plan. Only the session manager mutates it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assessment::ItemAssessment;
use crate::plan::RepairPlan;

/// Client-chosen session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Opaque handle to an uploaded image, issued by the client layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which phase a session is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Gathering evidence (vision + research) to build a plan.
    Discovery,
    /// Walking the user through an already-synthesized plan.
    Guidance,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Discovery => write!(f, "discovery"),
            SessionMode::Guidance => write!(f, "guidance"),
        }
    }
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "discovery" => Ok(SessionMode::Discovery),
            "guidance" => Ok(SessionMode::Guidance),
            other => Err(format!("invalid session mode: '{other}'")),
        }
    }
}

impl Default for SessionMode {
    fn default() -> Self {
        SessionMode::Discovery
    }
}

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Agent,
}

/// Structured data attached to an agent turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<RepairPlan>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_links: Vec<String>,
    #[serde(default)]
    pub resolved: bool,
}

/// One message in a session's history. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub sender: Sender,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<TurnPayload>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>, image: Option<ImageRef>) -> Self {
        Self {
            id: Uuid::now_v7(),
            sender: Sender::User,
            text: text.into(),
            image,
            payload: None,
            created_at: Utc::now(),
        }
    }

    pub fn agent(text: impl Into<String>, payload: Option<TurnPayload>) -> Self {
        Self {
            id: Uuid::now_v7(),
            sender: Sender::Agent,
            text: text.into(),
            image: None,
            payload,
            created_at: Utc::now(),
        }
    }
}

/// A repair conversation.
///
/// History is append-only and the plan can only be attached by recording
/// a completed discovery pass, so both invariants are enforced here rather
/// than by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    mode: SessionMode,
    history: Vec<Turn>,
    pub last_assessment: Option<ItemAssessment>,
    last_plan: Option<RepairPlan>,
    /// Most recent image reference (single slot, overwritten per turn).
    pub last_image: Option<ImageRef>,
    /// Index of the plan step the user is currently working on.
    pub current_step_index: usize,
    discovery_passes: u32,
    /// Index of the user turn that opened the current discovery episode.
    #[serde(default)]
    discovery_start: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Session {
    /// A fresh session in `Discovery` mode with empty history.
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            mode: SessionMode::Discovery,
            history: Vec::new(),
            last_assessment: None,
            last_plan: None,
            last_image: None,
            current_step_index: 0,
            discovery_passes: 0,
            discovery_start: 0,
            created_at: now,
            last_activity_at: now,
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn last_plan(&self) -> Option<&RepairPlan> {
        self.last_plan.as_ref()
    }

    /// Number of completed coordinator passes.
    pub fn discovery_passes(&self) -> u32 {
        self.discovery_passes
    }

    /// Append a turn and bump the activity timestamp.
    pub fn append_turn(&mut self, turn: Turn) {
        self.last_activity_at = turn.created_at.max(self.last_activity_at);
        self.history.push(turn);
    }

    /// Record the result of a completed coordinator pass.
    pub fn record_discovery_pass(
        &mut self,
        assessment: Option<ItemAssessment>,
        plan: RepairPlan,
    ) {
        self.discovery_passes += 1;
        if assessment.is_some() {
            self.last_assessment = assessment;
        }
        self.last_plan = Some(plan);
    }

    /// Switch to guidance. Refused (returns false) without a plan.
    pub fn enter_guidance(&mut self) -> bool {
        if self.last_plan.is_none() {
            return false;
        }
        self.mode = SessionMode::Guidance;
        self.current_step_index = 0;
        true
    }

    /// Abandon the current plan and go back to discovery.
    ///
    /// The most recent turn becomes the opening turn of the new episode, so
    /// call this after appending the user turn that triggered it.
    pub fn restart_discovery(&mut self) {
        self.mode = SessionMode::Discovery;
        self.last_plan = None;
        self.current_step_index = 0;
        self.discovery_start = self.history.len().saturating_sub(1);
    }

    /// Turns belonging to the current discovery episode.
    pub fn discovery_turns(&self) -> &[Turn] {
        &self.history[self.discovery_start.min(self.history.len())..]
    }

    /// Most recent user turn text, if any.
    pub fn last_user_text(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|t| t.sender == Sender::User && !t.text.trim().is_empty())
            .map(|t| t.text.as_str())
    }
}
