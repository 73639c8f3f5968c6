//! Inbound turn and outbound reply contracts with the client layer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::plan::RepairPlan;
use crate::session::{ImageRef, SessionMode};

/// An image attached to an inbound turn: the client's opaque handle plus
/// the raw bytes the vision classifier needs.
#[derive(Clone, PartialEq, Eq)]
pub struct InboundImage {
    pub reference: ImageRef,
    pub data: Vec<u8>,
}

impl InboundImage {
    pub fn new(reference: ImageRef, data: Vec<u8>) -> Self {
        Self { reference, data }
    }
}

impl fmt::Debug for InboundImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundImage")
            .field("reference", &self.reference)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// What the engine says back for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    pub text: String,
    /// Session mode after this turn was processed.
    pub mode: SessionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<RepairPlan>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_links: Vec<String>,
    /// Set when the user signalled the repair worked.
    #[serde(default)]
    pub resolved: bool,
}

impl AgentReply {
    pub fn new(text: impl Into<String>, mode: SessionMode) -> Self {
        Self {
            text: text.into(),
            mode,
            plan: None,
            source_links: Vec::new(),
            resolved: false,
        }
    }

    pub fn with_plan(mut self, plan: RepairPlan) -> Self {
        self.source_links = plan.source_links();
        self.plan = Some(plan);
        self
    }

    pub fn with_source_links(mut self, links: Vec<String>) -> Self {
        self.source_links = links;
        self
    }

    pub fn resolved(mut self) -> Self {
        self.resolved = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_image_debug_hides_bytes() {
        let img = InboundImage::new(ImageRef::new("img-7"), vec![0u8; 2048]);
        let dbg = format!("{img:?}");
        assert!(dbg.contains("img-7"));
        assert!(dbg.contains("2048"));
        assert!(!dbg.contains("0, 0, 0"));
    }

    #[test]
    fn reply_serializes_mode_and_omits_empty_links() {
        let reply = AgentReply::new("Send a photo?", SessionMode::Discovery);
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["mode"], "discovery");
        assert_eq!(json["resolved"], false);
        assert!(json.get("source_links").is_none());
        assert!(json.get("plan").is_none());
    }

    #[test]
    fn resolved_builder_sets_flag() {
        let reply = AgentReply::new("Great!", SessionMode::Guidance).resolved();
        assert!(reply.resolved);
    }
}
