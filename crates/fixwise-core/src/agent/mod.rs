//! The two conversational agents: the discovery coordinator and the
//! guidance-mode guide, plus shared intent and reply helpers.

pub mod coordinator;
pub mod guide;
pub mod intent;
pub mod prompt;

pub use coordinator::{Coordinator, DiscoveryOutcome};
pub use guide::{ConversationalGuide, GuideReply};
pub use intent::{Intent, classify_intent};
