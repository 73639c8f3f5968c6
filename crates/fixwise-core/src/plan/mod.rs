//! Plan synthesis and the readiness policy.

pub mod difficulty;
pub mod readiness;
pub mod synthesizer;
pub mod text;

pub use readiness::{EvidenceGap, ReadinessDecision, ReadinessPolicy};
pub use synthesizer::PlanSynthesizer;
