//! Capability traits for the engine's external collaborators.
//!
//! The coordinator composes a closed set of typed capabilities rather than
//! dispatching on loosely-typed agent objects.

pub mod adapter;
pub mod vision;

pub use adapter::{BoxKnowledgeAdapter, KnowledgeAdapter};
pub use vision::{BoxVisionClassifier, VisionClassifier};
