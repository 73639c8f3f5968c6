//! Shared domain types for Fixwise.
//!
//! This crate contains the core domain types used across the repair engine:
//! sessions and turns, item assessments, knowledge source results, repair
//! plans, agent replies, engine configuration, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod assessment;
pub mod config;
pub mod error;
pub mod plan;
pub mod reply;
pub mod session;
pub mod source;
