//! Research aggregation: concurrent adapter lookups, dedup, ranking, and
//! per-adapter circuit breaking.

pub mod aggregator;
pub mod dedup;
pub mod health;
pub mod ranking;

pub use aggregator::{ResearchAggregator, ResearchOutcome};
