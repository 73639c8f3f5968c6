//! Infrastructure layer for Fixwise.
//!
//! Contains implementations of the capability and store traits defined in
//! `fixwise-core`: SQLite session storage, HTTP knowledge source adapters,
//! the HTTP vision classifier, config loading, and the wiring that builds a
//! ready-to-use session manager from an `EngineConfig`.

pub mod adapters;
pub mod config;
pub mod engine;
pub mod sqlite;
pub mod vision;
