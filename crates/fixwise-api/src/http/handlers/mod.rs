//! REST API request handlers.

pub mod session;
