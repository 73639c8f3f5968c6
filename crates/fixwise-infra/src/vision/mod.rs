//! Vision classifier implementations.

pub mod http;

pub use http::HttpVisionClassifier;
