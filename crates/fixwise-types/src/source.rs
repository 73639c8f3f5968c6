//! Knowledge source result types.
//!
//! Every knowledge adapter normalizes what it finds into `SourceResult`s.
//! Failures are data too: a source that timed out or could not be reached
//! is represented by a `SourceResult` whose `status` says so, never by an
//! error crossing into the coordinator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assessment::clamp_unit;

/// The closed set of knowledge sources the engine knows how to query.
///
/// Declaration order is ranking priority: direct repair guides first,
/// general web search last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    IFixit,
    Manual,
    WikiHow,
    Retailer,
    WebSearch,
}

impl SourceKind {
    pub const ALL: [SourceKind; 5] = [
        SourceKind::IFixit,
        SourceKind::Manual,
        SourceKind::WikiHow,
        SourceKind::Retailer,
        SourceKind::WebSearch,
    ];

    /// Fixed ranking priority (0 is highest).
    pub fn priority(self) -> u8 {
        match self {
            SourceKind::IFixit => 0,
            SourceKind::Manual => 1,
            SourceKind::WikiHow => 2,
            SourceKind::Retailer => 3,
            SourceKind::WebSearch => 4,
        }
    }

    /// Ranking weight in (0, 1], derived from priority.
    pub fn weight(self) -> f64 {
        1.0 - f64::from(self.priority()) * 0.15
    }

    /// Human-readable source name.
    pub fn label(self) -> &'static str {
        match self {
            SourceKind::IFixit => "iFixit",
            SourceKind::Manual => "Manufacturer manual",
            SourceKind::WikiHow => "WikiHow",
            SourceKind::Retailer => "Retailer",
            SourceKind::WebSearch => "Web search",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::IFixit => write!(f, "ifixit"),
            SourceKind::Manual => write!(f, "manual"),
            SourceKind::WikiHow => write!(f, "wikihow"),
            SourceKind::Retailer => write!(f, "retailer"),
            SourceKind::WebSearch => write!(f, "websearch"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ifixit" => Ok(SourceKind::IFixit),
            "manual" => Ok(SourceKind::Manual),
            "wikihow" => Ok(SourceKind::WikiHow),
            "retailer" => Ok(SourceKind::Retailer),
            "websearch" | "web" => Ok(SourceKind::WebSearch),
            other => Err(format!("invalid source kind: '{other}'")),
        }
    }
}

/// Outcome of asking one source.
///
/// `NoResults` is an answer ("nothing matched"); `Timeout` and
/// `Unreachable` are failures ("we could not ask").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Found,
    NoResults,
    Timeout,
    Unreachable,
}

impl FetchStatus {
    pub fn is_failed(self) -> bool {
        matches!(self, FetchStatus::Timeout | FetchStatus::Unreachable)
    }
}

/// A normalized result from one knowledge source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResult {
    pub id: Uuid,
    pub source: SourceKind,
    pub title: String,
    /// Canonical link to the guide or page.
    pub link: String,
    #[serde(default)]
    pub summary: String,
    /// Extracted repair steps, in the source's order.
    #[serde(default)]
    pub steps: Vec<String>,
    /// Tools the source says are required.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Per-result relevance/confidence in [0, 1].
    pub confidence: f64,
    pub latency_ms: u64,
    pub status: FetchStatus,
    /// Failure detail for `Timeout` / `Unreachable` results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceResult {
    /// A successful hit. Use the `with_*` builders to fill in content.
    pub fn found(source: SourceKind, title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            source,
            title: title.into(),
            link: link.into(),
            summary: String::new(),
            steps: Vec::new(),
            tools: Vec::new(),
            confidence: 0.5,
            latency_ms: 0,
            status: FetchStatus::Found,
            error: None,
        }
    }

    /// A miss record for a source that returned nothing or failed.
    pub fn miss(
        source: SourceKind,
        status: FetchStatus,
        latency_ms: u64,
        error: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            source,
            title: String::new(),
            link: String::new(),
            summary: String::new(),
            steps: Vec::new(),
            tools: Vec::new(),
            confidence: 0.0,
            latency_ms,
            status,
            error,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_steps<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps = steps
            .into_iter()
            .map(Into::into)
            .filter(|s: &String| !s.trim().is_empty())
            .collect();
        self
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_unit(confidence);
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Whether this source could not be asked (timeout or unreachable).
    pub fn failed(&self) -> bool {
        self.status.is_failed()
    }

    /// Whether this result carries usable evidence.
    pub fn is_usable(&self) -> bool {
        self.status == FetchStatus::Found
    }
}
