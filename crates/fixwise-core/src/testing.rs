//! Fake capabilities shared by the engine tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use fixwise_types::assessment::{ItemAssessment, Severity};
use fixwise_types::error::{AdapterError, VisionError};
use fixwise_types::source::{SourceKind, SourceResult};

use crate::capability::{KnowledgeAdapter, VisionClassifier};

#[derive(Clone)]
enum Behavior {
    Hits(Vec<SourceResult>),
    Empty,
    Unreachable,
    Invalid,
    Hang(Duration),
}

/// Scripted knowledge adapter that counts how often it is called.
pub struct FakeAdapter {
    source: SourceKind,
    timeout: Duration,
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
}

impl FakeAdapter {
    fn with_behavior(source: SourceKind, behavior: Behavior) -> Self {
        Self {
            source,
            timeout: Duration::from_secs(2),
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn hits(source: SourceKind, results: Vec<SourceResult>) -> Self {
        Self::with_behavior(source, Behavior::Hits(results))
    }

    pub fn empty(source: SourceKind) -> Self {
        Self::with_behavior(source, Behavior::Empty)
    }

    pub fn unreachable(source: SourceKind) -> Self {
        Self::with_behavior(source, Behavior::Unreachable)
    }

    pub fn invalid(source: SourceKind) -> Self {
        Self::with_behavior(source, Behavior::Invalid)
    }

    pub fn hanging(source: SourceKind, delay: Duration) -> Self {
        Self::with_behavior(source, Behavior::Hang(delay))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl KnowledgeAdapter for FakeAdapter {
    fn source(&self) -> SourceKind {
        self.source
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn search(
        &self,
        _query: &str,
        _item_type: Option<&str>,
    ) -> Result<Vec<SourceResult>, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Hits(results) => Ok(results.clone()),
            Behavior::Empty => Ok(Vec::new()),
            Behavior::Unreachable => Err(AdapterError::Unreachable("connection refused".into())),
            Behavior::Invalid => Err(AdapterError::InvalidResponse("not json".into())),
            Behavior::Hang(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(Vec::new())
            }
        }
    }
}

/// Scripted vision classifier.
pub struct FakeVision {
    result: Result<ItemAssessment, String>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl FakeVision {
    pub fn returning(assessment: ItemAssessment) -> Self {
        Self {
            result: Ok(assessment),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            result: Err("model offline".to_string()),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl VisionClassifier for FakeVision {
    fn name(&self) -> &str {
        "fake-vision"
    }

    async fn classify(&self, _image: &[u8]) -> Result<ItemAssessment, VisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone().map_err(VisionError::Unavailable)
    }
}

pub fn hit(source: SourceKind, title: &str, link: &str, confidence: f64) -> SourceResult {
    SourceResult::found(source, title, link).with_confidence(confidence)
}

/// A hit carrying repair steps and tools.
pub fn guide(
    source: SourceKind,
    title: &str,
    link: &str,
    confidence: f64,
    steps: &[&str],
    tools: &[&str],
) -> SourceResult {
    hit(source, title, link, confidence)
        .with_steps(steps.iter().copied())
        .with_tools(tools.iter().copied())
}

pub fn assessment(item: &str, tags: &[&str], severity: Severity, confidence: f64) -> ItemAssessment {
    ItemAssessment::new(item, tags.iter().map(|t| t.to_string()), severity, confidence)
}

/// The two matching blender guides used across scenario tests.
pub fn blender_guides() -> Vec<SourceResult> {
    vec![
        guide(
            SourceKind::IFixit,
            "Blender Base Replacement",
            "https://www.ifixit.com/Guide/Blender+Base+Replacement/1001",
            0.85,
            &[
                "Unplug the blender and remove the jar",
                "Remove the screws on the bottom of the base",
                "Lift off the cracked base housing",
                "Fit the replacement base and refit the screws",
            ],
            &["Phillips screwdriver"],
        ),
        guide(
            SourceKind::WikiHow,
            "How to Repair a Cracked Blender Base",
            "https://www.wikihow.com/Repair-a-Cracked-Blender-Base",
            0.75,
            &[
                "Unplug the blender and remove the jar",
                "Remove the screws from the bottom of the base",
                "Apply epoxy to small cracks or fit a new base",
            ],
            &["screwdriver", "epoxy"],
        ),
    ]
}
