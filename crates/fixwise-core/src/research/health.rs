//! Adapter health tracking for the research aggregator.
//!
//! A circuit breaker per knowledge source: after enough consecutive
//! failures the source is skipped for a while, then probed once before it
//! is trusted again.

use std::time::{Duration, Instant};

use fixwise_types::config::CircuitConfig;
use fixwise_types::source::SourceKind;

/// Circuit breaker state for an adapter.
#[derive(Debug, Clone)]
pub enum CircuitState {
    /// Normal operation. Tracks consecutive failures toward threshold.
    Closed { consecutive_failures: u32 },
    /// Adapter is skipped until `wait_duration` elapses.
    Open {
        opened_at: Instant,
        wait_duration: Duration,
    },
    /// Probing: one lookup allowed to test if the source recovered.
    HalfOpen,
}

/// Health tracking for a single knowledge source.
#[derive(Debug)]
pub struct AdapterHealth {
    pub source: SourceKind,
    pub state: CircuitState,
    pub last_error: Option<String>,
    pub last_latency_ms: Option<u64>,
    pub total_calls: u64,
    pub total_failures: u64,
    pub failure_threshold: u32,
    pub open_duration: Duration,
}

impl AdapterHealth {
    pub fn new(source: SourceKind, config: &CircuitConfig) -> Self {
        Self {
            source,
            state: CircuitState::Closed {
                consecutive_failures: 0,
            },
            last_error: None,
            last_latency_ms: None,
            total_calls: 0,
            total_failures: 0,
            failure_threshold: config.failure_threshold.max(1),
            open_duration: Duration::from_secs(config.open_secs),
        }
    }

    /// Check whether this adapter should be queried.
    ///
    /// Moves Open -> HalfOpen once the wait duration has elapsed.
    pub fn is_available(&mut self) -> bool {
        match &self.state {
            CircuitState::Closed { .. } | CircuitState::HalfOpen => true,
            CircuitState::Open {
                opened_at,
                wait_duration,
            } => {
                if opened_at.elapsed() >= *wait_duration {
                    self.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a lookup that reached the source (hits or no results).
    pub fn record_success(&mut self, latency_ms: u64) {
        self.total_calls += 1;
        self.last_latency_ms = Some(latency_ms);
        self.state = CircuitState::Closed {
            consecutive_failures: 0,
        };
    }

    /// Record a timeout or unreachable lookup.
    pub fn record_failure(&mut self, latency_ms: u64, error: Option<&str>) {
        self.total_calls += 1;
        self.total_failures += 1;
        self.last_latency_ms = Some(latency_ms);
        self.last_error = error.map(str::to_string);

        let failures = match &self.state {
            CircuitState::Closed {
                consecutive_failures,
            } => consecutive_failures + 1,
            // A failed probe reopens immediately.
            CircuitState::HalfOpen | CircuitState::Open { .. } => self.failure_threshold,
        };

        self.state = if failures >= self.failure_threshold {
            CircuitState::Open {
                opened_at: Instant::now(),
                wait_duration: self.open_duration,
            }
        } else {
            CircuitState::Closed {
                consecutive_failures: failures,
            }
        };
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, CircuitState::Open { .. })
    }
}
