//! Engine configuration types for Fixwise.
//!
//! `EngineConfig` represents the top-level `config.toml` that controls the
//! readiness threshold, per-branch timeouts, session policy, and which
//! knowledge sources are queried.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::assessment::clamp_unit;
use crate::source::SourceKind;

/// Top-level configuration for the repair engine.
///
/// Loaded from `~/.fixwise/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum plan confidence for the discovery -> guidance switch.
    #[serde(default = "default_ready_threshold")]
    pub ready_threshold: f64,

    /// Default per-adapter timeout for knowledge source lookups.
    #[serde(default = "default_adapter_timeout_ms")]
    pub adapter_timeout_ms: u64,

    /// Timeout for a single vision classification.
    #[serde(default = "default_vision_timeout_ms")]
    pub vision_timeout_ms: u64,

    /// Reject messages for unknown session ids instead of creating them.
    #[serde(default)]
    pub strict_sessions: bool,

    /// Idle time after which a session is purged.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Jaro-Winkler similarity at which two titles count as duplicates.
    #[serde(default = "default_title_similarity")]
    pub title_similarity: f64,

    /// Cap on steps in a synthesized plan.
    #[serde(default = "default_max_plan_steps")]
    pub max_plan_steps: usize,

    /// Cap on sources feeding a synthesized plan.
    #[serde(default = "default_max_plan_sources")]
    pub max_plan_sources: usize,

    #[serde(default)]
    pub circuit: CircuitConfig,

    #[serde(default = "default_adapters")]
    pub adapters: Vec<AdapterConfig>,

    #[serde(default)]
    pub vision: VisionConfig,
}

fn default_ready_threshold() -> f64 {
    0.6
}

fn default_adapter_timeout_ms() -> u64 {
    8_000
}

fn default_vision_timeout_ms() -> u64 {
    15_000
}

fn default_session_ttl_secs() -> u64 {
    86_400
}

fn default_title_similarity() -> f64 {
    0.92
}

fn default_max_plan_steps() -> usize {
    12
}

fn default_max_plan_sources() -> usize {
    5
}

fn default_adapters() -> Vec<AdapterConfig> {
    vec![AdapterConfig::new(SourceKind::IFixit)]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ready_threshold: default_ready_threshold(),
            adapter_timeout_ms: default_adapter_timeout_ms(),
            vision_timeout_ms: default_vision_timeout_ms(),
            strict_sessions: false,
            session_ttl_secs: default_session_ttl_secs(),
            title_similarity: default_title_similarity(),
            max_plan_steps: default_max_plan_steps(),
            max_plan_sources: default_max_plan_sources(),
            circuit: CircuitConfig::default(),
            adapters: default_adapters(),
            vision: VisionConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Clamp every field into its valid range.
    pub fn normalized(mut self) -> Self {
        self.ready_threshold = clamp_unit(self.ready_threshold);
        self.title_similarity = clamp_unit(self.title_similarity);
        self.adapter_timeout_ms = self.adapter_timeout_ms.max(1);
        self.vision_timeout_ms = self.vision_timeout_ms.max(1);
        self.max_plan_steps = self.max_plan_steps.max(1);
        self.max_plan_sources = self.max_plan_sources.max(1);
        self.circuit.failure_threshold = self.circuit.failure_threshold.max(1);
        self
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_millis(self.adapter_timeout_ms)
    }

    pub fn vision_timeout(&self) -> Duration {
        Duration::from_millis(self.vision_timeout_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Enabled adapters only, in configuration order.
    pub fn enabled_adapters(&self) -> impl Iterator<Item = &AdapterConfig> {
        self.adapters.iter().filter(|a| a.enabled)
    }
}

/// Circuit breaker settings applied to every knowledge adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitConfig {
    /// Consecutive failures before an adapter is skipped.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// How long a tripped adapter is skipped before it is probed again.
    #[serde(default = "default_open_secs")]
    pub open_secs: u64,
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_open_secs() -> u64 {
    30
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            open_secs: default_open_secs(),
        }
    }
}

/// One `[[adapters]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub source: SourceKind,
    /// Base URL. iFixit has a built-in default; other sources need one.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the API key, if any.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Overrides `adapter_timeout_ms` for this source.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl AdapterConfig {
    pub fn new(source: SourceKind) -> Self {
        Self {
            source,
            endpoint: None,
            api_key_env: None,
            timeout_ms: None,
            enabled: true,
        }
    }

    /// This adapter's timeout, falling back to the engine default.
    pub fn timeout(&self, default: Duration) -> Duration {
        self.timeout_ms
            .map(|ms| Duration::from_millis(ms.max(1)))
            .unwrap_or(default)
    }
}

/// `[vision]` section. No endpoint means vision is unavailable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisionConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = EngineConfig::default();
        assert!((config.ready_threshold - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.adapter_timeout_ms, 8_000);
        assert!(!config.strict_sessions);
        assert_eq!(config.adapters.len(), 1);
        assert_eq!(config.adapters[0].source, SourceKind::IFixit);
        assert!(config.vision.endpoint.is_none());
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config.max_plan_steps, 12);
        assert_eq!(config.circuit.failure_threshold, 3);
        assert_eq!(config.adapters.len(), 1);
    }

    #[test]
    fn deserialize_with_values() {
        let toml_str = r#"
ready_threshold = 0.75
strict_sessions = true

[circuit]
failure_threshold = 5

[[adapters]]
source = "ifixit"

[[adapters]]
source = "wikihow"
endpoint = "https://search.example/wikihow"
api_key_env = "WIKIHOW_KEY"
timeout_ms = 2000

[[adapters]]
source = "websearch"
endpoint = "https://search.example/web"
enabled = false

[vision]
endpoint = "https://vision.example/classify"
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert!((config.ready_threshold - 0.75).abs() < f64::EPSILON);
        assert!(config.strict_sessions);
        assert_eq!(config.circuit.failure_threshold, 5);
        assert_eq!(config.circuit.open_secs, 30);
        assert_eq!(config.adapters.len(), 3);
        assert_eq!(config.enabled_adapters().count(), 2);
        assert_eq!(
            config.adapters[1].timeout(config.adapter_timeout()),
            Duration::from_millis(2000)
        );
        assert_eq!(
            config.adapters[0].timeout(config.adapter_timeout()),
            Duration::from_millis(8000)
        );
        assert_eq!(
            config.vision.endpoint.as_deref(),
            Some("https://vision.example/classify")
        );
    }

    #[test]
    fn normalized_clamps_out_of_range_values() {
        let config = EngineConfig {
            ready_threshold: 1.5,
            title_similarity: -2.0,
            max_plan_steps: 0,
            adapter_timeout_ms: 0,
            ..EngineConfig::default()
        }
        .normalized();
        assert_eq!(config.ready_threshold, 1.0);
        assert_eq!(config.title_similarity, 0.0);
        assert_eq!(config.max_plan_steps, 1);
        assert_eq!(config.adapter_timeout_ms, 1);
    }
}
