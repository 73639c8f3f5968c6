//! Engine configuration loader for Fixwise.
//!
//! Reads `config.toml` from the data directory (`~/.fixwise/` in production)
//! and deserializes it into [`EngineConfig`]. Falls back to defaults when the
//! file is missing or malformed, and clamps every value into range.

use std::path::{Path, PathBuf};

use fixwise_types::config::EngineConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "FIXWISE_DATA_DIR";

/// Resolve the data directory: `FIXWISE_DATA_DIR`, else `~/.fixwise`, else
/// `./.fixwise` when no home directory is known.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".fixwise"))
        .unwrap_or_else(|| PathBuf::from(".fixwise"))
}

/// SQLite URL for the session database inside `data_dir`.
pub fn database_url(data_dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", data_dir.join("fixwise.db").display())
}

/// Load engine configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`EngineConfig::default()`].
/// - Unreadable or unparsable file: logs a warning, returns the default.
/// - Otherwise the parsed config, normalized.
pub async fn load_engine_config(data_dir: &Path) -> EngineConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return EngineConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return EngineConfig::default();
        }
    };

    match toml::from_str::<EngineConfig>(&content) {
        Ok(config) => config.normalized(),
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            EngineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixwise_types::source::SourceKind;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config.adapter_timeout_ms, 8_000);
        assert!(!config.strict_sessions);
        assert_eq!(config.adapters.len(), 1);
    }

    #[tokio::test]
    async fn valid_toml_is_parsed_and_clamped() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
ready_threshold = 1.7
strict_sessions = true
adapter_timeout_ms = 2500

[circuit]
failure_threshold = 0

[[adapters]]
source = "ifixit"

[[adapters]]
source = "wikihow"
endpoint = "https://search.example.com/wikihow"
api_key_env = "WIKIHOW_SEARCH_KEY"
timeout_ms = 1200

[vision]
endpoint = "https://vision.example.com/classify"
"#,
        )
        .await
        .unwrap();

        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config.ready_threshold, 1.0);
        assert!(config.strict_sessions);
        assert_eq!(config.circuit.failure_threshold, 1);
        assert_eq!(config.adapters.len(), 2);
        assert_eq!(config.adapters[1].source, SourceKind::WikiHow);
        assert_eq!(config.adapters[1].timeout_ms, Some(1200));
        assert!(config.vision.endpoint.is_some());
    }

    #[tokio::test]
    async fn invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config.ready_threshold, 0.6);
    }

    #[test]
    fn database_url_points_into_data_dir() {
        let url = database_url(Path::new("/tmp/fw"));
        assert!(url.starts_with("sqlite:///tmp/fw/"));
        assert!(url.contains("fixwise.db"));
    }
}
