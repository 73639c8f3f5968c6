//! Application state wiring the engine together.
//!
//! AppState holds the session manager used by both CLI and REST API. The
//! manager is generic over its session store; AppState pins it to
//! [`SessionBackend`], which is SQLite by default and in-memory for
//! `serve --memory`.

use std::path::PathBuf;
use std::sync::Arc;

use fixwise_core::session::SessionManager;
use fixwise_infra::config::{load_engine_config, resolve_data_dir};
use fixwise_infra::engine::{SessionBackend, build_manager};
use fixwise_types::config::EngineConfig;

pub type ConcreteSessionManager = SessionManager<SessionBackend>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ConcreteSessionManager>,
    pub config: Arc<EngineConfig>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load config from the data directory and open the session store.
    pub async fn init(in_memory: bool) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_engine_config(&data_dir).await;
        let backend = if in_memory {
            SessionBackend::memory()
        } else {
            SessionBackend::sqlite(&data_dir).await?
        };

        tracing::debug!(
            data_dir = %data_dir.display(),
            store = backend.name(),
            "application state initialized"
        );
        Self::from_parts(config, backend, data_dir)
    }

    pub fn from_parts(
        config: EngineConfig,
        backend: SessionBackend,
        data_dir: PathBuf,
    ) -> anyhow::Result<Self> {
        let manager = build_manager(&config, backend)?;
        Ok(Self {
            manager: Arc::new(manager),
            config: Arc::new(config),
            data_dir,
        })
    }
}
