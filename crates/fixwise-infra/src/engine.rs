//! Engine assembly: turns an [`EngineConfig`] into a [`SessionManager`].
//!
//! One shared `reqwest::Client` backs every adapter and the vision
//! classifier. Adapters that cannot be built (a non-iFixit source without
//! an endpoint) are skipped with a warning instead of failing startup.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use fixwise_core::agent::{ConversationalGuide, Coordinator};
use fixwise_core::capability::{BoxKnowledgeAdapter, BoxVisionClassifier};
use fixwise_core::plan::{PlanSynthesizer, ReadinessPolicy};
use fixwise_core::research::ResearchAggregator;
use fixwise_core::session::{ArenaSessionStore, SessionManager, SessionStore};
use fixwise_types::config::{AdapterConfig, EngineConfig};
use fixwise_types::error::RepositoryError;
use fixwise_types::session::{Session, SessionId};
use fixwise_types::source::SourceKind;

use crate::adapters::{IFixitAdapter, JsonSearchAdapter, api_key_from_env};
use crate::config::database_url;
use crate::sqlite::{DatabasePool, SqliteSessionStore};
use crate::vision::HttpVisionClassifier;

const USER_AGENT: &str = concat!("fixwise/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client for adapters and vision.
///
/// Per-request timeouts are set by each caller; the connect timeout here
/// only bounds dead hosts.
pub fn http_client() -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(5))
        .build()?;
    Ok(client)
}

fn build_adapter(
    client: &reqwest::Client,
    entry: &AdapterConfig,
    default_timeout: Duration,
) -> Option<BoxKnowledgeAdapter> {
    let timeout = entry.timeout(default_timeout);
    let endpoint = entry
        .endpoint
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());

    match (entry.source, endpoint) {
        (SourceKind::IFixit, endpoint) => {
            let mut adapter = IFixitAdapter::new(client.clone(), timeout);
            if let Some(endpoint) = endpoint {
                adapter = adapter.with_base_url(endpoint);
            }
            Some(BoxKnowledgeAdapter::new(adapter))
        }
        (source, Some(endpoint)) => {
            let api_key = api_key_from_env(entry.api_key_env.as_deref());
            if entry.api_key_env.is_some() && api_key.is_none() {
                warn!(%source, "API key variable is unset, querying without a key");
            }
            Some(BoxKnowledgeAdapter::new(JsonSearchAdapter::new(
                client.clone(),
                source,
                endpoint,
                api_key,
                timeout,
            )))
        }
        (source, None) => {
            warn!(%source, "adapter has no endpoint configured, skipping");
            None
        }
    }
}

/// Build every enabled knowledge adapter, in configuration order.
pub fn build_adapters(client: &reqwest::Client, config: &EngineConfig) -> Vec<BoxKnowledgeAdapter> {
    config
        .enabled_adapters()
        .filter_map(|entry| build_adapter(client, entry, config.adapter_timeout()))
        .collect()
}

/// Build the vision classifier, or `None` when no endpoint is configured.
pub fn build_vision(client: &reqwest::Client, config: &EngineConfig) -> Option<BoxVisionClassifier> {
    let endpoint = config
        .vision
        .endpoint
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())?;
    let api_key = api_key_from_env(config.vision.api_key_env.as_deref());
    Some(BoxVisionClassifier::new(HttpVisionClassifier::new(
        client.clone(),
        endpoint,
        api_key,
        config.vision.model.clone(),
        config.vision_timeout(),
    )))
}

/// Assemble the full engine on top of `store`.
pub fn build_manager<S: SessionStore>(
    config: &EngineConfig,
    store: S,
) -> anyhow::Result<SessionManager<S>> {
    let client = http_client()?;
    let adapters = build_adapters(&client, config);
    let vision = build_vision(&client, config);

    info!(
        adapters = adapters.len(),
        vision = vision.is_some(),
        ready_threshold = config.ready_threshold,
        strict = config.strict_sessions,
        "engine assembled"
    );

    let research = ResearchAggregator::new(adapters, &config.circuit, config.title_similarity);
    let coordinator = Coordinator::new(
        vision.clone(),
        research,
        PlanSynthesizer::new(config.max_plan_steps, config.max_plan_sources),
        ReadinessPolicy::new(config.ready_threshold),
        config.vision_timeout(),
    );
    let guide = ConversationalGuide::new(vision, config.vision_timeout());

    Ok(SessionManager::new(
        store,
        coordinator,
        guide,
        config.strict_sessions,
    ))
}

/// Where sessions live: the in-process arena or the SQLite database.
pub enum SessionBackend {
    Memory(ArenaSessionStore),
    Sqlite(SqliteSessionStore),
}

impl SessionBackend {
    /// Open the SQLite store under `data_dir`, creating the directory.
    pub async fn sqlite(data_dir: &Path) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let pool = DatabasePool::new(&database_url(data_dir)).await?;
        Ok(Self::Sqlite(SqliteSessionStore::new(pool)))
    }

    pub fn memory() -> Self {
        Self::Memory(ArenaSessionStore::new())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Sqlite(_) => "sqlite",
        }
    }
}

impl SessionStore for SessionBackend {
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        match self {
            Self::Memory(store) => store.load(id).await,
            Self::Sqlite(store) => store.load(id).await,
        }
    }

    async fn save(&self, session: &Session) -> Result<(), RepositoryError> {
        match self {
            Self::Memory(store) => store.save(session).await,
            Self::Sqlite(store) => store.save(session).await,
        }
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, RepositoryError> {
        match self {
            Self::Memory(store) => store.delete(id).await,
            Self::Sqlite(store) => store.delete(id).await,
        }
    }

    async fn purge_idle(&self, before: DateTime<Utc>) -> Result<Vec<SessionId>, RepositoryError> {
        match self {
            Self::Memory(store) => store.purge_idle(before).await,
            Self::Sqlite(store) => store.purge_idle(before).await,
        }
    }
}
