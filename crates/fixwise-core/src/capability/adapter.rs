//! Knowledge source adapter capability.
//!
//! Follows the same blanket-impl pattern as the vision capability:
//! 1. `KnowledgeAdapter` uses native async fn in traits (RPITIT)
//! 2. Object-safe `KnowledgeAdapterDyn` with boxed futures, blanket-impl'd
//! 3. `BoxKnowledgeAdapter` wraps `Arc<dyn KnowledgeAdapterDyn>` so the
//!    aggregator can move a handle into each spawned lookup task

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use fixwise_types::error::AdapterError;
use fixwise_types::source::{SourceKind, SourceResult};

/// One external knowledge source (iFixit, manuals, WikiHow, ...).
///
/// Implementations return normalized `SourceResult`s with
/// `FetchStatus::Found`, or a typed error. An empty vector means the source
/// answered but had nothing. Implementations live in fixwise-infra.
pub trait KnowledgeAdapter: Send + Sync {
    /// Which source this adapter speaks for.
    fn source(&self) -> SourceKind;

    /// Hard per-call timeout the aggregator enforces.
    fn timeout(&self) -> Duration;

    /// Look up repair knowledge for a free-text query.
    fn search(
        &self,
        query: &str,
        item_type: Option<&str>,
    ) -> impl Future<Output = Result<Vec<SourceResult>, AdapterError>> + Send;
}

/// Object-safe version of [`KnowledgeAdapter`] with boxed futures.
pub trait KnowledgeAdapterDyn: Send + Sync {
    fn source(&self) -> SourceKind;

    fn timeout(&self) -> Duration;

    fn search_boxed<'a>(
        &'a self,
        query: &'a str,
        item_type: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SourceResult>, AdapterError>> + Send + 'a>>;
}

impl<T: KnowledgeAdapter> KnowledgeAdapterDyn for T {
    fn source(&self) -> SourceKind {
        KnowledgeAdapter::source(self)
    }

    fn timeout(&self) -> Duration {
        KnowledgeAdapter::timeout(self)
    }

    fn search_boxed<'a>(
        &'a self,
        query: &'a str,
        item_type: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<SourceResult>, AdapterError>> + Send + 'a>> {
        Box::pin(self.search(query, item_type))
    }
}

/// Type-erased, cheaply cloneable knowledge adapter.
#[derive(Clone)]
pub struct BoxKnowledgeAdapter {
    inner: Arc<dyn KnowledgeAdapterDyn>,
}

impl BoxKnowledgeAdapter {
    pub fn new<T: KnowledgeAdapter + 'static>(adapter: T) -> Self {
        Self {
            inner: Arc::new(adapter),
        }
    }

    pub fn source(&self) -> SourceKind {
        self.inner.source()
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout()
    }

    pub async fn search(
        &self,
        query: &str,
        item_type: Option<&str>,
    ) -> Result<Vec<SourceResult>, AdapterError> {
        self.inner.search_boxed(query, item_type).await
    }
}

impl std::fmt::Debug for BoxKnowledgeAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxKnowledgeAdapter")
            .field("source", &self.source())
            .field("timeout", &self.timeout())
            .finish()
    }
}
