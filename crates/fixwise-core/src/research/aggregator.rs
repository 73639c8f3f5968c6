//! Fan-out/fan-in over the configured knowledge adapters.
//!
//! Each adapter lookup runs as its own task under its own hard timeout and
//! writes only to its own result slot. Slots are merged after every task
//! has settled, then deduplicated and ranked. Adapter failures never
//! escape: they become miss records.

use std::sync::Mutex;
use std::time::Instant;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use fixwise_types::config::CircuitConfig;
use fixwise_types::error::AdapterError;
use fixwise_types::source::{FetchStatus, SourceResult};

use super::dedup;
use super::health::AdapterHealth;
use crate::capability::BoxKnowledgeAdapter;

/// Everything one research pass produced.
#[derive(Debug, Clone, Default)]
pub struct ResearchOutcome {
    /// Deduplicated usable results, best first.
    pub results: Vec<SourceResult>,
    /// One record per adapter that returned nothing, failed, or was skipped.
    pub misses: Vec<SourceResult>,
}

impl ResearchOutcome {
    pub fn has_usable(&self) -> bool {
        !self.results.is_empty()
    }

    /// True when research ran and every adapter failed to answer.
    ///
    /// "No results" from a reachable source does not count as unavailable.
    pub fn all_unavailable(&self) -> bool {
        self.results.is_empty()
            && !self.misses.is_empty()
            && self.misses.iter().all(SourceResult::failed)
    }

    pub fn failed_count(&self) -> usize {
        self.misses.iter().filter(|m| m.failed()).count()
    }
}

/// Outcome of one adapter task: raw hits or a miss record.
enum Lookup {
    Hits(Vec<SourceResult>),
    Miss(SourceResult),
}

/// Queries every adapter concurrently and merges the answers.
pub struct ResearchAggregator {
    adapters: Vec<BoxKnowledgeAdapter>,
    health: Mutex<Vec<AdapterHealth>>,
    title_similarity: f64,
}

impl ResearchAggregator {
    pub fn new(
        adapters: Vec<BoxKnowledgeAdapter>,
        circuit: &CircuitConfig,
        title_similarity: f64,
    ) -> Self {
        let health = adapters
            .iter()
            .map(|a| AdapterHealth::new(a.source(), circuit))
            .collect();
        Self {
            adapters,
            health: Mutex::new(health),
            title_similarity,
        }
    }

    pub fn adapter_count(&self) -> usize {
        self.adapters.len()
    }

    /// Ranked, deduplicated usable results. Empty when every adapter failed
    /// or found nothing.
    pub async fn search(&self, query: &str, item_type: Option<&str>) -> Vec<SourceResult> {
        self.gather(query, item_type).await.results
    }

    /// Run one research pass and keep the miss records alongside results.
    pub async fn gather(&self, query: &str, item_type: Option<&str>) -> ResearchOutcome {
        let query = query.trim();
        if query.is_empty() || self.adapters.is_empty() {
            return ResearchOutcome::default();
        }

        let mut slots: Vec<Option<Lookup>> = (0..self.adapters.len()).map(|_| None).collect();
        let mut set: JoinSet<(usize, Lookup)> = JoinSet::new();

        let available = self.available_adapters();
        for (index, adapter) in self.adapters.iter().enumerate() {
            if !available[index] {
                debug!(source = %adapter.source(), "circuit open, skipping adapter");
                slots[index] = Some(Lookup::Miss(SourceResult::miss(
                    adapter.source(),
                    FetchStatus::Unreachable,
                    0,
                    Some("circuit open".to_string()),
                )));
                continue;
            }

            let adapter = adapter.clone();
            let query = query.to_string();
            let item_type = item_type.map(str::to_string);
            set.spawn(async move {
                let lookup = run_lookup(&adapter, &query, item_type.as_deref()).await;
                (index, lookup)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, lookup)) => slots[index] = Some(lookup),
                Err(e) => warn!(error = %e, "adapter task failed to join"),
            }
        }

        let mut hits = Vec::new();
        let mut misses = Vec::new();
        for (index, slot) in slots.into_iter().enumerate() {
            let source = self.adapters[index].source();
            match slot {
                Some(Lookup::Hits(results)) => hits.extend(results),
                Some(Lookup::Miss(miss)) => misses.push(miss),
                // Task panicked or was cancelled.
                None => misses.push(SourceResult::miss(
                    source,
                    FetchStatus::Unreachable,
                    0,
                    Some("adapter task aborted".to_string()),
                )),
            }
        }

        self.record_health(&hits, &misses);

        let raw = hits.len();
        let results = dedup::dedup(hits, self.title_similarity);
        info!(
            query,
            raw,
            kept = results.len(),
            misses = misses.len(),
            "research pass complete"
        );

        ResearchOutcome { results, misses }
    }

    fn available_adapters(&self) -> Vec<bool> {
        let mut health = self.health.lock().unwrap_or_else(|e| e.into_inner());
        health.iter_mut().map(AdapterHealth::is_available).collect()
    }

    fn record_health(&self, hits: &[SourceResult], misses: &[SourceResult]) {
        let mut health = self.health.lock().unwrap_or_else(|e| e.into_inner());
        for (index, adapter) in self.adapters.iter().enumerate() {
            let source = adapter.source();
            let entry = &mut health[index];

            if let Some(hit) = hits.iter().find(|h| h.source == source) {
                entry.record_success(hit.latency_ms);
                continue;
            }
            match misses.iter().find(|m| m.source == source) {
                Some(miss) if miss.error.as_deref() == Some("circuit open") => {}
                Some(miss) if miss.failed() => {
                    entry.record_failure(miss.latency_ms, miss.error.as_deref())
                }
                Some(miss) => entry.record_success(miss.latency_ms),
                None => {}
            }
        }
    }
}

/// Run one adapter under its hard timeout, folding every failure into data.
async fn run_lookup(adapter: &BoxKnowledgeAdapter, query: &str, item_type: Option<&str>) -> Lookup {
    let source = adapter.source();
    let timeout = adapter.timeout();
    let started = Instant::now();

    let outcome = tokio::time::timeout(timeout, adapter.search(query, item_type)).await;
    let latency_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(Ok(results)) => {
            let hits: Vec<SourceResult> = results
                .into_iter()
                .filter(SourceResult::is_usable)
                .map(|r| {
                    let r = SourceResult { source, ..r };
                    if r.latency_ms == 0 { r.with_latency_ms(latency_ms) } else { r }
                })
                .collect();
            debug!(%source, latency_ms, hits = hits.len(), "adapter answered");
            if hits.is_empty() {
                Lookup::Miss(SourceResult::miss(source, FetchStatus::NoResults, latency_ms, None))
            } else {
                Lookup::Hits(hits)
            }
        }
        Ok(Err(AdapterError::Timeout { after_ms })) => {
            warn!(%source, after_ms, "adapter reported timeout");
            Lookup::Miss(SourceResult::miss(
                source,
                FetchStatus::Timeout,
                latency_ms,
                Some(format!("timed out after {after_ms}ms")),
            ))
        }
        Ok(Err(e)) => {
            warn!(%source, latency_ms, error = %e, "adapter failed");
            Lookup::Miss(SourceResult::miss(
                source,
                FetchStatus::Unreachable,
                latency_ms,
                Some(e.to_string()),
            ))
        }
        Err(_) => {
            let after_ms = timeout.as_millis() as u64;
            warn!(%source, after_ms, "adapter timed out, lookup abandoned");
            Lookup::Miss(SourceResult::miss(
                source,
                FetchStatus::Timeout,
                latency_ms,
                Some(format!("timed out after {after_ms}ms")),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAdapter, hit};
    use fixwise_types::source::SourceKind;
    use std::time::Duration;

    fn circuit() -> CircuitConfig {
        CircuitConfig {
            failure_threshold: 3,
            open_secs: 30,
        }
    }

    fn aggregator(adapters: Vec<FakeAdapter>) -> ResearchAggregator {
        ResearchAggregator::new(
            adapters.into_iter().map(BoxKnowledgeAdapter::new).collect(),
            &circuit(),
            0.92,
        )
    }

    #[tokio::test]
    async fn all_adapters_failing_yields_empty_list() {
        let agg = aggregator(vec![
            FakeAdapter::unreachable(SourceKind::IFixit),
            FakeAdapter::unreachable(SourceKind::WikiHow),
            FakeAdapter::unreachable(SourceKind::Manual),
        ]);

        let outcome = agg.gather("blender won't turn on", None).await;
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.misses.len(), 3);
        assert!(outcome.all_unavailable());
        assert!(agg.search("blender won't turn on", None).await.is_empty());
    }

    #[tokio::test]
    async fn no_results_is_not_unavailable() {
        let agg = aggregator(vec![
            FakeAdapter::empty(SourceKind::IFixit),
            FakeAdapter::unreachable(SourceKind::WikiHow),
        ]);
        let outcome = agg.gather("blender", None).await;
        assert!(outcome.results.is_empty());
        assert!(!outcome.all_unavailable());
        assert_eq!(outcome.failed_count(), 1);
    }

    #[tokio::test]
    async fn slow_adapter_is_cancelled_and_others_survive() {
        let slow = FakeAdapter::hanging(SourceKind::Manual, Duration::from_secs(5))
            .with_timeout(Duration::from_millis(30));
        let fast = FakeAdapter::hits(
            SourceKind::IFixit,
            vec![hit(SourceKind::IFixit, "Blender base", "https://ifixit.com/g/1", 0.8)],
        );
        let agg = aggregator(vec![slow, fast]);

        let started = Instant::now();
        let outcome = agg.gather("blender", None).await;
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.misses.len(), 1);
        assert_eq!(outcome.misses[0].status, FetchStatus::Timeout);
    }

    #[tokio::test]
    async fn duplicate_links_collapse_across_adapters() {
        let agg = aggregator(vec![
            FakeAdapter::hits(
                SourceKind::WebSearch,
                vec![hit(SourceKind::WebSearch, "Blender fix", "http://www.ifixit.com/g/1/", 0.9)],
            ),
            FakeAdapter::hits(
                SourceKind::IFixit,
                vec![hit(SourceKind::IFixit, "Blender base replacement", "https://ifixit.com/g/1", 0.9)],
            ),
        ]);
        let results = agg.search("blender", None).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, SourceKind::IFixit);
    }

    #[tokio::test]
    async fn adapter_errors_are_recorded_as_misses() {
        let agg = aggregator(vec![FakeAdapter::invalid(SourceKind::Retailer)]);
        let outcome = agg.gather("blender", None).await;
        assert_eq!(outcome.misses[0].status, FetchStatus::Unreachable);
        assert!(outcome.misses[0].error.is_some());
    }

    #[tokio::test]
    async fn empty_query_skips_research() {
        let adapter = FakeAdapter::empty(SourceKind::IFixit);
        let calls = adapter.calls();
        let agg = aggregator(vec![adapter]);
        let outcome = agg.gather("   ", None).await;
        assert!(outcome.results.is_empty() && outcome.misses.is_empty());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn open_circuit_skips_adapter() {
        let adapter = FakeAdapter::unreachable(SourceKind::WikiHow);
        let calls = adapter.calls();
        let agg = ResearchAggregator::new(
            vec![BoxKnowledgeAdapter::new(adapter)],
            &CircuitConfig {
                failure_threshold: 1,
                open_secs: 60,
            },
            0.92,
        );

        agg.gather("blender", None).await;
        let second = agg.gather("blender", None).await;

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(second.misses[0].error.as_deref(), Some("circuit open"));
        assert!(second.all_unavailable());
    }
}
