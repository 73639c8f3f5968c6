//! iFixit guide search adapter.
//!
//! Queries the public iFixit API (`/api/2.0/search/{query}?filter=guide`),
//! then fetches step and tool details for the top guides in parallel. A
//! failed detail fetch keeps the guide as a link-only hit.

use std::time::Duration;

use futures_util::future::join_all;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use fixwise_core::capability::KnowledgeAdapter;
use fixwise_types::error::AdapterError;
use fixwise_types::source::{SourceKind, SourceResult};

use super::{ensure_success, map_request_error, relevance, search_phrase};

/// Public iFixit API base.
pub const DEFAULT_ENDPOINT: &str = "https://www.ifixit.com/api/2.0";

/// Search hits kept per query.
const SEARCH_LIMIT: usize = 5;
/// Hits that get a detail fetch for steps and tools.
const DETAIL_LIMIT: usize = 2;

pub struct IFixitAdapter {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl IFixitAdapter {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            client,
            base_url: DEFAULT_ENDPOINT.to_string(),
            timeout,
        }
    }

    /// Override the base URL (useful for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, segments: &[&str]) -> Result<Url, AdapterError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AdapterError::Unreachable(format!("invalid endpoint: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| AdapterError::Unreachable(format!("invalid endpoint: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: Url) -> Result<T, AdapterError> {
        let response = self
            .client
            .get(url)
            .header("accept", "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| map_request_error(e, self.timeout))?;
        let response = ensure_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| AdapterError::InvalidResponse(format!("failed to parse response: {e}")))
    }

    async fn guide_detail(&self, guide_id: u64) -> Option<GuideDetail> {
        let url = self.url(&["guides", &guide_id.to_string()]).ok()?;
        match self.get_json::<GuideDetail>(url).await {
            Ok(detail) => Some(detail),
            Err(e) => {
                debug!(guide_id, error = %e, "iFixit guide detail unavailable");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "dataType", default)]
    data_type: String,
    #[serde(default)]
    guideid: Option<u64>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Default, Deserialize)]
struct GuideDetail {
    #[serde(default)]
    steps: Vec<GuideStep>,
    #[serde(default)]
    tools: Vec<GuideTool>,
}

#[derive(Debug, Deserialize)]
struct GuideStep {
    #[serde(default)]
    title: String,
    #[serde(default)]
    lines: Vec<GuideLine>,
}

#[derive(Debug, Deserialize)]
struct GuideLine {
    #[serde(default)]
    text_raw: String,
}

#[derive(Debug, Deserialize)]
struct GuideTool {
    #[serde(default)]
    text: String,
}

impl GuideStep {
    /// One plan step per guide step: its lines joined, else its title.
    fn text(&self) -> Option<String> {
        let lines: Vec<&str> = self
            .lines
            .iter()
            .map(|l| l.text_raw.trim())
            .filter(|t| !t.is_empty())
            .collect();
        let text = if lines.is_empty() {
            self.title.trim().to_string()
        } else {
            lines.join(" ")
        };
        (!text.is_empty()).then_some(text)
    }
}

fn to_source_result(query: &str, hit: SearchHit, detail: Option<GuideDetail>) -> SourceResult {
    let confidence = relevance(query, &hit.title, &hit.summary);
    let mut result = SourceResult::found(SourceKind::IFixit, hit.title.trim(), hit.url.trim())
        .with_summary(hit.summary.trim())
        .with_confidence(confidence);
    if let Some(detail) = detail {
        result = result
            .with_steps(detail.steps.iter().filter_map(GuideStep::text))
            .with_tools(
                detail
                    .tools
                    .iter()
                    .map(|t| t.text.trim().to_string())
                    .filter(|t| !t.is_empty()),
            );
    }
    result
}

fn guide_hits(response: SearchResponse) -> Vec<SearchHit> {
    response
        .results
        .into_iter()
        .filter(|h| h.data_type.is_empty() || h.data_type.eq_ignore_ascii_case("guide"))
        .filter(|h| !h.title.trim().is_empty() && !h.url.trim().is_empty())
        .take(SEARCH_LIMIT)
        .collect()
}

impl KnowledgeAdapter for IFixitAdapter {
    fn source(&self) -> SourceKind {
        SourceKind::IFixit
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn search(
        &self,
        query: &str,
        item_type: Option<&str>,
    ) -> Result<Vec<SourceResult>, AdapterError> {
        let phrase = search_phrase(query, item_type);
        let mut url = self.url(&["search", &phrase])?;
        url.query_pairs_mut()
            .append_pair("filter", "guide")
            .append_pair("limit", &SEARCH_LIMIT.to_string());

        let response: SearchResponse = self.get_json(url).await?;
        let hits = guide_hits(response);

        let details = join_all(hits.iter().enumerate().map(|(i, hit)| async move {
            match hit.guideid {
                Some(id) if i < DETAIL_LIMIT => self.guide_detail(id).await,
                _ => None,
            }
        }))
        .await;

        Ok(hits
            .into_iter()
            .zip(details)
            .map(|(hit, detail)| to_source_result(&phrase, hit, detail))
            .collect())
    }
}
