//! Generic JSON search endpoint adapter.
//!
//! Backs the manual, WikiHow, retailer and web search sources. Each is a
//! configured endpoint answering `GET {endpoint}?q=...&item_type=...` with
//! `{"results": [{"title", "link"|"url", "summary", "steps", "tools",
//! "confidence"|"score"}]}`. An optional bearer token is read from the
//! environment at startup.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use fixwise_core::capability::KnowledgeAdapter;
use fixwise_types::error::AdapterError;
use fixwise_types::source::{SourceKind, SourceResult};

use super::{ensure_success, map_request_error, relevance, search_phrase};

pub struct JsonSearchAdapter {
    client: reqwest::Client,
    source: SourceKind,
    endpoint: String,
    api_key: Option<SecretString>,
    timeout: Duration,
}

impl JsonSearchAdapter {
    pub fn new(
        client: reqwest::Client,
        source: SourceKind,
        endpoint: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            source,
            endpoint: endpoint.into(),
            api_key,
            timeout,
        }
    }
}

impl std::fmt::Debug for JsonSearchAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSearchAdapter")
            .field("source", &self.source)
            .field("endpoint", &self.endpoint)
            .field("authenticated", &self.api_key.is_some())
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    #[serde(default)]
    title: String,
    #[serde(default, alias = "url")]
    link: String,
    #[serde(default, alias = "snippet")]
    summary: String,
    #[serde(default)]
    steps: Vec<String>,
    #[serde(default)]
    tools: Vec<String>,
    #[serde(default, alias = "score")]
    confidence: Option<f64>,
}

fn to_source_results(source: SourceKind, query: &str, response: SearchResponse) -> Vec<SourceResult> {
    response
        .results
        .into_iter()
        .filter(|e| !e.title.trim().is_empty() && !e.link.trim().is_empty())
        .map(|e| {
            let confidence = e
                .confidence
                .filter(|c| c.is_finite())
                .unwrap_or_else(|| relevance(query, &e.title, &e.summary));
            SourceResult::found(source, e.title.trim(), e.link.trim())
                .with_summary(e.summary.trim())
                .with_steps(e.steps)
                .with_tools(e.tools.into_iter().filter(|t| !t.trim().is_empty()))
                .with_confidence(confidence)
        })
        .collect()
}

impl KnowledgeAdapter for JsonSearchAdapter {
    fn source(&self) -> SourceKind {
        self.source
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
        let mut request = self
            .client
            .get(&self.endpoint)
            .query(&[("q", phrase.as_str())])
            .header("accept", "application/json")
            .timeout(self.timeout);
        if let Some(item) = item_type.filter(|t| !t.trim().is_empty()) {
            request = request.query(&[("item_type", item)]);
        }
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_request_error(e, self.timeout))?;
        let response = ensure_success(response).await?;
        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::InvalidResponse(format!("failed to parse response: {e}")))?;

        Ok(to_source_results(self.source, &phrase, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_accept_link_or_url_and_score_aliases() {
        let body = r#"{"results": [
            {"title": "How to Fix a Blender Base", "url": "https://www.wikihow.com/Fix-a-Blender",
             "snippet": "Glue the crack", "steps": ["Unplug it", " "], "tools": ["epoxy"], "score": 0.7},
            {"title": "Blender Manual", "link": "https://manuals.example/blender.pdf"},
            {"title": "", "link": "https://nowhere.example"}
        ]}"#;
        let response: SearchResponse = serde_json::from_str(body).unwrap();
        let results = to_source_results(SourceKind::WikiHow, "blender base", response);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].link, "https://www.wikihow.com/Fix-a-Blender");
        assert_eq!(results[0].summary, "Glue the crack");
        assert_eq!(results[0].steps, vec!["Unplug it".to_string()]);
        assert!((results[0].confidence - 0.7).abs() < 1e-9);
        assert_eq!(results[1].source, SourceKind::WikiHow);
        assert!(results[1].confidence >= 0.3);
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        let body = r#"{"results": [{"title": "Cord repair", "link": "https://x.example/a", "confidence": 4.2}]}"#;
        let response: SearchResponse = serde_json::from_str(body).unwrap();
        let results = to_source_results(SourceKind::WebSearch, "cord", response);
        assert_eq!(results[0].confidence, 1.0);
    }

    #[test]
    fn empty_body_yields_no_results() {
        let response: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(to_source_results(SourceKind::Manual, "q", response).is_empty());
    }

    #[test]
    fn debug_output_hides_the_key() {
        let adapter = JsonSearchAdapter::new(
            reqwest::Client::new(),
            SourceKind::Retailer,
            "https://search.example/retail",
            Some(SecretString::from("sk-secret".to_string())),
            Duration::from_secs(1),
        );
        let debug = format!("{adapter:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("authenticated: true"));
    }
}
