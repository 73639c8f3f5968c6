//! HTTP knowledge source adapters.
//!
//! Each adapter implements [`KnowledgeAdapter`](fixwise_core::capability::KnowledgeAdapter)
//! and normalizes its source's response into `SourceResult`s. Transport
//! failures are mapped onto `AdapterError` here so every adapter reports
//! them the same way.

pub mod ifixit;
pub mod json_endpoint;

use std::collections::BTreeSet;
use std::time::Duration;

use secrecy::SecretString;

use fixwise_types::error::AdapterError;

pub use ifixit::IFixitAdapter;
pub use json_endpoint::JsonSearchAdapter;

/// Map a reqwest send/receive failure onto an adapter error.
pub(crate) fn map_request_error(err: reqwest::Error, timeout: Duration) -> AdapterError {
    if err.is_timeout() {
        AdapterError::Timeout {
            after_ms: timeout.as_millis() as u64,
        }
    } else if err.is_decode() {
        AdapterError::InvalidResponse(format!("failed to parse response: {err}"))
    } else {
        AdapterError::Unreachable(format!("HTTP request failed: {err}"))
    }
}

/// Reject non-2xx responses, keeping the status and body in the message.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(200).collect();
    Err(match status.as_u16() {
        401 | 403 => AdapterError::Unreachable(format!("HTTP {status}: authentication rejected")),
        _ => AdapterError::Unreachable(format!("HTTP {status}: {body}")),
    })
}

/// Read an API key from the named environment variable.
///
/// Unset, empty or non-unicode values count as no key.
pub fn api_key_from_env(var: Option<&str>) -> Option<SecretString> {
    let var = var?;
    match std::env::var(var) {
        Ok(val) if !val.trim().is_empty() => Some(SecretString::from(val)),
        _ => None,
    }
}

fn query_terms(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

/// Heuristic relevance of a hit to the query, in `[0.3, 0.9]`.
///
/// Used when a source does not report its own score.
pub(crate) fn relevance(query: &str, title: &str, summary: &str) -> f64 {
    let wanted = query_terms(query);
    if wanted.is_empty() {
        return 0.3;
    }
    let title_terms = query_terms(title);
    let summary_terms = query_terms(summary);
    let matched = wanted
        .iter()
        .map(|w| {
            if title_terms.contains(w) {
                1.0
            } else if summary_terms.contains(w) {
                0.5
            } else {
                0.0
            }
        })
        .sum::<f64>();
    0.3 + 0.6 * (matched / wanted.len() as f64)
}

/// Combine the free-text query with the item type when it adds information.
pub(crate) fn search_phrase(query: &str, item_type: Option<&str>) -> String {
    let query = query.trim();
    match item_type.map(str::trim).filter(|t| !t.is_empty()) {
        Some(item) if !query.to_lowercase().contains(&item.to_lowercase()) => {
            format!("{item} {query}")
        }
        _ => query.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relevance_rewards_title_matches_over_summary_matches() {
        let title_hit = relevance("blender base cracked", "Blender Base Replacement", "");
        let summary_hit = relevance("blender base cracked", "Kitchen guide", "blender base");
        let miss = relevance("blender base cracked", "Toaster lever", "springs");
        assert!(title_hit > summary_hit);
        assert!(summary_hit > miss);
        assert!((miss - 0.3).abs() < 1e-9);
        assert!(title_hit <= 0.9);
    }

    #[test]
    fn relevance_of_empty_query_is_floor() {
        assert!((relevance("", "anything", "") - 0.3).abs() < 1e-9);
    }

    #[test]
    fn search_phrase_prepends_unmentioned_item() {
        assert_eq!(search_phrase("cracked base", Some("Blender")), "Blender cracked base");
        assert_eq!(search_phrase("my blender leaks", Some("blender")), "my blender leaks");
        assert_eq!(search_phrase(" leaks ", None), "leaks");
        assert_eq!(search_phrase("leaks", Some("  ")), "leaks");
    }

    #[test]
    fn api_key_from_unset_var_is_none() {
        assert!(api_key_from_env(None).is_none());
        assert!(api_key_from_env(Some("FIXWISE_TEST_SURELY_UNSET_KEY_9F2")).is_none());
    }
}
