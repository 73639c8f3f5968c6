//! Result ranking.
//!
//! Score = weighted sum of the source's fixed priority weight and the
//! result's own confidence. Ties fall back to lower latency, then to the
//! normalized link so the order never depends on arrival order.

use std::cmp::Ordering;

use fixwise_types::source::SourceResult;

use super::dedup::normalize_link;

/// Share of the score that comes from source priority.
pub const PRIORITY_WEIGHT: f64 = 0.4;

/// Ranking score in [0, 1].
pub fn rank_score(result: &SourceResult) -> f64 {
    PRIORITY_WEIGHT * result.source.weight() + (1.0 - PRIORITY_WEIGHT) * result.confidence
}

/// Total order: best result first.
pub fn compare(a: &SourceResult, b: &SourceResult) -> Ordering {
    rank_score(b)
        .total_cmp(&rank_score(a))
        .then_with(|| a.latency_ms.cmp(&b.latency_ms))
        .then_with(|| a.source.priority().cmp(&b.source.priority()))
        .then_with(|| normalize_link(&a.link).cmp(&normalize_link(&b.link)))
        .then_with(|| a.title.cmp(&b.title))
}

/// Sort results best first.
pub fn rank(results: &mut [SourceResult]) {
    results.sort_by(compare);
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixwise_types::source::SourceKind;

    fn hit(source: SourceKind, link: &str, confidence: f64, latency_ms: u64) -> SourceResult {
        SourceResult::found(source, link, link)
            .with_confidence(confidence)
            .with_latency_ms(latency_ms)
    }

    #[test]
    fn repair_guides_outrank_web_search_at_equal_confidence() {
        let mut results = vec![
            hit(SourceKind::WebSearch, "https://web", 0.7, 10),
            hit(SourceKind::IFixit, "https://ifixit", 0.7, 900),
        ];
        rank(&mut results);
        assert_eq!(results[0].source, SourceKind::IFixit);
    }

    #[test]
    fn much_higher_confidence_beats_priority() {
        let mut results = vec![
            hit(SourceKind::IFixit, "https://ifixit", 0.1, 10),
            hit(SourceKind::WebSearch, "https://web", 0.95, 10),
        ];
        rank(&mut results);
        assert_eq!(results[0].source, SourceKind::WebSearch);
    }

    #[test]
    fn ties_broken_by_latency() {
        let mut results = vec![
            hit(SourceKind::Manual, "https://slow", 0.6, 500),
            hit(SourceKind::Manual, "https://fast", 0.6, 50),
        ];
        rank(&mut results);
        assert_eq!(results[0].link, "https://fast");
    }

    #[test]
    fn order_is_independent_of_input_order() {
        let a = hit(SourceKind::WikiHow, "https://a", 0.5, 100);
        let b = hit(SourceKind::WikiHow, "https://b", 0.5, 100);
        let mut one = vec![a.clone(), b.clone()];
        let mut two = vec![b, a];
        rank(&mut one);
        rank(&mut two);
        assert_eq!(one[0].link, two[0].link);
    }
}
