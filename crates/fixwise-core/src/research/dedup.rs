//! Deduplication of source results.
//!
//! Two results are duplicates when their normalized links are equal
//! (always) or their normalized titles are near-identical by Jaro-Winkler
//! similarity and name the same models. Input is ranked first and the best copy is kept, so the
//! output does not depend on the order results arrived in.

use std::collections::BTreeSet;

use super::ranking;
use fixwise_types::source::SourceResult;

/// Normalize a link for exact-match comparison.
///
/// Drops scheme, `www.`, fragment, tracking query parameters and trailing
/// slashes; lowercases everything.
pub fn normalize_link(link: &str) -> String {
    let mut s = link.trim().to_lowercase();

    for prefix in ["https://", "http://"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.to_string();
            break;
        }
    }
    if let Some(rest) = s.strip_prefix("www.") {
        s = rest.to_string();
    }
    if let Some(idx) = s.find('#') {
        s.truncate(idx);
    }

    if let Some(idx) = s.find('?') {
        let query = s[idx + 1..].to_string();
        s.truncate(idx);
        let kept: Vec<&str> = query
            .split('&')
            .filter(|p| !p.is_empty())
            .filter(|p| !(p.starts_with("utm_") || p.starts_with("ref=") || p.starts_with("fbclid=")))
            .collect();
        if !kept.is_empty() {
            s.push('?');
            s.push_str(&kept.join("&"));
        }
    }

    while s.ends_with('/') {
        s.pop();
    }
    s
}

/// Normalize a title for similarity comparison.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Title words carrying a digit: model numbers, sizes, years.
fn model_tokens(normalized_title: &str) -> BTreeSet<&str> {
    normalized_title
        .split(' ')
        .filter(|w| w.chars().any(|c| c.is_ascii_digit()))
        .collect()
}

fn is_duplicate(a: &SourceResult, b: &SourceResult, title_similarity: f64) -> bool {
    let link_a = normalize_link(&a.link);
    if !link_a.is_empty() && link_a == normalize_link(&b.link) {
        return true;
    }
    let title_a = normalize_title(&a.title);
    let title_b = normalize_title(&b.title);
    if title_a.is_empty() || title_b.is_empty() {
        return false;
    }
    // "iPhone 12" and "iPhone 13" guides differ by one character.
    if model_tokens(&title_a) != model_tokens(&title_b) {
        return false;
    }
    strsim::jaro_winkler(&title_a, &title_b) >= title_similarity
}

/// Collapse duplicates, returning the survivors best first.
///
/// `title_similarity` above 1.0 disables the near-duplicate title check.
pub fn dedup(mut results: Vec<SourceResult>, title_similarity: f64) -> Vec<SourceResult> {
    ranking::rank(&mut results);

    let mut kept: Vec<SourceResult> = Vec::with_capacity(results.len());
    for candidate in results {
        if kept
            .iter()
            .any(|existing| is_duplicate(existing, &candidate, title_similarity))
        {
            continue;
        }
        kept.push(candidate);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixwise_types::source::SourceKind;

    fn hit(source: SourceKind, title: &str, link: &str, confidence: f64) -> SourceResult {
        SourceResult::found(source, title, link).with_confidence(confidence)
    }

    #[test]
    fn normalize_link_strips_noise() {
        assert_eq!(
            normalize_link("HTTPS://www.iFixit.com/Guide/Blender/123/?utm_source=x#step-2"),
            "ifixit.com/guide/blender/123"
        );
        assert_eq!(
            normalize_link("http://example.com/page?id=7&utm_medium=y"),
            "example.com/page?id=7"
        );
    }

    #[test]
    fn normalize_title_drops_punctuation() {
        assert_eq!(normalize_title("  Blender -- Base  Replacement! "), "blender base replacement");
    }

    #[test]
    fn identical_links_collapse_regardless_of_order() {
        let a = hit(SourceKind::IFixit, "Blender base replacement", "https://ifixit.com/g/1", 0.8);
        let b = hit(SourceKind::WebSearch, "Replace a blender base", "http://www.ifixit.com/g/1/", 0.4);

        let forward = dedup(vec![a.clone(), b.clone()], 0.92);
        let backward = dedup(vec![b, a], 0.92);

        assert_eq!(forward.len(), 1);
        assert_eq!(backward.len(), 1);
        assert_eq!(forward[0].id, backward[0].id);
        assert_eq!(forward[0].source, SourceKind::IFixit);
    }

    #[test]
    fn near_duplicate_titles_collapse() {
        let a = hit(SourceKind::WikiHow, "How to Fix a Blender That Won't Turn On", "https://a", 0.6);
        let b = hit(SourceKind::WebSearch, "How to fix a blender that wont turn on", "https://b", 0.6);
        assert_eq!(dedup(vec![a, b], 0.92).len(), 1);
    }

    #[test]
    fn distinct_titles_survive() {
        let a = hit(SourceKind::IFixit, "Blender base replacement", "https://a", 0.6);
        let b = hit(SourceKind::Manual, "Dishwasher pump cleaning", "https://b", 0.6);
        assert_eq!(dedup(vec![a, b], 0.92).len(), 2);
    }

    #[test]
    fn titles_for_different_models_survive() {
        let results = vec![
            hit(SourceKind::IFixit, "iPhone 12 Battery Replacement", "https://g/12", 0.8),
            hit(SourceKind::IFixit, "iPhone 13 Battery Replacement", "https://g/13", 0.8),
            hit(SourceKind::IFixit, "Galaxy S21 Battery Replacement", "https://g/s21", 0.8),
            hit(SourceKind::WikiHow, "KitchenAid KSB1570 Blender Jar Fix", "https://g/ksb", 0.6),
        ];
        assert_eq!(dedup(results, 0.92).len(), 4);
    }

    #[test]
    fn same_model_near_duplicates_still_collapse() {
        let a = hit(SourceKind::IFixit, "iPhone 12 Battery Replacement", "https://a", 0.8);
        let b = hit(SourceKind::WebSearch, "iPhone 12 battery replacement!", "https://b", 0.5);
        assert_eq!(dedup(vec![a, b], 0.92).len(), 1);
    }

    #[test]
    fn title_check_can_be_disabled() {
        let a = hit(SourceKind::WikiHow, "Fix a blender", "https://a", 0.6);
        let b = hit(SourceKind::WebSearch, "Fix a blender", "https://b", 0.6);
        assert_eq!(dedup(vec![a, b], 1.01).len(), 2);
    }
}
