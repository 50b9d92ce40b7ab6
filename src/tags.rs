//! Tag path helpers. A tag is a `/`-delimited hierarchical path such as
//! `"Location/US/California"`; only `/` is structural, everything else
//! (spaces, punctuation) is verbatim segment content.

use ahash::AHashSet;

/// Trims, drops empties, collapses duplicate paths, and sorts.
pub fn normalize(tags: &[String]) -> Vec<String> {
    let mut seen = AHashSet::new();
    let mut result = Vec::new();
    for tag in tags {
        let cleaned = clean_path(tag);
        if cleaned.is_empty() {
            continue;
        }
        if seen.insert(cleaned.clone()) {
            result.push(cleaned);
        }
    }
    result.sort_unstable();
    result
}

/// All proper prefixes of `path` along `/` boundaries:
/// `"A/B/C"` yields `["A", "A/B"]`.
pub fn ancestors(path: &str) -> Vec<String> {
    let segments: Vec<&str> = path.split('/').collect();
    let mut prefixes = Vec::with_capacity(segments.len().saturating_sub(1));
    for end in 1..segments.len() {
        prefixes.push(segments[..end].join("/"));
    }
    prefixes
}

/// Union of every tag in `tags` with all of its ancestor prefixes, sorted.
/// This is the set the search document carries and the set the ledger counts.
pub fn expand(tags: &[String]) -> Vec<String> {
    let mut set = AHashSet::new();
    for tag in tags {
        for prefix in ancestors(tag) {
            set.insert(prefix);
        }
        set.insert(tag.clone());
    }
    let mut result: Vec<String> = set.into_iter().collect();
    result.sort_unstable();
    result
}

fn clean_path(raw: &str) -> String {
    raw.split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
