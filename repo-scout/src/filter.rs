use crate::types::{Candidate, EnrichedCandidate, SearchQuery};
use std::collections::HashSet;
use tracing::debug;

/// OR-combined, case-insensitive substring match over a candidate's text fields.
#[derive(Debug, Clone, Default)]
pub struct KeywordFilter {
    keywords: Vec<String>,
}

impl KeywordFilter {
    pub fn new(keywords: &[String]) -> Self {
        let keywords = keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// True if any keyword occurs in the name, the description, or the supplementary text.
    pub fn matches(&self, candidate: &Candidate, supplementary: Option<&str>) -> bool {
        if self.keywords.is_empty() {
            return true;
        }

        let fields = [
            Some(candidate.full_name.as_str()),
            Some(candidate.description.as_str()),
            supplementary,
        ];

        fields.iter().flatten().any(|field| {
            let field = field.to_lowercase();
            self.keywords.iter().any(|keyword| field.contains(keyword.as_str()))
        })
    }
}

/// Turn raw index hits into the ordered candidate list for a run.
///
/// Forks and candidates below `min_stars` are dropped first. Duplicates keep
/// their first occurrence. The survivors are sorted by stars (descending,
/// stable) and truncated to `max_results`. Keywords are not checked here; see
/// [`retain_keyword_matches`].
pub fn select_candidates(items: Vec<Candidate>, query: &SearchQuery) -> Vec<Candidate> {
    let total = items.len();
    let mut seen = HashSet::new();

    let mut selected: Vec<Candidate> = items
        .into_iter()
        .filter(|c| !c.is_fork)
        .filter(|c| c.stars >= query.min_stars)
        .filter(|c| seen.insert(c.full_name.clone()))
        .collect();

    selected.sort_by(|a, b| b.stars.cmp(&a.stars));
    selected.truncate(query.max_results);

    debug!("Selected {} of {} index hits", selected.len(), total);
    selected
}

/// Keep enriched candidates whose name, description or README excerpt
/// contains at least one keyword. Used when the index could not match
/// keywords itself, so it runs after enrichment.
pub fn retain_keyword_matches(
    enriched: Vec<EnrichedCandidate>,
    keywords: &[String],
) -> Vec<EnrichedCandidate> {
    let filter = KeywordFilter::new(keywords);
    if filter.is_empty() {
        return enriched;
    }

    let total = enriched.len();
    let kept: Vec<EnrichedCandidate> = enriched
        .into_iter()
        .filter(|e| filter.matches(&e.candidate, e.excerpt.as_deref()))
        .collect();

    debug!("{} of {} candidates matched keywords locally", kept.len(), total);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candidate(full_name: &str, stars: u64, is_fork: bool, description: &str) -> Candidate {
        Candidate {
            full_name: full_name.to_string(),
            url: format!("https://github.com/{}", full_name),
            description: description.to_string(),
            stars,
            language: "Rust".to_string(),
            topics: vec![],
            is_fork,
            created_at: Utc::now(),
        }
    }

    fn query(keywords: &[&str], max_results: usize) -> SearchQuery {
        SearchQuery {
            since: Utc::now(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            max_results,
            min_stars: 0,
        }
    }

    fn sample() -> Vec<Candidate> {
        vec![
            candidate("a/x", 50, false, "a terminal emulator"),
            candidate("b/y", 80, true, "kubernetes operator"),
            candidate("c/z", 30, false, "static site generator"),
        ]
    }

    #[test]
    fn empty_keyword_set_matches_everything() {
        let filter = KeywordFilter::new(&[]);
        assert!(filter.matches(&candidate("a/x", 1, false, ""), None));
    }

    #[test]
    fn keyword_match_is_case_insensitive_across_fields() {
        let filter = KeywordFilter::new(&["Tokio".to_string()]);
        assert!(filter.matches(&candidate("rt/TOKIO-utils", 1, false, ""), None));
        assert!(filter.matches(&candidate("a/b", 1, false, "built on tokio"), None));
        assert!(filter.matches(&candidate("a/b", 1, false, ""), Some("Uses TOKIO runtime")));
        assert!(!filter.matches(&candidate("a/b", 1, false, "async-std"), None));
    }

    #[test]
    fn adding_keywords_never_shrinks_matches() {
        let items = sample();
        let narrow = KeywordFilter::new(&["terminal".to_string()]);
        let wide = KeywordFilter::new(&["terminal".to_string(), "static".to_string()]);
        for item in &items {
            if narrow.matches(item, None) {
                assert!(wide.matches(item, None));
            }
        }
        let narrow_count = items.iter().filter(|c| narrow.matches(c, None)).count();
        let wide_count = items.iter().filter(|c| wide.matches(c, None)).count();
        assert!(wide_count >= narrow_count);
    }

    #[test]
    fn forks_are_dropped_before_truncation() {
        let selected = select_candidates(sample(), &query(&[], 1));
        // b/y has the most stars but is a fork, so a/x takes the only slot.
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].full_name, "a/x");
    }

    #[test]
    fn selection_ignores_keywords() {
        let selected = select_candidates(sample(), &query(&["only-in-readme"], 10));
        let names: Vec<_> = selected.iter().map(|c| c.full_name.as_str()).collect();
        assert_eq!(names, vec!["a/x", "c/z"]);
    }

    #[test]
    fn min_stars_and_duplicates() {
        let mut items = sample();
        items.push(candidate("a/x", 50, false, "duplicate"));
        let mut q = query(&[], 10);
        q.min_stars = 40;
        let selected = select_candidates(items, &q);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].description, "a terminal emulator");
    }

    #[test]
    fn keywords_match_readme_excerpt() {
        let enriched = vec![
            EnrichedCandidate::new(candidate("a/x", 50, false, "a terminal emulator"), None),
            EnrichedCandidate::new(
                candidate("c/z", 30, false, "static site generator"),
                Some("Deploys to Kubernetes clusters".to_string()),
            ),
        ];
        let kept = retain_keyword_matches(enriched, &["kubernetes".to_string()]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].full_name(), "c/z");
    }

    #[test]
    fn no_keyword_match_yields_empty_set() {
        let enriched: Vec<_> = select_candidates(sample(), &query(&[], 10))
            .into_iter()
            .map(|c| EnrichedCandidate::new(c, None))
            .collect();
        assert!(retain_keyword_matches(enriched.clone(), &["wasm".to_string()]).is_empty());
        assert_eq!(retain_keyword_matches(enriched, &[]).len(), 2);
    }
}
