use crate::traits::ExcerptSource;
use crate::types::{Candidate, EnrichedCandidate};
use crate::utils::text::truncate_chars;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Attaches README excerpts to candidates.
///
/// At most `max_concurrency` retrievals are in flight at once, and a slow one
/// never holds a free slot. Results are put back in input order at the end.
/// A failed retrieval leaves that candidate without an excerpt and never
/// affects the others.
pub struct Enricher {
    source: Arc<dyn ExcerptSource>,
    max_chars: usize,
    max_concurrency: usize,
}

impl Enricher {
    pub fn new(source: Arc<dyn ExcerptSource>, max_chars: usize, max_concurrency: usize) -> Self {
        Self {
            source,
            max_chars,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub async fn enrich(&self, candidates: Vec<Candidate>) -> Vec<EnrichedCandidate> {
        if candidates.is_empty() {
            return Vec::new();
        }

        info!(
            "Fetching READMEs for {} repos (max {} concurrent)",
            candidates.len(),
            self.max_concurrency
        );

        let mut indexed: Vec<(usize, EnrichedCandidate)> =
            stream::iter(candidates.into_iter().enumerate())
                .map(|(index, candidate)| async move { (index, self.enrich_one(candidate).await) })
                .buffer_unordered(self.max_concurrency)
                .collect()
                .await;
        indexed.sort_by_key(|(index, _)| *index);
        let enriched: Vec<EnrichedCandidate> = indexed.into_iter().map(|(_, e)| e).collect();

        let missing = enriched.iter().filter(|e| e.excerpt.is_none()).count();
        info!("Enrichment finished: {} with excerpt, {} without", enriched.len() - missing, missing);

        enriched
    }

    async fn enrich_one(&self, candidate: Candidate) -> EnrichedCandidate {
        let excerpt = match self.source.fetch_excerpt(&candidate.full_name).await {
            Ok(Some(text)) => Some(truncate_chars(&text, self.max_chars)),
            Ok(None) => {
                debug!("No README for {}", candidate.full_name);
                None
            }
            Err(e) => {
                warn!("README retrieval failed for {}: {}", candidate.full_name, e);
                None
            }
        };

        EnrichedCandidate::new(candidate, excerpt)
    }
}
