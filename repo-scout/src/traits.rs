use crate::sinks::SinkError;
use crate::types::{Notification, Result, SearchHits, SearchQuery};
use async_trait::async_trait;

/// Trait for pulling candidate repositories from a search index
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Human-readable name for this source
    fn source_name(&self) -> String;

    /// Run the query against the index.
    /// Any error here is fatal for the run; partial hit lists are never returned.
    async fn search(&self, query: &SearchQuery) -> Result<SearchHits>;
}

/// Trait for retrieving supplementary text (e.g. a README) for one candidate
#[async_trait]
pub trait ExcerptSource: Send + Sync {
    /// `Ok(None)` means the candidate has no supplementary text.
    async fn fetch_excerpt(&self, full_name: &str) -> Result<Option<String>>;
}

/// Destination for accepted candidates
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn sink_name(&self) -> String;

    /// Announce the run's totals before any candidates are delivered.
    async fn send_summary(&self, matched: usize, processed: usize) -> std::result::Result<(), SinkError>;

    /// Deliver one group of accepted candidates.
    async fn deliver(&self, batch: &[Notification]) -> std::result::Result<(), SinkError>;
}
