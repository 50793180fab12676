use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
// Use the interfaces crate for core types
pub use interfaces::defs::{
    Candidate, EnrichedCandidate, InterestProfile, Notification, RejectionEntry, SeenRecord,
    Verdict,
};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Repo-Scout/1.0".to_string(),
            timeout_seconds: 30,
            max_retries: 2,
            retry_delay_seconds: 2,
        }
    }
}

/// What the pipeline asks the search index for on each run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Lower bound (exclusive) on creation time.
    pub since: DateTime<Utc>,
    /// OR-combined; empty matches everything.
    pub keywords: Vec<String>,
    pub max_results: usize,
    pub min_stars: u64,
}

/// Raw hits from a search index.
///
/// `keywords_applied` tells the pipeline whether the index already matched
/// the keyword group itself (including README bodies). When it did not,
/// keywords are matched locally once README excerpts are attached.
#[derive(Debug, Clone, Default)]
pub struct SearchHits {
    pub items: Vec<Candidate>,
    pub keywords_applied: bool,
}

/// Counts for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub fetched: usize,
    pub already_seen: usize,
    pub enriched: usize,
    pub missing_excerpt: usize,
    /// Dropped after enrichment by the local keyword check.
    pub keyword_mismatches: usize,
    pub evaluated: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub backend_failures: usize,
    pub delivery_failures: usize,
    pub rejection_log_failures: usize,
    pub newly_seen: usize,
    pub dry_run: bool,
}

impl RunReport {
    /// Candidates that actually went through evaluation this run.
    pub fn processed(&self) -> usize {
        self.enriched - self.keyword_mismatches
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScoutError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Search index returned malformed data: {0}")]
    Malformed(String),

    #[error("Search index unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScoutError>;
