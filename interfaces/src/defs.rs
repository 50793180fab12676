use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A repository surfaced by the search index, before enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// `owner/name`, unique within a run.
    pub full_name: String,
    pub url: String,
    pub description: String,
    pub stars: u64,
    pub language: String,
    pub topics: Vec<String>,
    pub is_fork: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedCandidate {
    pub candidate: Candidate,
    /// Leading slice of the README; `None` when retrieval failed or there is none.
    pub excerpt: Option<String>,
}

impl EnrichedCandidate {
    pub fn new(candidate: Candidate, excerpt: Option<String>) -> Self {
        Self { candidate, excerpt }
    }

    pub fn full_name(&self) -> &str {
        &self.candidate.full_name
    }
}

/// The user's natural-language interests. Passed to backends verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestProfile {
    pub uri: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub interested: bool,
    pub reason: String,
}

impl Verdict {
    pub fn accept(reason: impl Into<String>) -> Self {
        Self {
            interested: true,
            reason: reason.into(),
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            interested: false,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenRecord {
    pub full_name: String,
    pub first_seen: DateTime<Utc>,
}

/// Payload handed to a notification sink for one accepted candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub full_name: String,
    pub url: String,
    pub stars: u64,
    pub description: String,
    pub language: String,
    pub topics: Vec<String>,
    pub reason: String,
}

impl Notification {
    pub fn new(enriched: &EnrichedCandidate, verdict: &Verdict) -> Self {
        let candidate = &enriched.candidate;
        Self {
            full_name: candidate.full_name.clone(),
            url: candidate.url.clone(),
            stars: candidate.stars,
            description: candidate.description.clone(),
            language: candidate.language.clone(),
            topics: candidate.topics.clone(),
            reason: verdict.reason.clone(),
        }
    }
}

/// One record of the rejection log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionEntry {
    pub timestamp: DateTime<Utc>,
    pub full_name: String,
    pub url: String,
    pub stars: u64,
    pub description: String,
    pub language: String,
    pub topics: Vec<String>,
    pub reason: String,
}

impl RejectionEntry {
    pub fn new(enriched: &EnrichedCandidate, verdict: &Verdict, timestamp: DateTime<Utc>) -> Self {
        let candidate = &enriched.candidate;
        Self {
            timestamp,
            full_name: candidate.full_name.clone(),
            url: candidate.url.clone(),
            stars: candidate.stars,
            description: candidate.description.clone(),
            language: candidate.language.clone(),
            topics: candidate.topics.clone(),
            reason: verdict.reason.clone(),
        }
    }
}

// Object style note:
// These are plain data carriers shared between the pipeline and anything
// that wants to replay or inspect a run. Behaviour lives in repo-scout;
// nothing here talks to the network or the disk.
