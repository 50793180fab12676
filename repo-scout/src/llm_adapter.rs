use crate::backends::{AnthropicBackend, GoogleBackend, OpenAiBackend};
use crate::types::{EnrichedCandidate, InterestProfile, Verdict};
use crate::utils::text::{preview, strip_code_fence};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Trait for the external reasoning services that judge candidates
///
/// Every implementation returns exactly one verdict per call or a
/// `BackendError`. Implementations never retry on their own; the only limit
/// they enforce is the per-request timeout.
#[async_trait]
pub trait JudgmentBackend: Send + Sync {
    /// Get the name of this backend
    fn backend_name(&self) -> String;

    async fn evaluate(
        &self,
        candidate: &EnrichedCandidate,
        profile: &InterestProfile,
    ) -> Result<Verdict, BackendError>;
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{backend} unavailable: {message}")]
    Unavailable { backend: String, message: String },

    #[error("{backend} returned HTTP {status}: {body}")]
    Status {
        backend: String,
        status: u16,
        body: String,
    },

    #[error("{backend} reply could not be parsed: {message}")]
    Malformed { backend: String, message: String },

    #[error("Backend configuration error: {0}")]
    Config(String),
}

impl BackendError {
    /// Worth another attempt: transport failures, rate limits and server errors.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Unavailable { .. } => true,
            BackendError::Status { status, .. } => *status == 429 || *status >= 500,
            BackendError::Malformed { .. } | BackendError::Config(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    OpenAi,
    Anthropic,
    Google,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [BackendKind::OpenAi, BackendKind::Anthropic, BackendKind::Google];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::OpenAi => "openai",
            BackendKind::Anthropic => "anthropic",
            BackendKind::Google => "google",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            BackendKind::OpenAi => "gpt-4o-mini",
            BackendKind::Anthropic => "claude-3-haiku-20240307",
            BackendKind::Google => "gemini-1.5-flash",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| {
                let available: Vec<&str> = BackendKind::ALL.iter().map(|k| k.as_str()).collect();
                BackendError::Config(format!("Unknown provider: {}. Available: {}", s, available.join(", ")))
            })
    }
}

/// The `llm` section of the configuration file.
#[derive(Clone, Deserialize)]
pub struct BackendConfig {
    pub provider: BackendKind,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: String,
    /// Override the service endpoint (proxies, gateways, tests).
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    30
}

impl BackendConfig {
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.provider.default_model())
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("provider", &self.provider)
            .field("model", &self.model())
            .field("api_key", &if self.api_key.is_empty() { "<empty>" } else { "<redacted>" })
            .field("base_url", &self.base_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Build the backend named in the configuration.
pub fn create_backend(config: &BackendConfig) -> Result<Arc<dyn JudgmentBackend>, BackendError> {
    if config.api_key.trim().is_empty() {
        return Err(BackendError::Config(format!("no API key configured for {}", config.provider)));
    }

    let backend: Arc<dyn JudgmentBackend> = match config.provider {
        BackendKind::OpenAi => Arc::new(OpenAiBackend::new(config)?),
        BackendKind::Anthropic => Arc::new(AnthropicBackend::new(config)?),
        BackendKind::Google => Arc::new(GoogleBackend::new(config)?),
    };

    info!("Using judgment backend: {}", backend.backend_name());
    Ok(backend)
}

pub const SYSTEM_PROMPT: &str = r#"You are a GitHub project evaluator. Given a user's interests and a project's metadata, decide if this project would interest them.

Respond ONLY with valid JSON in this exact format:
{"interested": true, "reason": "one sentence explanation"}

or

{"interested": false, "reason": "one sentence explanation"}"#;

/// The user message every backend sends: the profile followed by the project summary.
pub fn render_request(candidate: &EnrichedCandidate, profile: &InterestProfile) -> String {
    let repo = &candidate.candidate;
    let topics = if repo.topics.is_empty() {
        "none".to_string()
    } else {
        repo.topics.join(", ")
    };
    let excerpt = candidate
        .excerpt
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or("none");

    format!(
        "User interests:\n{}\n\nProject:\n- Name: {}\n- Description: {}\n- Language: {}\n- Topics: {}\n- Stars: {}\n- README excerpt: {}",
        profile.text, repo.full_name, repo.description, repo.language, topics, repo.stars, excerpt
    )
}

#[derive(Deserialize)]
struct VerdictReply {
    interested: bool,
    #[serde(default)]
    reason: Option<String>,
}

/// Parse a backend's reply text into a verdict.
///
/// Code fences are tolerated. A reply without a boolean `interested` field
/// is malformed; it never becomes a silent rejection.
pub fn parse_verdict(backend: &str, text: &str) -> Result<Verdict, BackendError> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(BackendError::Malformed {
            backend: backend.to_string(),
            message: "empty response".to_string(),
        });
    }

    let reply: VerdictReply = serde_json::from_str(body).map_err(|e| BackendError::Malformed {
        backend: backend.to_string(),
        message: format!("{}: {}", e, preview(body, 200)),
    })?;

    let reason = reply
        .reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "No reason provided".to_string());

    Ok(Verdict {
        interested: reply.interested,
        reason,
    })
}
