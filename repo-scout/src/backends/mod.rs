pub mod anthropic;
pub mod google;
pub mod openai;

pub use anthropic::AnthropicBackend;
pub use google::GoogleBackend;
pub use openai::OpenAiBackend;

use crate::llm_adapter::{BackendConfig, BackendError};
use crate::utils::text::preview;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Replies are one JSON sentence; this caps spend per call.
pub(crate) const MAX_OUTPUT_TOKENS: u32 = 150;
pub(crate) const TEMPERATURE: f32 = 0.1;

pub(crate) fn http_client(config: &BackendConfig) -> Result<Client, BackendError> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .build()
        .map_err(|e| BackendError::Config(format!("failed to build HTTP client: {}", e)))
}

pub(crate) fn base_url(config: &BackendConfig, default: &str) -> Result<String, BackendError> {
    let raw = config.base_url.as_deref().filter(|u| !u.is_empty()).unwrap_or(default);
    let parsed = url::Url::parse(raw)
        .map_err(|e| BackendError::Config(format!("invalid base_url '{}': {}", raw, e)))?;
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

/// Send a prepared request and decode the JSON body.
///
/// Transport failures and timeouts become `Unavailable`, non-2xx statuses
/// become `Status`, and undecodable bodies become `Malformed`.
pub(crate) async fn send_json<T: DeserializeOwned>(
    backend: &str,
    request: RequestBuilder,
) -> Result<T, BackendError> {
    let unavailable = |e: reqwest::Error| BackendError::Unavailable {
        backend: backend.to_string(),
        message: e.without_url().to_string(),
    };

    let response = request.send().await.map_err(unavailable)?;
    let status = response.status();
    let body = response.text().await.map_err(unavailable)?;

    debug!("{} responded with HTTP {} ({} bytes)", backend, status.as_u16(), body.len());

    if !status.is_success() {
        return Err(BackendError::Status {
            backend: backend.to_string(),
            status: status.as_u16(),
            body: preview(&body, 200),
        });
    }

    serde_json::from_str(&body).map_err(|e| BackendError::Malformed {
        backend: backend.to_string(),
        message: format!("unexpected response shape: {}", e),
    })
}

pub(crate) fn missing_text(backend: &str) -> BackendError {
    BackendError::Malformed {
        backend: backend.to_string(),
        message: "response contained no text".to_string(),
    }
}
