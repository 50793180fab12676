use crate::types::{FetchConfig, Result, ScoutError};
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// JSON-over-HTTP client for the search index, with retry on transient failures.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig, token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static("2022-11-28"));
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ScoutError::Config("GitHub token contains invalid characters".to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self { client, config })
    }

    fn backoff(&self) -> ExponentialBackoff<backoff::SystemClock> {
        ExponentialBackoff {
            current_interval: Duration::from_secs(self.config.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.config.retry_delay_seconds),
            max_interval: Duration::from_secs(self.config.retry_delay_seconds * 32),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(self.config.retry_delay_seconds * 60)),
            ..Default::default()
        }
    }

    /// GET `url` and decode the body as JSON.
    ///
    /// Returns `Ok(None)` on 404. Network errors, 429 and 5xx are retried up to
    /// `max_retries` times; any other non-success status fails immediately.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        let start_time = Instant::now();
        let mut backoff = self.backoff();
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            debug!("GET {} (attempt {})", url, attempt + 1);

            let retryable = match self.client.get(url).query(query).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::NOT_FOUND {
                        return Ok(None);
                    }

                    if status.is_success() {
                        let body = response.text().await?;
                        debug!(
                            "Fetched {} ({} bytes in {} ms)",
                            url,
                            body.len(),
                            start_time.elapsed().as_millis()
                        );
                        return serde_json::from_str(&body)
                            .map(Some)
                            .map_err(|e| ScoutError::Malformed(format!("{}: {}", url, e)));
                    }

                    last_error = Some(ScoutError::SourceUnavailable(format!(
                        "HTTP {}: {}",
                        status.as_u16(),
                        status.canonical_reason().unwrap_or("Unknown")
                    )));
                    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
                }
                Err(e) => {
                    last_error = Some(ScoutError::Http(e));
                    true
                }
            };

            if !retryable || attempt == self.config.max_retries {
                break;
            }

            match backoff.next_backoff() {
                Some(delay) => {
                    warn!("Attempt {} failed for {}, retrying in {:?}", attempt + 1, url, delay);
                    tokio::time::sleep(delay).await;
                }
                None => break,
            }
        }

        Err(last_error.unwrap_or_else(|| ScoutError::SourceUnavailable(format!("{}: unknown error", url))))
    }
}
