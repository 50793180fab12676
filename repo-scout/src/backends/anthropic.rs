use super::{base_url, http_client, missing_text, send_json, MAX_OUTPUT_TOKENS};
use crate::llm_adapter::{parse_verdict, render_request, BackendConfig, BackendError, JudgmentBackend, SYSTEM_PROMPT};
use crate::types::{EnrichedCandidate, InterestProfile, Verdict};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Messages endpoint.
pub struct AnthropicBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        Ok(Self {
            client: http_client(config)?,
            api_key: config.api_key.clone(),
            model: config.model().to_string(),
            base_url: base_url(config, DEFAULT_BASE_URL)?,
        })
    }

    fn request_body<'a>(&'a self, user_message: &'a str) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            max_tokens: MAX_OUTPUT_TOKENS,
            system: SYSTEM_PROMPT,
            messages: vec![Message { role: "user", content: user_message }],
        }
    }
}

fn reply_text(response: MessagesResponse) -> Option<String> {
    response
        .content
        .into_iter()
        .find(|block| block.kind == "text")
        .and_then(|block| block.text)
}

#[async_trait]
impl JudgmentBackend for AnthropicBackend {
    fn backend_name(&self) -> String {
        format!("anthropic ({})", self.model)
    }

    async fn evaluate(
        &self,
        candidate: &EnrichedCandidate,
        profile: &InterestProfile,
    ) -> Result<Verdict, BackendError> {
        let name = self.backend_name();
        let user_message = render_request(candidate, profile);
        let request = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.request_body(&user_message));

        let response: MessagesResponse = send_json(&name, request).await?;
        let text = reply_text(response).ok_or_else(|| missing_text(&name))?;
        parse_verdict(&name, &text)
    }
}
