use super::{base_url, http_client, missing_text, send_json, MAX_OUTPUT_TOKENS, TEMPERATURE};
use crate::llm_adapter::{parse_verdict, render_request, BackendConfig, BackendError, JudgmentBackend, SYSTEM_PROMPT};
use crate::types::{EnrichedCandidate, InterestProfile, Verdict};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: Option<Content>,
}

/// Generative Language `generateContent` endpoint.
///
/// This API has no separate system role in the basic request shape, so the
/// instructions are prepended to the user message.
pub struct GoogleBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GoogleBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        Ok(Self {
            client: http_client(config)?,
            api_key: config.api_key.clone(),
            model: config.model().to_string(),
            base_url: base_url(config, DEFAULT_BASE_URL)?,
        })
    }

    fn request_body(&self, user_message: &str) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(format!("{}\n\n{}", SYSTEM_PROMPT, user_message)),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        }
    }
}

fn reply_text(response: GenerateResponse) -> Option<String> {
    let parts = response.candidates.into_iter().next()?.content?.parts;
    let text: String = parts.into_iter().filter_map(|p| p.text).collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl JudgmentBackend for GoogleBackend {
    fn backend_name(&self) -> String {
        format!("google ({})", self.model)
    }

    async fn evaluate(
        &self,
        candidate: &EnrichedCandidate,
        profile: &InterestProfile,
    ) -> Result<Verdict, BackendError> {
        let name = self.backend_name();
        let user_message = render_request(candidate, profile);
        // Key goes in a header so it never shows up in URLs or error messages.
        let request = self
            .client
            .post(format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(&user_message));

        let response: GenerateResponse = send_json(&name, request).await?;
        let text = reply_text(response).ok_or_else(|| missing_text(&name))?;
        parse_verdict(&name, &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_adapter::BackendKind;

    #[test]
    fn body_prepends_instructions() {
        let backend = GoogleBackend::new(&BackendConfig {
            provider: BackendKind::Google,
            model: None,
            api_key: "k".to_string(),
            base_url: None,
            timeout_seconds: 5,
        })
        .unwrap();
        let body = serde_json::to_value(backend.request_body("profile")).unwrap();
        let text = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("You are a GitHub project evaluator."));
        assert!(text.ends_with("\n\nprofile"));
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 150);
    }

    #[test]
    fn joins_candidate_parts() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "{\"interested\": "}, {"text": "true}"}], "role": "model"}}]}"#,
        )
        .unwrap();
        assert_eq!(reply_text(response).as_deref(), Some("{\"interested\": true}"));

        let blocked: GenerateResponse =
            serde_json::from_str(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#).unwrap();
        assert_eq!(reply_text(blocked), None);
    }
}
