use super::{base_url, http_client, missing_text, send_json, MAX_OUTPUT_TOKENS, TEMPERATURE};
use crate::llm_adapter::{parse_verdict, render_request, BackendConfig, BackendError, JudgmentBackend, SYSTEM_PROMPT};
use crate::types::{EnrichedCandidate, InterestProfile, Verdict};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Chat completions endpoint.
pub struct OpenAiBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        Ok(Self {
            client: http_client(config)?,
            api_key: config.api_key.clone(),
            model: config.model().to_string(),
            base_url: base_url(config, DEFAULT_BASE_URL)?,
        })
    }

    fn request_body<'a>(&'a self, user_message: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: user_message },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_OUTPUT_TOKENS,
        }
    }
}

fn reply_text(response: ChatResponse) -> Option<String> {
    response.choices.into_iter().next().and_then(|c| c.message.content)
}

#[async_trait]
impl JudgmentBackend for OpenAiBackend {
    fn backend_name(&self) -> String {
        format!("openai ({})", self.model)
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
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(&user_message));

        let response: ChatResponse = send_json(&name, request).await?;
        let text = reply_text(response).ok_or_else(|| missing_text(&name))?;
        parse_verdict(&name, &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_adapter::BackendKind;

    fn backend() -> OpenAiBackend {
        OpenAiBackend::new(&BackendConfig {
            provider: BackendKind::OpenAi,
            model: Some("gpt-4o".to_string()),
            api_key: "k".to_string(),
            base_url: Some("http://localhost:8080/v1/".to_string()),
            timeout_seconds: 5,
        })
        .unwrap()
    }

    #[test]
    fn body_carries_system_and_user_messages() {
        let backend = backend();
        let body = serde_json::to_value(backend.request_body("hello")).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["max_tokens"], 150);
        assert_eq!(backend.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn extracts_first_choice() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "{\"interested\": true}"}}]}"#,
        )
        .unwrap();
        assert_eq!(reply_text(response).as_deref(), Some("{\"interested\": true}"));

        let empty: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert_eq!(reply_text(empty), None);

        let null_content: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert_eq!(reply_text(null_content), None);
    }
}
