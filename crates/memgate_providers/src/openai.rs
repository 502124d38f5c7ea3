use crate::{ChatMessage, Provider, ProviderError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

pub struct OpenAiCompatProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self { client: Client::new(), base_url: base_url.into(), api_key, model: model.into() }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    async fn generate(&self, system_prompt: &str, user_query: &str) -> Result<String, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system".into(), content: system_prompt.to_string() },
                ChatMessage { role: "user".into(), content: user_query.to_string() },
            ],
        };

        let mut req = self.client.post(url).json(&body);
        if let Some(key) = &self.api_key {
            if !key.is_empty() {
                req = req.bearer_auth(key);
            }
        }
        let resp = req.send().await?;
        let raw: Value = resp.json().await?;

        raw.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c0| c0.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| ProviderError::InvalidResponse("missing choices[0].message.content".into()))
    }
}
