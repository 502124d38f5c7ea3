use crate::{Provider, ProviderError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// Gemini's REST base URLs must end in the versioned endpoint segment.
pub const GEMINI_VERSION_SEGMENT: &str = "v1beta";

pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: normalize_gemini_base_url(&base_url.into()),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

/// Ensure the base URL ends with the versioned endpoint path, joining it
/// once rather than duplicating it if already present.
pub fn normalize_gemini_base_url(base: &str) -> String {
    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with(GEMINI_VERSION_SEGMENT) {
        trimmed.to_string()
    } else {
        format!("{trimmed}/{GEMINI_VERSION_SEGMENT}")
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    async fn generate(&self, system_prompt: &str, user_query: &str) -> Result<String, ProviderError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url.trim_end_matches('/'),
            self.model,
            self.api_key
        );

        let body = json!({
            "system_instruction": { "parts": [{ "text": system_prompt }] },
            "contents": [{ "parts": [{ "text": user_query }] }],
        });

        let resp = self.client.post(url).json(&body).send().await?;
        let raw: Value = resp.json().await?;

        raw.get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c0| c0.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p0| p0.get("text"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| ProviderError::InvalidResponse("missing candidates[0].content.parts[0].text".into()))
    }
}
