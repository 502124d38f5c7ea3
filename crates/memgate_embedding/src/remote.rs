//! Remote embedding providers.
//!
//! OpenAI-compatible `/embeddings` and Gemini `models/<model>:embedContent`.
//! Both return a raw vector; dimension alignment happens in the caller
//! ([`crate::EmbeddingService::embed`]), never here.

use crate::{EmbeddingError, EmbeddingProvider, EmbeddingProviderKind};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub struct OpenAiCompatProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct OpenAiEmbedRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedDatum>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedDatum {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatProvider {
    async fn embed_raw(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let body = OpenAiEmbedRequest { input: text, model: &self.model };

        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let parsed: OpenAiEmbedResponse = resp.json().await?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::InvalidResponse("missing data[0].embedding".into()))
    }

    fn kind(&self) -> EmbeddingProviderKind {
        EmbeddingProviderKind::OpenAiCompatible
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    output_dimensionality: usize,
}

impl GeminiProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        output_dimensionality: usize,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            output_dimensionality,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    async fn embed_raw(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!(
            "{}/models/{}:embedContent?key={}",
            self.base_url.trim_end_matches('/'),
            self.model,
            self.api_key
        );

        let body = json!({
            "content": { "parts": [{ "text": text }] },
            "outputDimensionality": self.output_dimensionality,
        });

        let resp = self.client.post(url).json(&body).send().await?;
        let raw: serde_json::Value = resp.json().await?;

        raw.get("embedding")
            .and_then(|e| e.get("values"))
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|x| x.as_f64().map(|f| f as f32))
                    .collect::<Vec<f32>>()
            })
            .ok_or_else(|| EmbeddingError::InvalidResponse("missing embedding.values".into()))
    }

    fn kind(&self) -> EmbeddingProviderKind {
        EmbeddingProviderKind::Gemini
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
