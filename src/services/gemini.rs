use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::services::credentials::Credential;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// One structured-generation call: an encoded payload plus instructions.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    /// Base64-encoded file bytes.
    pub data: &'a str,
    pub mime_type: &'a str,
    pub prompt: &'a str,
    pub response_schema: &'a serde_json::Value,
}

/// Anything that can turn a [`GenerationRequest`] into JSON text.
#[async_trait]
pub trait MetadataClient: Send + Sync {
    /// Returns the raw JSON text of the model's answer.
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError>;
}

/// Builds one client per credential. The credential pool caches the result.
pub trait ClientFactory: Send + Sync {
    fn create(&self, credential: &Credential) -> Arc<dyn MetadataClient>;
}

/// Schema for the three fields consumed downstream.
pub fn metadata_response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "keywords": { "type": "ARRAY", "items": { "type": "STRING" } },
            "category": { "type": "STRING" }
        },
        "required": ["title", "keywords", "category"]
    })
}

/// Client for the Gemini `generateContent` REST endpoint, bound to one API key.
pub struct GeminiClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: GeminiContent<'a>,
    generation_config: GeminiGenerationConfig<'a>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeminiPart<'a> {
    InlineData { inline_data: GeminiInlineData<'a> },
    Text { text: &'a str },
}

#[derive(Serialize)]
struct GeminiInlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig<'a> {
    response_mime_type: &'a str,
    response_schema: &'a serde_json::Value,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(http: Client, base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl MetadataClient for GeminiClient {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError> {
        let body = GenerateContentRequest {
            contents: GeminiContent {
                parts: vec![
                    GeminiPart::InlineData {
                        inline_data: GeminiInlineData {
                            mime_type: request.mime_type,
                            data: request.data,
                        },
                    },
                    GeminiPart::Text {
                        text: request.prompt,
                    },
                ],
            },
            generation_config: GeminiGenerationConfig {
                response_mime_type: "application/json",
                response_schema: request.response_schema,
            },
        };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().find_map(|p| p.text))
            .ok_or(GenerationError::EmptyResponse)
    }
}

/// Creates [`GeminiClient`]s sharing one HTTP connection pool.
#[derive(Clone)]
pub struct GeminiClientFactory {
    http: Client,
    base_url: String,
    model: String,
}

impl GeminiClientFactory {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.to_string(),
            model: model.to_string(),
        }
    }
}

impl ClientFactory for GeminiClientFactory {
    fn create(&self, credential: &Credential) -> Arc<dyn MetadataClient> {
        Arc::new(GeminiClient::new(
            self.http.clone(),
            &self.base_url,
            &self.model,
            credential.expose(),
        ))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gemini API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Gemini returned no text content")]
    EmptyResponse,
}
