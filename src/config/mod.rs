use garde::Validate;
use serde::Deserialize;

use crate::models::item::ContentKind;
use crate::models::metadata::ADOBE_STOCK_CATEGORIES;
use crate::models::settings::{GenerationSettings, DEFAULT_KEYWORD_COUNT, DEFAULT_TITLE_LENGTH};
use crate::services::credentials::parse_api_keys;
use crate::services::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Gemini API keys, separated by commas or newlines. Requests may supply
    /// their own instead.
    #[serde(default)]
    pub gemini_api_keys: Option<String>,

    #[serde(default = "default_model")]
    pub gemini_model: String,

    #[serde(default = "default_base_url")]
    pub gemini_base_url: String,

    #[serde(default = "default_content_type")]
    pub content_type: ContentKind,

    #[serde(default = "default_title_length")]
    pub title_length: u32,

    #[serde(default = "default_keyword_count")]
    pub keyword_count: u32,

    /// Comma-separated override for the category list.
    #[serde(default)]
    pub categories: Option<String>,

    /// Cap on items processed at once. Unset means no cap.
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    /// Request body limit for uploads, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Dispatch rounds the batch CLI runs before giving up on failed items.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_content_type() -> ContentKind {
    ContentKind::Image
}

fn default_title_length() -> u32 {
    DEFAULT_TITLE_LENGTH
}

fn default_keyword_count() -> u32 {
    DEFAULT_KEYWORD_COUNT
}

fn default_max_upload_bytes() -> usize {
    100 * 1024 * 1024
}

fn default_max_rounds() -> u32 {
    3
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn api_keys(&self) -> Vec<String> {
        self.gemini_api_keys
            .as_deref()
            .map(parse_api_keys)
            .unwrap_or_default()
    }

    /// Generation settings seeded from the environment.
    pub fn generation_settings(&self) -> GenerationSettings {
        let categories = self
            .categories
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| ADOBE_STOCK_CATEGORIES.iter().map(|c| c.to_string()).collect());

        GenerationSettings {
            content_type: self.content_type,
            title_length: self.title_length,
            keyword_count: self.keyword_count,
            categories,
        }
    }

    /// [`Self::generation_settings`], rejected if a value is out of range.
    pub fn validated_settings(&self) -> Result<GenerationSettings, garde::Report> {
        let settings = self.generation_settings();
        settings.validate()?;
        Ok(settings)
    }
}
