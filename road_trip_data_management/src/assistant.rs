use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const TIPS_UNAVAILABLE: &str = "Travel tips are not available right now.";
pub const TIPS_EMPTY: &str = "No tips available.";
pub const TIPS_FAILED: &str = "Could not reach the assistant.";

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Deserialization error: {0}")]
    Deserialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Text,
    Json,
}

/// A text generation backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, format: OutputFormat) -> Result<String, AssistantError>;
}

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    format: OutputFormat,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    text: String,
}

pub struct HttpTextGeneratorParams {
    pub url: String,
}

/// Posts `{prompt, format}` and reads `{text}`.
pub struct HttpTextGenerator {
    client: reqwest::Client,
    url: String,
}

impl HttpTextGenerator {
    pub fn new(params: HttpTextGeneratorParams) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: params.url,
        }
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str, format: OutputFormat) -> Result<String, AssistantError> {
        let response = self
            .client
            .post(&self.url)
            .json(&GenerateRequest { prompt, format })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AssistantError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let response: GenerateResponse = serde_json::from_str(&body)?;
        Ok(response.text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistSuggestion {
    pub text: String,
    pub category: String,
}

/// Trip helpers backed by an optional generator. Every failure degrades to a fallback.
#[derive(Clone, Default)]
pub struct Assistant {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl Assistant {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { generator }
    }

    pub fn from_url(url: Option<&str>) -> Self {
        let generator = url.map(|url| {
            Arc::new(HttpTextGenerator::new(HttpTextGeneratorParams { url: url.to_string() })) as Arc<dyn TextGenerator>
        });
        Self { generator }
    }

    pub fn is_enabled(&self) -> bool {
        self.generator.is_some()
    }

    pub async fn smart_checklist(&self, destination: &str, days: u32) -> Vec<ChecklistSuggestion> {
        let Some(generator) = &self.generator else {
            return Vec::new();
        };

        let prompt = format!(
            "List the essential items to pack for a {} day road trip to {}. \
             Use the categories Clothes, Documents, Car, Hygiene, Electronics and Food. \
             Answer with a JSON array of objects with the fields text and category only.",
            days, destination
        );

        match generator.generate(&prompt, OutputFormat::Json).await {
            Ok(json) => parse_checklist(&json),
            Err(err) => {
                warn!("Checklist generation failed: {}", err);
                Vec::new()
            }
        }
    }

    pub async fn travel_tips(&self, destination: &str) -> String {
        let Some(generator) = &self.generator else {
            return TIPS_UNAVAILABLE.to_string();
        };

        let prompt = format!(
            "Give 3 short and valuable tips for a road trip to {}. Focus on safety or sights along the way.",
            destination
        );

        match generator.generate(&prompt, OutputFormat::Text).await {
            Ok(text) if text.trim().is_empty() => TIPS_EMPTY.to_string(),
            Ok(text) => text,
            Err(err) => {
                warn!("Travel tips failed: {}", err);
                TIPS_FAILED.to_string()
            }
        }
    }
}

/// Items without text are dropped. Anything unparseable gives an empty list.
pub fn parse_checklist(json: &str) -> Vec<ChecklistSuggestion> {
    match serde_json::from_str::<Vec<ChecklistSuggestion>>(json) {
        Ok(items) => items.into_iter().filter(|item| !item.text.trim().is_empty()).collect(),
        Err(err) => {
            debug!("Unparseable checklist response: {}", err);
            Vec::new()
        }
    }
}
