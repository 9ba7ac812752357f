//! OpenAI moderation endpoint client

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::{ModerationError, ModerationResult, Moderator};
use crate::core::stt::openai::OPENAI_API_BASE;
use crate::core::stt::openai::messages::describe_error;

pub const DEFAULT_MODERATION_MODEL: &str = "omni-moderation-latest";

#[derive(Debug, Serialize)]
struct ModerationRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct ModerationResponse {
    #[serde(default)]
    results: Vec<ModerationEntry>,
}

#[derive(Debug, Deserialize)]
struct ModerationEntry {
    flagged: bool,
    #[serde(default)]
    categories: BTreeMap<String, bool>,
}

/// Classifies text with `POST {base}/moderations`.
pub struct OpenAIModerator {
    http_client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIModerator {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ModerationError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ModerationError::Configuration(
                "API key is required".to_string(),
            ));
        }

        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                ModerationError::Configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            http_client,
            api_key,
            base_url: OPENAI_API_BASE.to_string(),
            model: DEFAULT_MODERATION_MODEL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl Drop for OpenAIModerator {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

#[async_trait]
impl Moderator for OpenAIModerator {
    async fn classify(&self, text: &str) -> Result<ModerationResult, ModerationError> {
        let response = self
            .http_client
            .post(format!("{}/moderations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&ModerationRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await
            .map_err(|e| ModerationError::Network(format!("Request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ModerationError::Network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(ModerationError::Provider {
                status: status.as_u16(),
                message: describe_error(status, &body),
            });
        }

        let parsed: ModerationResponse = serde_json::from_str(&body)
            .map_err(|e| ModerationError::InvalidResponse(e.to_string()))?;
        let entry = parsed
            .results
            .into_iter()
            .next()
            .ok_or_else(|| ModerationError::InvalidResponse("no results".to_string()))?;

        Ok(ModerationResult {
            flagged: entry.flagged,
            categories: entry
                .categories
                .into_iter()
                .filter_map(|(name, hit)| hit.then_some(name))
                .collect(),
        })
    }
}
