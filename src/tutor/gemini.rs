//! Thin client for the Gemini `generateContent` endpoint.
//!
//! One call per [`ModelClient::generate`], asking for `application/json`
//! output. No retries and no client-side timeout: whatever the transport
//! does is what the caller gets.

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use super::prompt::Prompt;
use crate::error::RequestError;

pub const MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const SNIPPET_CHARS: usize = 200;

/// Anything that can turn a prompt into raw model text.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> Result<String, RequestError>;
}

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, api_base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            url: format!(
                "{}/models/{}:generateContent",
                api_base.trim_end_matches('/'),
                MODEL
            ),
        }
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(&self, prompt: &Prompt) -> Result<String, RequestError> {
        let body = GenerateContentRequest::from_prompt(prompt);
        debug!(
            "Calling {} with {} prompt chars, image: {}",
            MODEL,
            prompt.text.len(),
            prompt.image.is_some()
        );

        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RequestError::HttpStatus {
                status,
                snippet: text.trim().chars().take(SNIPPET_CHARS).collect(),
            });
        }

        let payload: GenerateContentResponse = response.json().await?;
        let text = payload.into_text()?;
        debug!("{} answered with {} chars", MODEL, text.len());
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    fn from_prompt(prompt: &Prompt) -> Self {
        let mut parts = vec![Part::Text {
            text: prompt.text.clone(),
        }];
        if let Some(image) = &prompt.image {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.data.clone(),
                },
            });
        }

        Self {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    fn into_text(self) -> Result<String, RequestError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(RequestError::Blocked(reason));
        }

        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.is_empty() {
            Err(RequestError::EmptyResponse)
        } else {
            Ok(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}
