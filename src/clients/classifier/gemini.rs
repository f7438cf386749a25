/// HTTP backend speaking the Gemini `generateContent` wire format.
use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ClassifierBackend, ClassifierError, truncate_error_message};

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
    /// Sent in the `x-goog-api-key` header, never in the URL.
    pub api_key: String,
    pub call_timeout: Duration,
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Clone)]
pub struct GeminiBackend {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl GeminiBackend {
    /// # Errors
    /// Fails when the base URL is invalid or the HTTP client cannot be built.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.call_timeout)
            .build()
            .context("failed to build classifier HTTP client")?;

        let base_url = Url::parse(&config.base_url).context("invalid classifier base URL")?;
        let endpoint = base_url
            .join(&format!("v1beta/models/{}:generateContent", config.model))
            .context("failed to build generateContent URL")?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key,
        })
    }
}

#[async_trait]
impl ClassifierBackend for GeminiBackend {
    async fn complete(&self, prompt: &str) -> Result<String, ClassifierError> {
        let request = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&request)
            .send()
            .await
            .map_err(|error| {
                let error = error.without_url();
                if error.is_timeout() {
                    ClassifierError::Transport(format!("request timed out: {error}"))
                } else {
                    ClassifierError::Transport(error.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body: truncate_error_message(&body),
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|error| ClassifierError::Malformed(error.without_url().to_string()))?;

        let text = body
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .filter_map(|part| part.text)
            .collect::<Vec<_>>()
            .join("");

        debug!(chars = text.len(), "classifier backend replied");

        if text.trim().is_empty() {
            return Err(ClassifierError::Malformed(
                "response carried no candidate text".to_string(),
            ));
        }
        Ok(text)
    }
}
