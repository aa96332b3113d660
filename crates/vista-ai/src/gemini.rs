//! Gemini backends over the `generateContent` REST endpoint.
//!
//! Two deployments are supported: a split pipeline ([`GeminiVision`] +
//! [`GeminiLanguage`], possibly on different models) and a single
//! [`GeminiMultimodal`] model serving both roles.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::prompt;
use crate::strategy::{LanguageStrategy, Outcome, VisionStrategy};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-flash-latest";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Gemini request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Gemini HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse Gemini response: {0}")]
    Parse(String),

    #[error("Gemini returned no text ({0})")]
    Empty(String),
}

/// Thin client for one API key. Cheap to clone; the HTTP pool is shared.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Text-only generation.
    pub async fn complete(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        self.generate(model, vec![Part::Text(prompt.to_string())]).await
    }

    /// Prompt plus one inline image.
    pub async fn describe(
        &self,
        model: &str,
        prompt: &str,
        image: &[u8],
    ) -> Result<String, GenerationError> {
        let parts = vec![
            Part::Text(prompt.to_string()),
            Part::InlineData(Blob {
                mime_type: sniff_mime_type(image).to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(image),
            }),
        ];
        self.generate(model, parts).await
    }

    async fn generate(&self, model: &str, parts: Vec<Part>) -> Result<String, GenerationError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);
        let body = GenerateContentRequest {
            contents: vec![Content { role: "user", parts }],
        };

        debug!("Calling {} ({} parts)", model, body.contents[0].parts.len());

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = resp
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;

        extract_text(parsed)
    }
}

// --- Request types ---

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum Part {
    Text(String),
    InlineData(Blob),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

// --- Response types ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

fn extract_text(resp: GenerateContentResponse) -> Result<String, GenerationError> {
    let Some(candidate) = resp.candidates.into_iter().next() else {
        let reason = resp
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .map(|r| format!("prompt blocked: {r}"))
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(GenerationError::Empty(reason));
    };

    let text = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect::<String>())
        .unwrap_or_default();

    let text = text.trim();
    if text.is_empty() {
        let reason = candidate
            .finish_reason
            .map(|r| format!("finish reason: {r}"))
            .unwrap_or_else(|| "empty candidate".to_string());
        return Err(GenerationError::Empty(reason));
    }

    Ok(text.to_string())
}

/// Best-effort MIME type from magic bytes. Unknown data is labelled JPEG;
/// the upload itself is never rejected here.
pub fn sniff_mime_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        debug!("Unrecognised image header, sending as image/jpeg");
        "image/jpeg"
    }
}

// --- Strategies ---

/// Fold a generation result into an [`Outcome`]. Failures are logged and
/// replaced by `fallback` followed by the error.
fn fold(model: &str, stage: &str, result: Result<String, GenerationError>, fallback: &str) -> Outcome {
    match result {
        Ok(text) => Outcome::Generated(text),
        Err(e) => {
            warn!(model = %model, "{} failed: {}", stage, e);
            Outcome::failed(e.to_string(), format!("{fallback}: {e}"))
        }
    }
}

async fn describe_with(client: &GeminiClient, model: &str, image: &[u8], fallback: &str) -> Outcome {
    let result = client.describe(model, prompt::DESCRIBE_IMAGE_PROMPT, image).await;
    fold(model, "Image description", result, fallback)
}

async fn complete_with(client: &GeminiClient, model: &str, prompt: &str, fallback: &str) -> Outcome {
    let result = client.complete(model, prompt).await;
    fold(model, "Text generation", result, fallback)
}

/// Single-purpose vision model.
pub struct GeminiVision {
    client: GeminiClient,
    model: String,
}

impl GeminiVision {
    pub fn new(client: GeminiClient, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl VisionStrategy for GeminiVision {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn describe_image(&self, image: &[u8]) -> Outcome {
        describe_with(&self.client, &self.model, image, "Error processing image with Gemini").await
    }
}

/// Text-only language model.
pub struct GeminiLanguage {
    client: GeminiClient,
    model: String,
}

impl GeminiLanguage {
    pub fn new(client: GeminiClient, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl LanguageStrategy for GeminiLanguage {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn respond(&self, query: &str, context: Option<&str>) -> Outcome {
        let prompt = prompt::with_context(query, context);
        complete_with(&self.client, &self.model, &prompt, "I apologize, but I encountered an error").await
    }
}

/// One multimodal model serving both roles.
pub struct GeminiMultimodal {
    client: GeminiClient,
    model: String,
}

impl GeminiMultimodal {
    pub fn new(client: GeminiClient, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }

    /// Answer `query` about `image` in one request, skipping the separate
    /// description step. Without an image the query is sent alone.
    pub async fn answer_with_image(&self, query: &str, image: Option<&[u8]>) -> Outcome {
        let result = match image {
            Some(bytes) => self.client.describe(&self.model, query, bytes).await,
            None => self.client.complete(&self.model, query).await,
        };
        fold(&self.model, "Multimodal generation", result, "Error processing multimodal input")
    }
}

#[async_trait]
impl VisionStrategy for GeminiMultimodal {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn describe_image(&self, image: &[u8]) -> Outcome {
        describe_with(&self.client, &self.model, image, "Error processing image").await
    }
}

#[async_trait]
impl LanguageStrategy for GeminiMultimodal {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn respond(&self, query: &str, context: Option<&str>) -> Outcome {
        let prompt = prompt::with_context_brief(query, context);
        complete_with(
            &self.client,
            &self.model,
            &prompt,
            "I apologize, but I encountered an error generating a response",
        )
        .await
    }
}
