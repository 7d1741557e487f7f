//! Gemini (Google) image transformation provider.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::credential::Credential;
use crate::error::{parse_retry_after, sanitize_error_message, TransformError};
use crate::image::{GenerationMetadata, GenerationResult, UploadedImage};
use crate::transform::payload::InlinePayload;
use crate::transform::provider::TransformProvider;

/// Default API root for the Generative Language API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Aspect ratio requested from models that accept output-shape hints.
const SQUARE_ASPECT_RATIO: &str = "1:1";

/// Error reasons that mean the key itself was refused.
const CREDENTIAL_REJECTION_REASONS: [&str; 3] =
    ["API_KEY_INVALID", "API_KEY_EXPIRED", "API_KEY_SERVICE_BLOCKED"];

/// Gemini image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Gemini 2.5 Flash Image (fast, economical).
    #[default]
    FlashImage,
    /// Gemini 3 Pro Image (highest quality).
    ProImage,
    /// Gemini 2.0 Flash image preview; no output-shape configuration.
    FlashImagePreview,
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FlashImage => "gemini-2.5-flash-image",
            Self::ProImage => "gemini-3-pro-image-preview",
            Self::FlashImagePreview => "gemini-2.0-flash-preview-image-generation",
        }
    }

    /// Returns true if the model accepts `imageConfig` (aspect ratio).
    pub fn supports_image_config(&self) -> bool {
        !matches!(self, Self::FlashImagePreview)
    }

    fn response_modalities(&self) -> Vec<String> {
        match self {
            // The preview model refuses image-only output.
            Self::FlashImagePreview => vec!["TEXT".to_string(), "IMAGE".to_string()],
            _ => vec!["IMAGE".to_string()],
        }
    }
}

impl std::fmt::Display for GeminiModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder for GeminiTransformer.
#[derive(Debug, Clone)]
pub struct GeminiTransformerBuilder {
    model: GeminiModel,
    base_url: String,
    timeout: Option<Duration>,
}

impl Default for GeminiTransformerBuilder {
    fn default() -> Self {
        Self {
            model: GeminiModel::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
        }
    }
}

impl GeminiTransformerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the Gemini model variant.
    pub fn model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Overrides the API root, e.g. to point at a local mock.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets a whole-request timeout. None by default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the transformer.
    pub fn build(self) -> Result<GeminiTransformer, TransformError> {
        let mut client = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            client = client.timeout(timeout);
        }

        Ok(GeminiTransformer {
            client: client.build()?,
            model: self.model,
            base_url: self.base_url,
        })
    }
}

/// Gemini image transformation provider.
#[derive(Debug, Clone)]
pub struct GeminiTransformer {
    client: reqwest::Client,
    model: GeminiModel,
    base_url: String,
}

impl GeminiTransformer {
    /// Creates a new `GeminiTransformerBuilder`.
    pub fn builder() -> GeminiTransformerBuilder {
        GeminiTransformerBuilder::new()
    }

    /// Transforms an image given as a data URI (or bare base64).
    pub async fn transform_data_uri(
        &self,
        image_data: &str,
        instruction: &str,
        credential: &Credential,
    ) -> Result<GenerationResult, TransformError> {
        let start = Instant::now();
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url,
            self.model.as_str()
        );

        let payload = InlinePayload::from_data_uri(image_data);
        let body = GeminiRequest::new(self.model, instruction, &payload);

        tracing::debug!(
            model = %self.model,
            mime_type = payload.mime_type(),
            payload_len = payload.data.len(),
            "sending transformation request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", credential.value())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text, &headers));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let data = extract_image(gemini_response)?;

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(model = %self.model, duration_ms, "transformation complete");

        Ok(GenerationResult::from_base64(
            data,
            GenerationMetadata {
                model: Some(self.model.as_str().to_string()),
                duration_ms: Some(duration_ms),
            },
        ))
    }
}

#[async_trait]
impl TransformProvider for GeminiTransformer {
    async fn transform(
        &self,
        image: &UploadedImage,
        instruction: &str,
        credential: &Credential,
    ) -> Result<GenerationResult, TransformError> {
        self.transform_data_uri(&image.preview_data_uri(), instruction, credential)
            .await
    }

    fn name(&self) -> &str {
        "Gemini (Google)"
    }
}

/// Pulls the first inline image payload out of a successful response.
fn extract_image(response: GeminiResponse) -> Result<String, TransformError> {
    // Blocks are reported with HTTP 200
    if let Some(ref feedback) = response.prompt_feedback {
        if let Some(ref reason) = feedback.block_reason {
            let msg = feedback
                .block_reason_message
                .clone()
                .unwrap_or_else(|| format!("Prompt blocked: {}", reason));
            return Err(TransformError::ContentBlocked(msg));
        }
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(TransformError::NoCandidates)?;

    let image = candidate.content.and_then(|content| {
        content
            .parts
            .into_iter()
            .filter_map(|p| p.inline_data)
            .map(|d| d.data)
            .find(|data| !data.is_empty())
    });
    if let Some(data) = image {
        return Ok(data);
    }

    match candidate.finish_reason.as_deref() {
        Some(
            reason @ ("SAFETY"
            | "IMAGE_SAFETY"
            | "IMAGE_PROHIBITED_CONTENT"
            | "PROHIBITED_CONTENT"
            | "BLOCKLIST"),
        ) => Err(TransformError::ContentBlocked(format!(
            "Content blocked by Gemini safety filter: {}",
            reason
        ))),
        _ => Err(TransformError::NoImageInResponse),
    }
}

/// Maps a non-success response to an error, using structured fields only.
fn parse_error(status: u16, text: &str, headers: &reqwest::header::HeaderMap) -> TransformError {
    let envelope = serde_json::from_str::<GoogleErrorEnvelope>(text).ok();
    let message = envelope
        .as_ref()
        .and_then(|e| e.error.message.as_deref())
        .map(sanitize_error_message)
        .unwrap_or_else(|| sanitize_error_message(text));

    let key_rejected = envelope.as_ref().is_some_and(|e| {
        e.error.status.as_deref() == Some("UNAUTHENTICATED")
            || e.error.details.iter().any(|d| {
                d.reason
                    .as_deref()
                    .is_some_and(|r| CREDENTIAL_REJECTION_REASONS.contains(&r))
            })
    });

    if status == 401 || status == 403 || key_rejected {
        return TransformError::Unauthorized { status, message };
    }
    if status == 429 {
        let retry_after = parse_retry_after(headers).map(Duration::from_secs);
        return TransformError::RateLimited { retry_after };
    }
    if status == 404 {
        return TransformError::Api {
            status,
            message: "Model not found. Verify the model name is correct.".into(),
        };
    }
    TransformError::Api { status, message }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<GeminiImageConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiImageConfig {
    aspect_ratio: String,
}

impl GeminiRequest {
    /// Instruction text first, then the image.
    fn new(model: GeminiModel, instruction: &str, payload: &InlinePayload<'_>) -> Self {
        let parts = vec![
            GeminiRequestPart::Text {
                text: instruction.to_string(),
            },
            GeminiRequestPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: payload.mime_type().to_string(),
                    data: payload.data.to_string(),
                },
            },
        ];

        let image_config = model
            .supports_image_config()
            .then(|| GeminiImageConfig {
                aspect_ratio: SQUARE_ASPECT_RATIO.to_string(),
            });

        Self {
            contents: vec![GeminiContent { parts }],
            generation_config: GeminiConfig {
                response_modalities: model.response_modalities(),
                image_config,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    data: String,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Vec<GoogleErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    #[serde(default)]
    reason: Option<String>,
}
