//! Gemini client for Virtual Stylist.
//!
//! This module provides the [`GeminiClient`], the production
//! [`ImageGenerator`] backed by the Gemini `generateContent` REST endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::prompt::{edit_prompt, generation_prompt};
use crate::{DataUri, GenaiError, ImageGenerator, OutfitStyle, RequestKind, DEFAULT_MIME_TYPE};

/// Default image model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Header carrying the API credential.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Connection settings for [`GeminiClient`].
///
/// # Example
///
/// ```
/// use stylist_genai::GeminiOptions;
///
/// let options = GeminiOptions::new("secret")
///     .with_model("gemini-2.5-flash-image")
///     .with_base_url("http://127.0.0.1:8080/v1beta");
/// assert_eq!(options.model, "gemini-2.5-flash-image");
/// ```
#[derive(Clone)]
pub struct GeminiOptions {
    /// API credential, sent on every request.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// API root, without a trailing `/models`.
    pub base_url: String,
}

impl GeminiOptions {
    /// Creates options with the default model and API root.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Sets the model identifier.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl std::fmt::Debug for GeminiOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiOptions")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum RequestPart<'a> {
    Text(&'a str),
    InlineData(InlineDataRef<'a>),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineDataRef<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default, alias = "prompt_feedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default, alias = "finish_reason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, alias = "inline_data")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default, alias = "mime_type")]
    mime_type: Option<String>,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default, alias = "block_reason")]
    block_reason: Option<String>,
}

/// Builds the request body for one text instruction plus one image.
fn build_request<'a>(prompt: &'a str, image: &'a DataUri) -> GenerateContentRequest<'a> {
    GenerateContentRequest {
        contents: vec![RequestContent {
            parts: vec![
                RequestPart::Text(prompt),
                RequestPart::InlineData(InlineDataRef {
                    mime_type: &image.mime_type,
                    data: &image.data,
                }),
            ],
        }],
    }
}

/// Pulls the first inline image out of the first candidate.
fn extract_image(
    response: GenerateContentResponse,
    kind: RequestKind,
) -> Result<DataUri, GenaiError> {
    let block_reason = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason);

    let Some(candidate) = response.candidates.into_iter().next() else {
        let detail = block_reason.map_or_else(
            || "response had no candidates".to_string(),
            |reason| format!("prompt blocked: {reason}"),
        );
        return Err(GenaiError::no_image(kind, detail));
    };

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    let mut texts = Vec::new();
    for part in parts {
        if let Some(inline) = part.inline_data {
            let mime_type = inline
                .mime_type
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
            return Ok(DataUri::new(mime_type, inline.data));
        }
        if let Some(text) = part.text {
            texts.push(text);
        }
    }

    let mut detail = format!(
        "finish reason: {}",
        candidate.finish_reason.as_deref().unwrap_or("unknown")
    );
    if !texts.is_empty() {
        detail.push_str("; text: ");
        detail.push_str(&texts.join(" "));
    }
    Err(GenaiError::no_image(kind, detail))
}

// ============================================================================
// Client
// ============================================================================

/// Image generation client for the Gemini API.
///
/// Build one at startup and share it (it is cheap to clone); the
/// orchestrator only sees it through the [`ImageGenerator`] trait.
///
/// # Example
///
/// ```no_run
/// use stylist_genai::{GeminiClient, GeminiOptions, ImageGenerator, OutfitStyle};
///
/// # async fn example() -> Result<(), stylist_genai::GenaiError> {
/// let client = GeminiClient::new(GeminiOptions::new("api-key"))?;
/// let image = client
///     .generate("data:image/jpeg;base64,/9j/4AAQ", OutfitStyle::Casual)
///     .await?;
/// assert!(image.starts_with("data:image/"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    options: GeminiOptions,
}

impl GeminiClient {
    /// Creates a new client. No request is made until the first call.
    ///
    /// # Errors
    ///
    /// Returns [`GenaiError::Transport`] if the HTTP client cannot be built
    /// (e.g., TLS backend initialization failure).
    pub fn new(options: GeminiOptions) -> Result<Self, GenaiError> {
        let http = reqwest::Client::builder().build()?;
        debug!(model = %options.model, base_url = %options.base_url, "Gemini client created");
        Ok(Self { http, options })
    }

    /// Full `generateContent` URL for the configured model.
    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.options.base_url.trim_end_matches('/'),
            self.options.model
        )
    }

    /// Sends one instruction plus image and returns the first image back.
    #[instrument(skip(self, prompt, image), fields(model = %self.options.model, mime = %image.mime_type))]
    async fn generate_content(
        &self,
        kind: RequestKind,
        prompt: &str,
        image: &DataUri,
    ) -> Result<DataUri, GenaiError> {
        let body = build_request(prompt, image);

        debug!(payload_len = image.data.len(), "Sending generateContent request");

        let response = self
            .http
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.options.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Image service returned an error status");
            return Err(GenaiError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)?;
        let image = extract_image(parsed, kind)?;

        info!(
            mime = %image.mime_type,
            payload_len = image.data.len(),
            "Image received"
        );
        Ok(image)
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate(&self, image: &str, style: OutfitStyle) -> Result<String, GenaiError> {
        debug!(style = %style, "Generating outfit");
        let source = DataUri::from_payload(image);
        let prompt = generation_prompt(style);
        let result = self
            .generate_content(RequestKind::Generate, &prompt, &source)
            .await?;
        Ok(result.to_string())
    }

    async fn edit(&self, image: &str, instruction: &str) -> Result<String, GenaiError> {
        debug!(instruction_len = instruction.len(), "Editing outfit");
        let source = DataUri::from_payload(image);
        let prompt = edit_prompt(instruction);
        let result = self
            .generate_content(RequestKind::Edit, &prompt, &source)
            .await?;
        Ok(result.to_string())
    }
}
