//! Gemini (Google) image generation provider.

use crate::credentials::{EnvKey, KeySource, StaticKey};
use crate::error::{fault_message, LuminiaError, Result};
use crate::image::data_uri;
use crate::image::provider::ImageProvider;
use crate::image::scan::{self, ContentPart};
use crate::image::types::GenerationRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Production endpoint for the Generative Language API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Gemini 2.5 Flash Image, available on standard keys.
    #[default]
    FlashImage,
    /// Gemini 3 Pro Image, requires a billed key.
    ProImage,
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FlashImage => "gemini-2.5-flash-image",
            Self::ProImage => "gemini-3-pro-image-preview",
        }
    }
}

impl std::str::FromStr for GeminiModel {
    type Err = LuminiaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "gemini-2.5-flash-image" | "flash" => Ok(Self::FlashImage),
            "gemini-3-pro-image-preview" | "pro" => Ok(Self::ProImage),
            other => Err(LuminiaError::Validation(format!(
                "unknown Gemini model '{other}'"
            ))),
        }
    }
}

/// Builder for GeminiProvider.
#[derive(Default)]
pub struct GeminiProviderBuilder {
    key_source: Option<Arc<dyn KeySource>>,
    model: GeminiModel,
    base_url: Option<String>,
    client: Option<reqwest::Client>,
}

impl GeminiProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a fixed API key. Without this or [`key_source`](Self::key_source)
    /// the key is read from `GOOGLE_API_KEY` / `GEMINI_API_KEY` on each call.
    pub fn api_key(self, key: impl Into<String>) -> Self {
        self.key_source(StaticKey::new(key))
    }

    /// Sets where the API key is read from at call time.
    pub fn key_source(mut self, source: impl KeySource + 'static) -> Self {
        self.key_source = Some(Arc::new(source));
        self
    }

    /// Sets the Gemini model variant.
    pub fn model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Overrides the API endpoint (proxies, tests).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Uses a preconfigured HTTP client.
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Builds the provider. The key is not resolved here.
    pub fn build(self) -> Result<GeminiProvider> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let parsed = reqwest::Url::parse(&base_url)
            .map_err(|e| LuminiaError::Validation(format!("invalid base URL '{base_url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(LuminiaError::Validation(format!(
                "base URL must be http(s): {base_url}"
            )));
        }

        Ok(GeminiProvider {
            client: self.client.unwrap_or_default(),
            key_source: self
                .key_source
                .unwrap_or_else(|| Arc::new(EnvKey::default())),
            model: self.model,
            base_url,
        })
    }
}

/// Gemini image generation provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    key_source: Arc<dyn KeySource>,
    model: GeminiModel,
    base_url: String,
}

impl GeminiProvider {
    /// Creates a new `GeminiProviderBuilder`.
    pub fn builder() -> GeminiProviderBuilder {
        GeminiProviderBuilder::new()
    }

    /// The configured model variant.
    pub fn gemini_model(&self) -> GeminiModel {
        self.model
    }

    async fn generate_impl(&self, request: &GenerationRequest) -> Result<String> {
        let start = Instant::now();
        let api_key = self.key_source.api_key()?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url,
            self.model.as_str(),
        );

        let body = GeminiRequest::from_generation_request(request);
        tracing::debug!(
            model = self.model.as_str(),
            aspect_ratio = %request.aspect_ratio,
            parts = body.contents[0].parts.len(),
            "submitting Gemini image request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LuminiaError::Api {
                status: status.as_u16(),
                message: fault_message(status.as_u16(), &text),
            });
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let parts = gemini_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .unwrap_or_default();

        let url = scan::extract_image(&parts)?;
        tracing::debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            "Gemini image generation complete"
        );
        Ok(url)
    }
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.generate_impl(request).await.inspect_err(|e| {
            tracing::error!(error = ?e, "Gemini image generation error: {e}");
        })
    }

    fn model(&self) -> &str {
        self.model.as_str()
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiRequestPart<'a>>,
}

/// A part in a Gemini request - can be text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart<'a> {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData<'a>,
    },
    Text {
        text: &'a str,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    image_config: GeminiImageConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiImageConfig {
    aspect_ratio: &'static str,
}

impl<'a> GeminiRequest<'a> {
    fn from_generation_request(req: &'a GenerationRequest) -> Self {
        let mut parts = Vec::with_capacity(2);

        // Reference image first; an unparseable URI is left out.
        if let Some(ref image) = req.reference_image {
            match data_uri::parse(image.data_uri()) {
                Some((mime_type, data)) => parts.push(GeminiRequestPart::InlineData {
                    inline_data: GeminiInlineData { mime_type, data },
                }),
                None => tracing::warn!("reference image is not a base64 data URI, omitting it"),
            }
        }

        parts.push(GeminiRequestPart::Text { text: &req.prompt });

        Self {
            contents: vec![GeminiContent { parts }],
            // No response modality restriction: a refusal must be able to come back as text.
            generation_config: GeminiConfig {
                image_config: GeminiImageConfig {
                    aspect_ratio: req.aspect_ratio.as_str(),
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<ContentPart>,
}
