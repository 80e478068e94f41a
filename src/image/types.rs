//! Core types for image generation.

use crate::error::{LuminiaError, Result};
use crate::image::data_uri;
use serde::{Deserialize, Serialize};

/// Largest reference image accepted, in bytes (5 MB).
pub const MAX_REFERENCE_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
}

impl ImageFormat {
    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// Output proportions the studio offers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 1:1 square aspect ratio.
    #[default]
    #[serde(rename = "1:1")]
    Square,
    /// 9:16 portrait (tall) aspect ratio.
    #[serde(rename = "9:16")]
    Portrait,
    /// 16:9 landscape (widescreen) aspect ratio.
    #[serde(rename = "16:9")]
    Landscape,
    /// 4:3 wide aspect ratio.
    #[serde(rename = "4:3")]
    Wide,
    /// 3:4 tall aspect ratio.
    #[serde(rename = "3:4")]
    Tall,
}

impl AspectRatio {
    /// Every ratio, in the order the studio lists them.
    pub const ALL: [AspectRatio; 5] = [
        Self::Square,
        Self::Portrait,
        Self::Landscape,
        Self::Wide,
        Self::Tall,
    ];

    /// Returns the aspect ratio as a string (e.g., "16:9").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Portrait => "9:16",
            Self::Landscape => "16:9",
            Self::Wide => "4:3",
            Self::Tall => "3:4",
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AspectRatio {
    type Err = LuminiaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| {
                LuminiaError::Validation(format!(
                    "unsupported aspect ratio '{}' (expected one of 1:1, 9:16, 16:9, 4:3, 3:4)",
                    s.trim()
                ))
            })
    }
}

/// A user-supplied image the model should work from.
///
/// Held as a data URI, the same string used for transport and preview.
/// Never mutated after construction; replace it instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    data_uri: String,
}

impl ReferenceImage {
    /// Encodes raw bytes, rejecting payloads over [`MAX_REFERENCE_IMAGE_BYTES`].
    pub fn from_bytes(bytes: &[u8], mime_type: &str) -> Result<Self> {
        if bytes.len() as u64 > MAX_REFERENCE_IMAGE_BYTES {
            return Err(oversized_reference());
        }
        Ok(Self {
            data_uri: data_uri::encode(mime_type, bytes),
        })
    }

    /// Wraps an already-encoded data URI as-is.
    ///
    /// The string is not validated; an unparseable URI is dropped from the
    /// outgoing request rather than failing it.
    pub fn from_data_uri(data_uri: impl Into<String>) -> Self {
        Self {
            data_uri: data_uri.into(),
        }
    }

    /// The data URI for transport or inline preview.
    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }

    /// The declared MIME type, if the URI is well formed.
    pub fn mime_type(&self) -> Option<&str> {
        data_uri::parse(&self.data_uri).map(|(mime, _)| mime)
    }
}

/// Error recorded when a reference image exceeds the size cap.
pub(crate) fn oversized_reference() -> LuminiaError {
    LuminiaError::Validation("Image size too large. Please select an image under 5MB.".into())
}

/// A request to generate an image. Built fresh for each submission.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The text prompt describing the desired image.
    pub prompt: String,
    /// Target proportions, passed to the provider as configuration.
    pub aspect_ratio: AspectRatio,
    /// Optional image to steer or edit.
    pub reference_image: Option<ReferenceImage>,
}

impl GenerationRequest {
    /// Creates a new square request with the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio: AspectRatio::default(),
            reference_image: None,
        }
    }

    /// Sets the aspect ratio.
    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = ratio;
        self
    }

    /// Sets a reference image.
    pub fn with_reference_image(mut self, image: ReferenceImage) -> Self {
        self.reference_image = Some(image);
        self
    }
}

/// A successfully generated image, as kept in session history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[must_use = "generated image should be downloaded or kept in history"]
pub struct GeneratedImage {
    /// Data URI of the image.
    pub url: String,
    /// Prompt that produced it.
    pub prompt: String,
    /// Requested proportions.
    pub aspect_ratio: AspectRatio,
    /// Creation time in milliseconds since the UNIX epoch; unique per session.
    pub timestamp: u64,
}

impl GeneratedImage {
    /// Filename used when downloading this image.
    pub fn download_filename(&self) -> String {
        format!("luminia-tomo-art-{}.png", self.timestamp)
    }

    /// Decodes the data URI back to raw image bytes.
    pub fn bytes(&self) -> Result<Vec<u8>> {
        data_uri::decode_bytes(&self.url)
    }
}
