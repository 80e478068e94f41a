//! Error types for image generation and the studio session.

/// Longest provider fault text carried into an error message.
const MAX_FAULT_LEN: usize = 500;

/// Errors that can occur while composing or generating an image.
#[derive(Debug, thiserror::Error)]
pub enum LuminiaError {
    /// Local input rejected before any request was made (empty submission,
    /// oversized reference image).
    #[error("{0}")]
    Validation(String),

    /// The provider answered but no image could be extracted from the response.
    #[error("{0}")]
    Content(String),

    /// API returned a non-success status. Displays the normalized fault message only.
    #[error("{message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Fault message extracted from the response body.
        message: String,
    },

    /// Network or HTTP error.
    #[error("{0}")]
    Network(#[from] reqwest::Error),

    /// API key missing or empty.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The host key-selection flow failed.
    #[error("{0}")]
    KeySelection(String),

    /// Failed to decode base64 or data URI content.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (reading a reference image, saving a download).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LuminiaError {
    /// Returns true if the call to the provider itself failed.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Api { .. } | Self::Network(_) | Self::Auth(_))
    }

    /// Returns true if the provider responded without a usable image.
    pub fn is_content(&self) -> bool {
        matches!(self, Self::Content(_))
    }

    /// Returns true if the input was rejected locally.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// HTTP status of an API error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias for studio operations.
pub type Result<T> = std::result::Result<T, LuminiaError>;

/// Reduces a provider error body to a single message.
///
/// Prefers the fault's own `message` field (Google nests it under `error`),
/// passed through whole; then the body text itself, truncated; then the
/// status line.
pub(crate) fn fault_message(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let message = value
            .pointer("/error/message")
            .or_else(|| value.get("message"))
            .and_then(|m| m.as_str())
            .filter(|m| !m.trim().is_empty());
        if let Some(message) = message {
            return message.trim().to_string();
        }
    }

    let text = sanitize_error_message(body);
    if !text.is_empty() {
        return text;
    }

    match reqwest::StatusCode::from_u16(status) {
        Ok(code) => code.to_string(),
        Err(_) => format!("HTTP {status}"),
    }
}

/// Trims and truncates provider text so error banners stay readable.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= MAX_FAULT_LEN {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(MAX_FAULT_LEN).collect();
    truncated.push_str("...");
    truncated
}
