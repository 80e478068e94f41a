//! Extraction of an image from a provider's content parts.
//!
//! The policy is an ordered table of rules. Each rule either decides the
//! outcome or passes; the first rule that decides wins.

use crate::error::{LuminiaError, Result};
use crate::image::data_uri;
use serde::Deserialize;

/// MIME type assumed when a part omits one.
pub const DEFAULT_MIME_TYPE: &str = "image/png";

/// One content part of a provider response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPart {
    /// Inline binary payload, if any.
    #[serde(default)]
    pub inline_data: Option<InlineData>,
    /// Text payload, if any.
    #[serde(default)]
    pub text: Option<String>,
}

/// Inline binary data inside a content part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// Declared MIME type.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Base64 payload.
    #[serde(default)]
    pub data: String,
}

impl ContentPart {
    /// A part carrying a text payload.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// A part carrying inline image data.
    pub fn image(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            inline_data: Some(InlineData {
                mime_type: Some(mime_type.into()),
                data: data.into(),
            }),
            ..Self::default()
        }
    }

    fn image_data(&self) -> Option<&InlineData> {
        self.inline_data.as_ref().filter(|d| !d.data.is_empty())
    }

    fn text_payload(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }
}

/// A scanning rule: `Some` decides the outcome, `None` defers to the next rule.
pub type Rule = fn(&[ContentPart]) -> Option<Result<String>>;

/// The scanning policy, in evaluation order.
pub const RULES: [(&str, Rule); 4] = [
    ("no-content", no_content),
    ("first-image", first_image),
    ("text-instead", text_instead),
    ("no-image", no_image),
];

/// Applies [`RULES`] to the parts, returning the image as a data URI.
pub fn extract_image(parts: &[ContentPart]) -> Result<String> {
    for (name, rule) in RULES {
        if let Some(outcome) = rule(parts) {
            tracing::debug!(rule = name, ok = outcome.is_ok(), "response scan decided");
            return outcome;
        }
    }
    no_image_error()
}

/// No parts at all.
pub fn no_content(parts: &[ContentPart]) -> Option<Result<String>> {
    parts
        .is_empty()
        .then(|| Err(LuminiaError::Content("No content generated.".into())))
}

/// The first part with inline data, re-encoded as a data URI. Later image
/// parts are ignored.
pub fn first_image(parts: &[ContentPart]) -> Option<Result<String>> {
    parts.iter().find_map(ContentPart::image_data).map(|inline| {
        let mime_type = inline
            .mime_type
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE);
        Ok(data_uri::format_parts(mime_type, &inline.data))
    })
}

/// Text with no image, usually a refusal. Surfaced verbatim.
pub fn text_instead(parts: &[ContentPart]) -> Option<Result<String>> {
    parts.iter().find_map(ContentPart::text_payload).map(|text| {
        Err(LuminiaError::Content(format!(
            "Model returned text instead of image: {text}"
        )))
    })
}

/// Catch-all.
pub fn no_image(_parts: &[ContentPart]) -> Option<Result<String>> {
    Some(no_image_error())
}

fn no_image_error() -> Result<String> {
    Err(LuminiaError::Content("No image data found in response.".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(result: Result<String>) -> String {
        result.unwrap_err().to_string()
    }

    #[test]
    fn test_rule_order() {
        let names: Vec<&str> = RULES.iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            ["no-content", "first-image", "text-instead", "no-image"]
        );
    }

    #[test]
    fn test_empty_parts() {
        assert_eq!(message(extract_image(&[])), "No content generated.");
    }

    #[test]
    fn test_image_part() {
        let parts = [ContentPart::image("image/jpeg", "XYZ")];
        assert_eq!(extract_image(&parts).unwrap(), "data:image/jpeg;base64,XYZ");
    }

    #[test]
    fn test_text_only_is_not_empty_content() {
        let parts = [ContentPart::text("blocked")];
        assert_eq!(
            message(extract_image(&parts)),
            "Model returned text instead of image: blocked"
        );

        let parts = [ContentPart::text("hi")];
        assert_ne!(message(extract_image(&parts)), "No content generated.");
    }

    #[test]
    fn test_image_wins_over_earlier_text() {
        let parts = [
            ContentPart::text("Here is your image"),
            ContentPart::image("image/webp", "AAA"),
        ];
        assert_eq!(extract_image(&parts).unwrap(), "data:image/webp;base64,AAA");
    }

    #[test]
    fn test_first_image_wins() {
        let parts = [
            ContentPart::image("image/png", "FIRST"),
            ContentPart::image("image/jpeg", "SECOND"),
        ];
        assert_eq!(extract_image(&parts).unwrap(), "data:image/png;base64,FIRST");
    }

    #[test]
    fn test_missing_mime_defaults_to_png() {
        let parts = [ContentPart {
            inline_data: Some(InlineData {
                mime_type: None,
                data: "QQ==".into(),
            }),
            text: None,
        }];
        assert_eq!(extract_image(&parts).unwrap(), "data:image/png;base64,QQ==");
    }

    #[test]
    fn test_empty_inline_data_is_skipped() {
        let parts = [ContentPart::image("image/png", ""), ContentPart::text("sorry")];
        assert_eq!(
            message(extract_image(&parts)),
            "Model returned text instead of image: sorry"
        );
    }

    #[test]
    fn test_neither_image_nor_text() {
        let parts = [ContentPart::default(), ContentPart::text("")];
        assert_eq!(
            message(extract_image(&parts)),
            "No image data found in response."
        );
    }

    #[test]
    fn test_individual_rules_defer() {
        let parts = [ContentPart::text("x")];
        assert!(no_content(&parts).is_none());
        assert!(first_image(&parts).is_none());
        assert!(text_instead(&[]).is_none());
        assert!(no_image(&[]).is_some());
    }

    #[test]
    fn test_part_deserialization() {
        let json = r#"[{"inlineData":{"mimeType":"image/png","data":"iVBO"}},{"text":"done"},{}]"#;
        let parts: Vec<ContentPart> = serde_json::from_str(json).unwrap();
        assert_eq!(parts[0], ContentPart::image("image/png", "iVBO"));
        assert_eq!(parts[1], ContentPart::text("done"));
        assert_eq!(parts[2], ContentPart::default());
    }
}
