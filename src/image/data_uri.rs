//! `data:<mime>;base64,<payload>` encoding.

use crate::error::{LuminiaError, Result};
use base64::Engine;

const SCHEME: &str = "data:";
const MARKER: &str = ";base64,";

/// Builds a data URI from raw bytes.
pub fn encode(mime_type: &str, bytes: &[u8]) -> String {
    format_parts(
        mime_type,
        &base64::engine::general_purpose::STANDARD.encode(bytes),
    )
}

/// Builds a data URI from an already base64-encoded payload.
pub fn format_parts(mime_type: &str, payload: &str) -> String {
    format!("{SCHEME}{mime_type}{MARKER}{payload}")
}

/// Splits a data URI into `(mime_type, base64_payload)`.
///
/// Both halves must be non-empty and the URI must be a single line. When the
/// marker appears more than once the last usable occurrence splits the two,
/// so a MIME type may itself contain `;base64,`. Returns `None` for anything
/// else; callers treat that as "no image" rather than an error.
pub fn parse(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix(SCHEME)?;
    if rest.contains(['\n', '\r', '\u{2028}', '\u{2029}']) {
        return None;
    }

    let split = rest
        .match_indices(MARKER)
        .map(|(i, _)| i)
        .filter(|&i| i > 0 && i + MARKER.len() < rest.len())
        .last()?;

    Some((&rest[..split], &rest[split + MARKER.len()..]))
}

/// Decodes the payload of a data URI to raw bytes.
///
/// Accepts payloads with missing `=` padding.
pub fn decode_bytes(uri: &str) -> Result<Vec<u8>> {
    let (_, payload) =
        parse(uri).ok_or_else(|| LuminiaError::Decode("not a base64 data URI".into()))?;

    if let Ok(data) = base64::engine::general_purpose::STANDARD.decode(payload) {
        return Ok(data);
    }
    base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(payload)
        .map_err(|e| LuminiaError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_png() {
        assert_eq!(
            parse("data:image/png;base64,AAAA"),
            Some(("image/png", "AAAA"))
        );
    }

    #[test]
    fn test_parse_rejects_missing_marker() {
        assert_eq!(parse("data:image/png,AAAA"), None);
        assert_eq!(parse("image/png;base64,AAAA"), None);
    }

    #[test]
    fn test_parse_rejects_empty_halves() {
        assert_eq!(parse("data:;base64,AAAA"), None);
        assert_eq!(parse("data:image/png;base64,"), None);
    }

    #[test]
    fn test_parse_rejects_multiline() {
        assert_eq!(parse("data:image/png;base64,AA\nAA"), None);
    }

    #[test]
    fn test_parse_uses_last_marker() {
        assert_eq!(
            parse("data:a;base64,b;base64,c"),
            Some(("a;base64,b", "c"))
        );
        // A trailing marker with nothing after it cannot split.
        assert_eq!(parse("data:a;base64,b;base64,"), Some(("a", "b;base64,")));
    }

    #[test]
    fn test_encode_then_decode_bytes() {
        let uri = encode("image/jpeg", &[0xFF, 0xD8, 0xFF]);
        assert_eq!(uri, "data:image/jpeg;base64,/9j/");
        assert_eq!(decode_bytes(&uri).unwrap(), vec![0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn test_decode_bytes_without_padding() {
        assert_eq!(decode_bytes("data:text/plain;base64,aGk").unwrap(), b"hi");
    }

    #[test]
    fn test_decode_bytes_rejects_garbage() {
        assert!(decode_bytes("data:image/png;base64,!!!").is_err());
        assert!(decode_bytes("nope").is_err());
    }
}
