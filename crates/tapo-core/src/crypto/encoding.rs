//! Base64 helpers.
//!
//! Devices base64-encode several text fields (nicknames, SSIDs, login
//! parameters) and every SecurePassthrough payload.

use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::error::Error;

/// Encodes UTF-8 text as standard base64.
pub fn base64_encode(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// Decodes standard base64 into UTF-8 text.
///
/// Fails with [`Error::MalformedPayload`] if the input is not valid base64
/// or does not decode to UTF-8.
pub fn base64_decode(encoded: &str) -> Result<String, Error> {
    let bytes = base64_decode_bytes(encoded)?;
    String::from_utf8(bytes)
        .map_err(|e| Error::MalformedPayload(format!("base64 text is not UTF-8: {}", e)))
}

/// Encodes raw bytes as standard base64.
pub fn base64_encode_bytes(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes standard base64 into raw bytes, ignoring embedded line breaks.
pub fn base64_decode_bytes(encoded: &str) -> Result<Vec<u8>, Error> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| Error::MalformedPayload(format!("invalid base64: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_nickname() {
        assert_eq!(base64_decode("VGVzdA==").unwrap(), "Test");
    }

    #[test]
    fn test_empty_round_trip() {
        assert_eq!(base64_encode(""), "");
        assert_eq!(base64_decode("").unwrap(), "");
    }

    #[test]
    fn test_decode_ignores_line_breaks() {
        assert_eq!(base64_decode_bytes("VGVz\r\ndA==").unwrap(), b"Test");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            base64_decode("not base64!"),
            Err(Error::MalformedPayload(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_text_round_trip(text in any::<String>()) {
            prop_assert_eq!(base64_decode(&base64_encode(&text)).unwrap(), text);
        }
    }
}
