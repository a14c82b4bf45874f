//! Transport decoding of IAM policy documents.
//!
//! IAM returns policy documents URL-encoded per RFC 3986. The decoded text is
//! handed to policy simulation unchanged; it is never parsed here.

use std::str::Utf8Error;

use percent_encoding::percent_decode_str;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed percent escape at byte {offset}")]
    MalformedEscape { offset: usize },
    #[error("decoded document is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] Utf8Error),
    #[error("policy document is empty")]
    EmptyDocument,
}

/// Decode a percent-encoded policy document into plain text.
///
/// `percent_decode_str` passes malformed escapes through untouched, so they
/// are rejected up front.
pub fn decode_document(encoded: &str) -> Result<String, DecodeError> {
    let bytes = encoded.as_bytes();
    for (offset, byte) in bytes.iter().enumerate() {
        if *byte != b'%' {
            continue;
        }
        let valid = bytes
            .get(offset + 1..offset + 3)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
        if !valid {
            return Err(DecodeError::MalformedEscape { offset });
        }
    }

    let decoded = percent_decode_str(encoded).decode_utf8()?;
    if decoded.trim().is_empty() {
        return Err(DecodeError::EmptyDocument);
    }
    Ok(decoded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENCODED: &str = "%7B%22Version%22%3A%222012-10-17%22%2C%22Statement%22%3A%5B%7B%22Effect%22%3A%22Allow%22%2C%22Action%22%3A%22s3%3AGetObject%22%2C%22Resource%22%3A%22arn%3Aaws%3As3%3A%3A%3Abucket%2F%2A%22%7D%5D%7D";
    const DECODED: &str = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":"s3:GetObject","Resource":"arn:aws:s3:::bucket/*"}]}"#;

    #[test]
    fn test_decode_known_fixture() {
        assert_eq!(decode_document(ENCODED).unwrap(), DECODED);
    }

    #[test]
    fn test_decode_is_identity_without_escapes() {
        assert_eq!(decode_document(DECODED).unwrap(), DECODED);
        // only stable while the text holds no escape sequences
        let once = decode_document("%2541").unwrap();
        assert_eq!(once, "%41");
        assert_ne!(decode_document(&once).unwrap(), once);
    }

    #[test]
    fn test_decode_keeps_plus_literal() {
        assert_eq!(decode_document("a+b%20c").unwrap(), "a+b c");
    }

    #[test]
    fn test_decode_rejects_malformed_escape() {
        assert_eq!(
            decode_document("%7B%zz%7D"),
            Err(DecodeError::MalformedEscape { offset: 3 })
        );
        assert_eq!(
            decode_document("trailing%2"),
            Err(DecodeError::MalformedEscape { offset: 8 })
        );
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        assert!(matches!(
            decode_document("%FF%FE"),
            Err(DecodeError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn test_decode_rejects_empty_document() {
        assert_eq!(decode_document(""), Err(DecodeError::EmptyDocument));
        assert_eq!(decode_document("%20%0A"), Err(DecodeError::EmptyDocument));
    }
}
