//! Base64 decoding utilities
//!
//! Subscription bodies and share-link payloads come in every base64
//! variant in the wild: standard, URL-safe, with or without padding, and
//! with line breaks inserted by transports. Decoding tries them all.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use tracing::trace;

use crate::error::{Error, Result};

use super::profiles::parse_profiles;

// ============================================================================
// Base64 Decoding
// ============================================================================

/// Decodes base64 content, trying multiple variants.
///
/// Whitespace is removed before decoding so that wrapped subscription
/// bodies survive.
pub fn decode_b64(content: &str) -> Result<Vec<u8>> {
    let cleaned: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    trace!("attempting base64 decode, cleaned length: {}", cleaned.len());

    if let Ok(decoded) = STANDARD.decode(&cleaned) {
        return Ok(decoded);
    }
    if let Ok(decoded) = URL_SAFE.decode(&cleaned) {
        return Ok(decoded);
    }
    if let Ok(decoded) = URL_SAFE_NO_PAD.decode(&cleaned) {
        return Ok(decoded);
    }

    let padded = add_base64_padding(&cleaned);
    if let Ok(decoded) = STANDARD.decode(&padded) {
        return Ok(decoded);
    }
    if let Ok(decoded) = URL_SAFE.decode(&padded) {
        return Ok(decoded);
    }

    Err(Error::Base64)
}

/// Decodes base64 content that must be valid UTF-8 text.
pub fn decode_b64_text(content: &str) -> Result<String> {
    let decoded = decode_b64(content)?;
    String::from_utf8(decoded).map_err(|_| Error::Base64)
}

/// Adds `=` padding until the length is a multiple of 4.
pub fn add_base64_padding(s: &str) -> String {
    let mut result = s.to_string();
    while !result.len().is_multiple_of(4) {
        result.push('=');
    }
    result
}

/// Parser stage: decode the whole input as base64, then extract profile
/// links from the decoded text.
pub fn parse_base64(data: &str) -> Result<Vec<String>> {
    let decoded = decode_b64_text(data)?;
    Ok(parse_profiles(&decoded))
}
