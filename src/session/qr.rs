//! QR payload extraction
//!
//! The login canvas is read back as a `data:image/png;base64,...` URL.
//! Callers only ever see the decoded image bytes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{Error, Result};

/// PNG file signature
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Strip any `...,` data-URI header and decode the base64 payload
pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>> {
    let payload = match data_url.split_once(',') {
        Some((header, payload)) => {
            if !header.ends_with(";base64") {
                return Err(Error::Page(format!(
                    "QR canvas returned a non-base64 data URL ({})",
                    header
                )));
            }
            payload
        }
        None => data_url,
    };

    let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if payload.is_empty() {
        return Err(Error::Page("QR canvas returned an empty image".to_string()));
    }

    STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| Error::Page(format!("QR canvas payload is not valid base64: {}", e)))
}

/// Re-encode image bytes for JSON transport
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn is_png(bytes: &[u8]) -> bool {
    bytes.starts_with(&PNG_SIGNATURE)
}
