use crate::error::{FederationError, Result};
use base64::engine::general_purpose;
use base64::Engine;

/// Decodes a base64 assertion as handed out by identity providers, which
/// frequently wrap the payload across several lines.
pub fn base64_decode_to_string(string: &str) -> Result<String> {
    let compact: String = string.split_whitespace().collect();
    let output_vec = general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| FederationError::parse(format!("assertion is not valid base64: {e}")))?;
    String::from_utf8(output_vec)
        .map_err(|e| FederationError::parse(format!("assertion is not valid UTF-8: {e}")))
}

pub fn base64_encode(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}
