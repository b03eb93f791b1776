//! Shared encoding helpers: lowercase hex and standard base64 (padded).

use data_encoding::{BASE64, HEXLOWER};

/// Encode bytes as lowercase hex.
pub fn hex_encode(bytes: &[u8]) -> String {
    HEXLOWER.encode(bytes)
}

/// Decode lowercase hex back to bytes. Uppercase input is rejected so that
/// every digest has exactly one accepted spelling.
pub fn hex_decode(s: &str) -> Result<Vec<u8>, data_encoding::DecodeError> {
    HEXLOWER.decode(s.as_bytes())
}

/// Standard base64 with padding, as expected inside `data:` URLs.
pub fn base64_encode(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}
