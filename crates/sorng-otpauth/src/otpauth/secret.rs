//! Base32 shared-secret codec (RFC 4648 alphabet).

use data_encoding::{Encoding, Specification, BASE32_NOPAD};
use lazy_static::lazy_static;

use crate::otpauth::error::{OtpAuthError, OtpAuthResult};

lazy_static! {
    /// Unpadded RFC 4648 base32 that ignores stray low bits in the final
    /// symbol, as most authenticator apps do.
    static ref BASE32_LENIENT: Encoding = {
        let mut spec = Specification::new();
        spec.symbols.push_str("ABCDEFGHIJKLMNOPQRSTUVWXYZ234567");
        spec.check_trailing_bits = false;
        spec.encoding().expect("static base32 specification is valid")
    };
}

/// Decode a base32 secret.
///
/// Whitespace is ignored, case is normalised and `=` padding is optional.
pub fn decode_base32(text: &str) -> OtpAuthResult<Vec<u8>> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    let cleaned = cleaned.trim_end_matches('=');
    BASE32_LENIENT
        .decode(cleaned.as_bytes())
        .map_err(|e| OtpAuthError::illegal_base32(e.to_string()))
}

/// Encode raw key bytes as unpadded uppercase base32.
pub fn encode_base32(bytes: &[u8]) -> String {
    BASE32_NOPAD.encode(bytes)
}
