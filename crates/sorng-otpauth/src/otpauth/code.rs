//! OTP code generation: RFC 4226 (HOTP) and RFC 6238 (TOTP).
//!
//! Consumers of a parsed [`OtpAuthUri`](crate::otpauth::types::OtpAuthUri)
//! use this to turn its key, counter and settings into an actual code.

use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use crate::otpauth::error::{OtpAuthError, OtpAuthResult};
use crate::otpauth::types::{Algorithm, DEFAULT_DIGITS, DEFAULT_PERIOD};

/// Dynamic truncation yields 31 bits, so more than ten digits is meaningless.
pub const MAX_DIGITS: u32 = 10;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  HOTP
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Generate a decimal OTP from raw key bytes.
///
/// `algorithm` is matched case-insensitively; empty means SHA1 and a
/// `digits` of 0 means 6.
pub fn generate_code(
    secret: &[u8],
    counter: u64,
    algorithm: &str,
    digits: u32,
) -> OtpAuthResult<String> {
    let algo = if algorithm.is_empty() {
        Algorithm::default()
    } else {
        Algorithm::from_name(algorithm)
            .ok_or_else(|| OtpAuthError::unsupported_algorithm(algorithm))?
    };
    let digits = if digits == 0 { DEFAULT_DIGITS } else { digits };
    if digits > MAX_DIGITS {
        return Err(OtpAuthError::unsupported_digits(digits));
    }
    let mac = compute_hmac(secret, &counter.to_be_bytes(), algo);
    Ok(format_decimal(truncate(&mac), digits))
}

/// Compute HMAC(key, message) using the specified algorithm.
fn compute_hmac(key: &[u8], data: &[u8], algo: Algorithm) -> Vec<u8> {
    match algo {
        Algorithm::Sha1 => {
            let mut mac =
                Hmac::<Sha1>::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        Algorithm::Sha256 => {
            let mut mac =
                Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        Algorithm::Sha512 => {
            let mut mac =
                Hmac::<Sha512>::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        Algorithm::Md5 => {
            let mut mac =
                Hmac::<Md5>::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
    }
}

/// Dynamic truncation per RFC 4226 §5.3.
fn truncate(digest: &[u8]) -> u64 {
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    (u64::from(digest[offset] & 0x7f) << 24)
        | (u64::from(digest[offset + 1]) << 16)
        | (u64::from(digest[offset + 2]) << 8)
        | u64::from(digest[offset + 3])
}

fn format_decimal(code: u64, digits: u32) -> String {
    let modulus = 10u64.pow(digits);
    format!("{:0>width$}", code % modulus, width = digits as usize)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  TOTP time steps
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Time-step counter for a unix timestamp; a period of 0 means 30.
pub fn time_step_at(unix_seconds: u64, period: u32) -> u64 {
    let period = if period == 0 { DEFAULT_PERIOD } else { period };
    unix_seconds / u64::from(period)
}

/// Current unix timestamp in seconds.
pub fn current_unix_time() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
