//! otpauth error type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorised codec failure. Every kind is terminal: malformed input is a
/// caller bug, so nothing here is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OtpAuthErrorKind {
    /// A scheme is present but is not the one expected.
    InvalidScheme,
    /// The type (authority) or label (path) segment is missing or empty.
    InvalidTypeOrLabel,
    /// A malformed `%XX` escape in the label or query.
    InvalidUrlEscape,
    /// A label colon is present but nothing follows it.
    EmptyAccountName,
    /// A label colon is present but nothing precedes it.
    EmptyIssuer,
    /// Unrecognised (or missing) query parameter.
    InvalidParameter,
    /// A numeric parameter is not a base-10 non-negative integer.
    InvalidIntegerValue,
    /// A parameter value could not be decoded.
    InvalidValue,
    /// The migration buffer violates the tag/length/value wire format.
    MalformedWireFormat,
    /// OTP type other than hotp/totp given to the migration encoder.
    UnknownType,
    /// Hash algorithm outside SHA1/SHA256/SHA512/MD5.
    UnsupportedAlgorithm,
    /// Digit count the target format cannot represent.
    UnsupportedDigitCount,
    /// Secret text is not legal base32.
    IllegalBase32Data,
}

/// Crate-level error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpAuthError {
    pub kind: OtpAuthErrorKind,
    pub message: String,
    /// Underlying decoder error or other supporting context.
    pub detail: Option<String>,
}

pub type OtpAuthResult<T> = Result<T, OtpAuthError>;

// ── Construction helpers ─────────────────────────────────────────────

impl OtpAuthError {
    pub fn new(kind: OtpAuthErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn invalid_scheme(scheme: &str) -> Self {
        Self::new(
            OtpAuthErrorKind::InvalidScheme,
            format!("invalid scheme {:?}", scheme),
        )
    }

    pub fn invalid_type_or_label(msg: impl Into<String>) -> Self {
        Self::new(OtpAuthErrorKind::InvalidTypeOrLabel, msg)
    }

    pub fn invalid_escape(field: &str, text: &str) -> Self {
        Self::new(
            OtpAuthErrorKind::InvalidUrlEscape,
            format!("invalid URL escape in {}: {:?}", field, text),
        )
    }

    pub fn invalid_parameter(key: &str) -> Self {
        Self::new(
            OtpAuthErrorKind::InvalidParameter,
            format!("invalid parameter {:?}", key),
        )
    }

    pub fn invalid_integer(key: &str, value: &str) -> Self {
        Self::new(
            OtpAuthErrorKind::InvalidIntegerValue,
            format!("invalid integer value for {}: {:?}", key, value),
        )
    }

    pub fn invalid_value(key: &str, value: &str) -> Self {
        Self::new(
            OtpAuthErrorKind::InvalidValue,
            format!("invalid value for {}: {:?}", key, value),
        )
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::new(OtpAuthErrorKind::MalformedWireFormat, msg)
    }

    pub fn unknown_type(otp_type: &str) -> Self {
        Self::new(
            OtpAuthErrorKind::UnknownType,
            format!("unknown OTP type {:?}", otp_type),
        )
    }

    pub fn unsupported_algorithm(name: &str) -> Self {
        Self::new(
            OtpAuthErrorKind::UnsupportedAlgorithm,
            format!("unsupported algorithm {:?}", name),
        )
    }

    pub fn unsupported_digits(digits: u32) -> Self {
        Self::new(
            OtpAuthErrorKind::UnsupportedDigitCount,
            format!("unsupported digit count {}", digits),
        )
    }

    pub fn illegal_base32(detail: impl Into<String>) -> Self {
        Self::new(OtpAuthErrorKind::IllegalBase32Data, "illegal base32 data").with_detail(detail)
    }
}

impl fmt::Display for OtpAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)?;
        if let Some(d) = &self.detail {
            write!(f, " ({})", d)?;
        }
        Ok(())
    }
}

impl std::error::Error for OtpAuthError {}

impl From<OtpAuthError> for String {
    fn from(e: OtpAuthError) -> String {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_message_and_detail() {
        let err = OtpAuthError::illegal_base32("invalid symbol at 0");
        let s = err.to_string();
        assert!(s.contains("IllegalBase32Data"));
        assert!(s.contains("illegal base32 data"));
        assert!(s.contains("invalid symbol at 0"));
    }

    #[test]
    fn display_without_detail() {
        let err = OtpAuthError::invalid_parameter("bogus");
        assert_eq!(err.to_string(), "[InvalidParameter] invalid parameter \"bogus\"");
    }

    #[test]
    fn messages_name_the_offending_field() {
        let err = OtpAuthError::invalid_integer("digits", "x");
        assert_eq!(err.kind, OtpAuthErrorKind::InvalidIntegerValue);
        assert!(err.message.contains("invalid integer value"));
        assert!(err.message.contains("digits"));
    }

    #[test]
    fn into_string() {
        let s: String = OtpAuthError::unknown_type("bogus").into();
        assert!(s.contains("UnknownType"));
    }

    #[test]
    fn serde_roundtrip() {
        let err = OtpAuthError::malformed("truncated varint").with_detail("offset 3");
        let json = serde_json::to_string(&err).unwrap();
        let back: OtpAuthError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
