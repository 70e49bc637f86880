//! Core types for otpauth URIs and migration payloads.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::otpauth::code;
use crate::otpauth::error::{OtpAuthError, OtpAuthResult};
use crate::otpauth::secret;
use crate::otpauth::uri;

pub const DEFAULT_ALGORITHM: &str = "SHA1";
pub const DEFAULT_DIGITS: u32 = 6;
pub const DEFAULT_PERIOD: u32 = 30;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Algorithm
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Hash algorithm used for HMAC-based OTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Algorithm {
    Sha1,
    Sha256,
    Sha512,
    Md5,
}

impl Default for Algorithm {
    fn default() -> Self {
        Self::Sha1
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Algorithm {
    /// Parse a case-insensitive algorithm name (`sha256`, `SHA256`, ...).
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SHA1" => Some(Self::Sha1),
            "SHA256" => Some(Self::Sha256),
            "SHA512" => Some(Self::Sha512),
            "MD5" => Some(Self::Md5),
            _ => None,
        }
    }

    /// Canonical name as it appears in URIs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
            Self::Md5 => "MD5",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  otpauth:// URI entity
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The parameters carried by an `otpauth://` key URI.
///
/// Empty strings and zero numbers mean "not present". [`parse_otpauth_uri`]
/// fills algorithm, digits and period with their defaults; values built by
/// hand keep whatever the caller set, and the encoder only emits what is
/// materially present.
///
/// [`parse_otpauth_uri`]: crate::otpauth::uri::parse_otpauth_uri
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OtpAuthUri {
    /// `hotp`, `totp`, or any other token (case preserved).
    pub otp_type: String,
    pub issuer: String,
    pub account: String,
    /// Base32 text exactly as supplied; decoded on demand by [`Self::secret`].
    pub raw_secret: String,
    pub algorithm: String,
    pub digits: u32,
    /// Time step in seconds (TOTP only).
    pub period: u32,
    /// Moving factor (HOTP only).
    pub counter: u64,
}

impl OtpAuthUri {
    /// Create a bare entry with only type and account set.
    pub fn new(otp_type: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            otp_type: otp_type.into(),
            account: account.into(),
            ..Default::default()
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_secret(mut self, raw_secret: impl Into<String>) -> Self {
        self.raw_secret = raw_secret.into();
        self
    }

    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    pub fn with_digits(mut self, digits: u32) -> Self {
        self.digits = digits;
        self
    }

    pub fn with_period(mut self, period: u32) -> Self {
        self.period = period;
        self
    }

    pub fn with_counter(mut self, counter: u64) -> Self {
        self.counter = counter;
        self
    }

    /// Fill absent algorithm, digits and period with their defaults.
    pub fn apply_defaults(&mut self) {
        if self.algorithm.is_empty() {
            self.algorithm = DEFAULT_ALGORITHM.to_string();
        }
        if self.digits == 0 {
            self.digits = DEFAULT_DIGITS;
        }
        if self.period == 0 {
            self.period = DEFAULT_PERIOD;
        }
    }

    pub fn is_hotp(&self) -> bool {
        self.otp_type.eq_ignore_ascii_case("hotp")
    }

    pub fn is_totp(&self) -> bool {
        self.otp_type.eq_ignore_ascii_case("totp")
    }

    /// `issuer:account`, or just the account when there is no issuer.
    pub fn label(&self) -> String {
        if self.issuer.is_empty() {
            self.account.clone()
        } else {
            format!("{}:{}", self.issuer, self.account)
        }
    }

    /// Decode the base32 secret into raw key bytes.
    pub fn secret(&self) -> OtpAuthResult<Vec<u8>> {
        secret::decode_base32(&self.raw_secret)
    }

    /// HOTP code for the stored counter.
    pub fn hotp_code(&self) -> OtpAuthResult<String> {
        let key = self.secret()?;
        code::generate_code(&key, self.counter, &self.algorithm, self.digits)
    }

    /// TOTP code for the time step containing `unix_seconds`.
    pub fn totp_code_at(&self, unix_seconds: u64) -> OtpAuthResult<String> {
        let key = self.secret()?;
        let step = code::time_step_at(unix_seconds, self.period);
        code::generate_code(&key, step, &self.algorithm, self.digits)
    }

    /// TOTP code for the current wall-clock time.
    pub fn totp_code(&self) -> OtpAuthResult<String> {
        self.totp_code_at(code::current_unix_time())
    }
}

impl fmt::Display for OtpAuthUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&uri::build_otpauth_uri(self))
    }
}

impl FromStr for OtpAuthUri {
    type Err = OtpAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uri::parse_otpauth_uri(s)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Migration wire enums
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `OtpParameters.algorithm` (field 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationAlgorithm {
    #[default]
    Unspecified,
    Sha1,
    Sha256,
    Sha512,
    Md5,
}

impl MigrationAlgorithm {
    pub fn from_wire(v: u64) -> Option<Self> {
        match v {
            0 => Some(Self::Unspecified),
            1 => Some(Self::Sha1),
            2 => Some(Self::Sha256),
            3 => Some(Self::Sha512),
            4 => Some(Self::Md5),
            _ => None,
        }
    }

    pub fn wire_value(&self) -> u64 {
        match self {
            Self::Unspecified => 0,
            Self::Sha1 => 1,
            Self::Sha256 => 2,
            Self::Sha512 => 3,
            Self::Md5 => 4,
        }
    }

    /// Concrete algorithm, with unspecified meaning SHA1.
    pub fn resolve(&self) -> Algorithm {
        match self {
            Self::Unspecified | Self::Sha1 => Algorithm::Sha1,
            Self::Sha256 => Algorithm::Sha256,
            Self::Sha512 => Algorithm::Sha512,
            Self::Md5 => Algorithm::Md5,
        }
    }
}

impl From<Algorithm> for MigrationAlgorithm {
    fn from(a: Algorithm) -> Self {
        match a {
            Algorithm::Sha1 => Self::Sha1,
            Algorithm::Sha256 => Self::Sha256,
            Algorithm::Sha512 => Self::Sha512,
            Algorithm::Md5 => Self::Md5,
        }
    }
}

/// `OtpParameters.digits` (field 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationDigits {
    #[default]
    Unspecified,
    Six,
    Eight,
}

impl MigrationDigits {
    pub fn from_wire(v: u64) -> Option<Self> {
        match v {
            0 => Some(Self::Unspecified),
            1 => Some(Self::Six),
            2 => Some(Self::Eight),
            _ => None,
        }
    }

    pub fn wire_value(&self) -> u64 {
        match self {
            Self::Unspecified => 0,
            Self::Six => 1,
            Self::Eight => 2,
        }
    }

    /// Digit count, with unspecified meaning 6.
    pub fn resolve(&self) -> u32 {
        match self {
            Self::Unspecified | Self::Six => DEFAULT_DIGITS,
            Self::Eight => 8,
        }
    }
}

/// `OtpParameters.type` (field 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationOtpType {
    #[default]
    Unspecified,
    Hotp,
    Totp,
}

impl MigrationOtpType {
    pub fn from_wire(v: u64) -> Option<Self> {
        match v {
            0 => Some(Self::Unspecified),
            1 => Some(Self::Hotp),
            2 => Some(Self::Totp),
            _ => None,
        }
    }

    pub fn wire_value(&self) -> u64 {
        match self {
            Self::Unspecified => 0,
            Self::Hotp => 1,
            Self::Totp => 2,
        }
    }

    /// Type name for the URI entity; unspecified has none.
    pub fn resolve(&self) -> &'static str {
        match self {
            Self::Unspecified => "",
            Self::Hotp => "hotp",
            Self::Totp => "totp",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Migration records
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One `OtpParameters` submessage of a migration payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpParameters {
    /// Raw key bytes (not base32).
    pub secret: Vec<u8>,
    /// Account name.
    pub name: String,
    pub issuer: String,
    pub algorithm: MigrationAlgorithm,
    pub digits: MigrationDigits,
    pub otp_type: MigrationOtpType,
    pub counter: u64,
}

/// Envelope bookkeeping. None of it affects how records are rebuilt;
/// the defaults describe a single batch holding everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationBatch {
    pub version: u64,
    pub batch_size: u64,
    pub batch_index: u64,
    pub batch_id: u64,
}

impl Default for MigrationBatch {
    fn default() -> Self {
        Self {
            version: 1,
            batch_size: 1,
            batch_index: 0,
            batch_id: 0,
        }
    }
}

/// A decoded migration buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationPayload {
    /// Records in buffer order.
    pub otp_parameters: Vec<OtpParameters>,
    /// Bookkeeping as read; absent fields are zero.
    pub batch: MigrationBatch,
}
