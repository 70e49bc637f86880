//! otpauth codecs: sub-modules.

pub mod error;
pub mod types;
pub mod wire;
pub mod secret;
pub mod code;
pub mod uri;
pub mod migration;
pub mod migration_url;

// Re-export top-level items for convenience.
pub use error::{OtpAuthError, OtpAuthErrorKind, OtpAuthResult};
pub use types::*;
pub use uri::{build_otpauth_uri, build_otpauth_uris, parse_otpauth_uri, parse_otpauth_uris};
pub use migration::{decode_payload, encode_payload};
pub use migration_url::{
    build_migration_uri, build_migration_uri_with, parse_any, parse_migration_payload,
    parse_migration_uri,
};
pub use secret::{decode_base32, encode_base32};
pub use code::{generate_code, time_step_at};
