//! # SortOfRemote NG – otpauth URIs & Migration Payloads
//!
//! Codecs for the two textual forms authenticator apps use to move OTP
//! credentials around:
//!
//! - **otpauth:// URIs** – Strict parser and canonical encoder for the
//!   Key-Uri-Format (`otpauth://TYPE/[ISSUER:]ACCOUNT?...`)
//! - **Migration payloads** – `otpauth-migration://offline?data=…` batches,
//!   decoded and encoded with a hand-written protobuf wire codec
//! - **Secrets** – Base32 decoding/encoding of shared keys
//! - **Code generation** – RFC 4226 / 6238 HOTP & TOTP from a parsed URI

pub mod otpauth;
