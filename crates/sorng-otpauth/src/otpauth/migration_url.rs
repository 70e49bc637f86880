//! `otpauth-migration://offline?data=…` envelope.
//!
//! The `data` parameter is a percent-encoded, base64-encoded migration
//! buffer (see [`migration`](crate::otpauth::migration)).

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::otpauth::error::{OtpAuthError, OtpAuthErrorKind, OtpAuthResult};
use crate::otpauth::migration::{decode_payload, encode_payload};
use crate::otpauth::types::{MigrationBatch, MigrationPayload, OtpAuthUri};
use crate::otpauth::uri::parse_otpauth_uris;

pub const MIGRATION_SCHEME: &str = "otpauth-migration";
pub const MIGRATION_HOST: &str = "offline";
const DATA_PARAM: &str = "data";

/// Standard alphabet; accepts input with or without `=` padding.
const BASE64_ANY_PADDING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const DATA_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Decode
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Decode a migration URI into entities, in payload order.
pub fn parse_migration_uri(input: &str) -> OtpAuthResult<Vec<OtpAuthUri>> {
    parse_migration_payload(input).map(MigrationPayload::into_uris)
}

/// Decode a migration URI, keeping the raw records and batch fields.
pub fn parse_migration_payload(input: &str) -> OtpAuthResult<MigrationPayload> {
    let url = Url::parse(input.trim()).map_err(|e| match e {
        url::ParseError::RelativeUrlWithoutBase => {
            OtpAuthError::invalid_scheme("").with_detail(e.to_string())
        }
        _ => OtpAuthError::invalid_value("migration URI", input).with_detail(e.to_string()),
    })?;

    if url.scheme() != MIGRATION_SCHEME {
        return Err(OtpAuthError::invalid_scheme(url.scheme()));
    }
    match url.host_str() {
        Some(MIGRATION_HOST) => {}
        other => {
            return Err(OtpAuthError::invalid_type_or_label(format!(
                "invalid type/label: expected host {:?}, got {:?}",
                MIGRATION_HOST,
                other.unwrap_or("")
            )))
        }
    }

    let raw = single_data_param(url.query().unwrap_or(""))?;
    let text = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|e| OtpAuthError::invalid_escape(DATA_PARAM, raw).with_detail(e.to_string()))?;
    let buf = BASE64_ANY_PADDING
        .decode(text.as_bytes())
        .map_err(|e| OtpAuthError::invalid_value(DATA_PARAM, &text).with_detail(e.to_string()))?;

    decode_payload(&buf)
}

/// Raw value of the one and only `data` parameter.
fn single_data_param(query: &str) -> OtpAuthResult<&str> {
    let mut data = None;
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key != DATA_PARAM {
            return Err(OtpAuthError::invalid_parameter(key));
        }
        if data.replace(value).is_some() {
            return Err(OtpAuthError::new(
                OtpAuthErrorKind::InvalidParameter,
                "invalid parameter \"data\": given more than once",
            ));
        }
    }
    data.ok_or_else(|| {
        OtpAuthError::new(
            OtpAuthErrorKind::InvalidParameter,
            "invalid parameter \"data\": missing",
        )
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Encode
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Encode entities as a single-batch migration URI.
pub fn build_migration_uri(uris: &[OtpAuthUri]) -> OtpAuthResult<String> {
    build_migration_uri_with(uris, &MigrationBatch::default())
}

/// Encode entities as a migration URI with explicit batch fields.
pub fn build_migration_uri_with(
    uris: &[OtpAuthUri],
    batch: &MigrationBatch,
) -> OtpAuthResult<String> {
    let buf = encode_payload(uris, batch)?;
    let data = STANDARD.encode(buf);
    Ok(format!(
        "{}://{}?{}={}",
        MIGRATION_SCHEME,
        MIGRATION_HOST,
        DATA_PARAM,
        utf8_percent_encode(&data, DATA_ENCODE_SET)
    ))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Format detection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Decode either a migration URI or newline-separated `otpauth` URIs.
///
/// For the line-based form the first failing line aborts the whole input.
pub fn parse_any(text: &str) -> OtpAuthResult<Vec<OtpAuthUri>> {
    let trimmed = text.trim();
    let is_migration = trimmed
        .get(..MIGRATION_SCHEME.len() + 3)
        .map(|p| p.eq_ignore_ascii_case("otpauth-migration://"))
        .unwrap_or(false);
    if is_migration {
        log::debug!("detected otpauth-migration payload");
        return parse_migration_uri(trimmed);
    }
    parse_otpauth_uris(trimmed).into_iter().collect()
}
