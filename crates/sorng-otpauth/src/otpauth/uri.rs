//! `otpauth://` URI parsing and generation per the Google Authenticator
//! key-URI format:
//! <https://github.com/google/google-authenticator/wiki/Key-Uri-Format>
//!
//! Format: `otpauth://TYPE/[ISSUER:]ACCOUNT?secret=S&issuer=I&algorithm=A&digits=D&period=P&counter=C`
//!
//! Parsing is strict: unknown parameters, malformed escapes and empty label
//! parts are errors rather than being skipped.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::str::FromStr;

use crate::otpauth::error::{OtpAuthError, OtpAuthErrorKind, OtpAuthResult};
use crate::otpauth::types::OtpAuthUri;

pub const OTPAUTH_SCHEME: &str = "otpauth";

/// Label segments: unreserved characters plus `$&+:=@` stay literal.
const LABEL_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b':')
    .remove(b'=')
    .remove(b'@');

/// Query values: only unreserved characters stay literal.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Query parameters the grammar recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Param {
    Secret,
    Issuer,
    Algorithm,
    Digits,
    Period,
    Counter,
}

impl Param {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "secret" => Some(Self::Secret),
            "issuer" => Some(Self::Issuer),
            "algorithm" => Some(Self::Algorithm),
            "digits" => Some(Self::Digits),
            "period" => Some(Self::Period),
            "counter" => Some(Self::Counter),
            _ => None,
        }
    }

    fn key(&self) -> &'static str {
        match self {
            Self::Secret => "secret",
            Self::Issuer => "issuer",
            Self::Algorithm => "algorithm",
            Self::Digits => "digits",
            Self::Period => "period",
            Self::Counter => "counter",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Parse
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse an `otpauth://` URI into an [`OtpAuthUri`].
///
/// The scheme is optional: `otpauth://totp/x`, `//totp/x` and `totp/x`
/// parse identically. Absent algorithm, digits and period are defaulted.
pub fn parse_otpauth_uri(input: &str) -> OtpAuthResult<OtpAuthUri> {
    let rest = strip_scheme(input)?;

    let (otp_type, rest) = rest
        .split_once('/')
        .ok_or_else(|| OtpAuthError::invalid_type_or_label("invalid type/label: missing label"))?;
    let (label, query) = match rest.split_once('?') {
        Some((label, query)) => (label, Some(query)),
        None => (rest, None),
    };
    if otp_type.is_empty() {
        return Err(OtpAuthError::invalid_type_or_label(
            "invalid type/label: empty type",
        ));
    }
    if label.is_empty() {
        return Err(OtpAuthError::invalid_type_or_label(
            "invalid type/label: empty label",
        ));
    }

    let (issuer, account) = parse_label(label)?;
    let mut out = OtpAuthUri {
        otp_type: otp_type.to_string(),
        issuer,
        account,
        ..Default::default()
    };
    if let Some(query) = query {
        apply_query(&mut out, query)?;
    }
    out.apply_defaults();

    log::debug!(
        "parsed otpauth URI: type={} issuer={:?} account={:?}",
        out.otp_type,
        out.issuer,
        out.account
    );
    Ok(out)
}

/// Parse multiple URIs (one per line), skipping blanks and comments.
pub fn parse_otpauth_uris(text: &str) -> Vec<OtpAuthResult<OtpAuthUri>> {
    text.lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(parse_otpauth_uri)
        .collect()
}

/// Drop an optional `otpauth://` or bare `//` prefix.
fn strip_scheme(input: &str) -> OtpAuthResult<&str> {
    if let Some((scheme, rest)) = input.split_once("://") {
        if is_scheme_token(scheme) {
            if scheme != OTPAUTH_SCHEME {
                return Err(OtpAuthError::invalid_scheme(scheme));
            }
            return Ok(rest);
        }
    }
    Ok(input.strip_prefix("//").unwrap_or(input))
}

/// RFC 3986: `ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )`.
fn is_scheme_token(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Split `ISSUER:ACCOUNT` (or bare `ACCOUNT`) and decode both parts.
fn parse_label(label: &str) -> OtpAuthResult<(String, String)> {
    check_escapes(label, "label")?;

    let Some((idx, sep_len)) = find_colon(label) else {
        let account = unescape_path(label, "label")?;
        if account.is_empty() {
            return Err(empty_account());
        }
        return Ok((String::new(), account));
    };

    let issuer = unescape_path(&label[..idx], "label issuer")?;
    let mut rest = &label[idx + sep_len..];
    loop {
        if let Some(r) = rest.strip_prefix(' ') {
            rest = r;
        } else if let Some(r) = rest.strip_prefix("%20") {
            rest = r;
        } else {
            break;
        }
    }
    let account = unescape_path(rest, "label account")?;

    if account.is_empty() {
        return Err(empty_account());
    }
    if issuer.is_empty() {
        return Err(OtpAuthError::new(
            OtpAuthErrorKind::EmptyIssuer,
            format!("empty issuer in label {:?}", label),
        ));
    }
    Ok((issuer, account))
}

fn empty_account() -> OtpAuthError {
    OtpAuthError::new(OtpAuthErrorKind::EmptyAccountName, "empty account name")
}

/// Byte offset and width of the first literal or `%3A`-encoded colon.
fn find_colon(label: &str) -> Option<(usize, usize)> {
    let bytes = label.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b':' => return Some((i, 1)),
            b'%' => {
                if label
                    .get(i + 1..i + 3)
                    .map(|h| h.eq_ignore_ascii_case("3a"))
                    .unwrap_or(false)
                {
                    return Some((i, 3));
                }
                i += 3;
            }
            _ => i += 1,
        }
    }
    None
}

/// Two-pass query handling: every key is vetted before any value is read,
/// so an unknown key is reported regardless of what the other values hold.
fn apply_query(out: &mut OtpAuthUri, query: &str) -> OtpAuthResult<()> {
    let mut params: Vec<(Param, &str)> = Vec::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = unescape_query(raw_key, "query key")?;
        let param = Param::from_key(&key).ok_or_else(|| OtpAuthError::invalid_parameter(&key))?;
        // First occurrence wins.
        if params.iter().all(|(p, _)| *p != param) {
            params.push((param, raw_value));
        }
    }

    for (param, raw) in params {
        match param {
            Param::Secret => out.raw_secret = unescape_query(raw, "secret")?,
            Param::Issuer => {
                let issuer = unescape_query(raw, "issuer")?;
                if issuer.is_empty() {
                    continue;
                }
                if !out.issuer.is_empty() && out.issuer != issuer {
                    log::warn!(
                        "label issuer {:?} differs from issuer parameter {:?}",
                        out.issuer,
                        issuer
                    );
                }
                out.issuer = issuer;
            }
            Param::Algorithm => {
                out.algorithm = unescape_query(raw, "algorithm")
                    .map_err(|_| OtpAuthError::invalid_value("algorithm", raw))?;
            }
            Param::Digits => out.digits = parse_int(param, raw)?,
            Param::Period => out.period = parse_int(param, raw)?,
            Param::Counter => out.counter = parse_int(param, raw)?,
        }
    }
    Ok(())
}

/// Base-10, digits only (no sign, no whitespace).
fn parse_int<T: FromStr>(param: Param, raw: &str) -> OtpAuthResult<T> {
    let text = unescape_query(raw, param.key())?;
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(OtpAuthError::invalid_integer(param.key(), &text));
    }
    text.parse::<T>()
        .map_err(|_| OtpAuthError::invalid_integer(param.key(), &text))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Generate
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Generate the canonical `otpauth://` URI for an [`OtpAuthUri`].
///
/// Parameters appear in alphabetical order and only when present; `counter`
/// is always written for HOTP, even when zero.
pub fn build_otpauth_uri(uri: &OtpAuthUri) -> String {
    let mut out = format!("{}://{}/", OTPAUTH_SCHEME, uri.otp_type);
    if !uri.issuer.is_empty() {
        out.push_str(&encode_label(&uri.issuer));
        out.push(':');
    }
    out.push_str(&encode_label(&uri.account));

    let mut params: Vec<(&str, String)> = Vec::new();
    if !uri.algorithm.is_empty() {
        params.push(("algorithm", uri.algorithm.to_ascii_uppercase()));
    }
    if uri.is_hotp() {
        params.push(("counter", uri.counter.to_string()));
    }
    if uri.digits != 0 {
        params.push(("digits", uri.digits.to_string()));
    }
    if !uri.issuer.is_empty() {
        params.push(("issuer", uri.issuer.clone()));
    }
    if uri.period != 0 {
        params.push(("period", uri.period.to_string()));
    }
    if !uri.raw_secret.is_empty() {
        params.push(("secret", uri.raw_secret.clone()));
    }

    if !params.is_empty() {
        out.push('?');
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, encode_query(v)))
            .collect::<Vec<_>>()
            .join("&");
        out.push_str(&query);
    }
    out
}

/// Generate URIs for multiple entries (one per line).
pub fn build_otpauth_uris(uris: &[OtpAuthUri]) -> String {
    uris.iter()
        .map(build_otpauth_uri)
        .collect::<Vec<_>>()
        .join("\n")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  URL encoding helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn encode_label(s: &str) -> String {
    utf8_percent_encode(s, LABEL_ENCODE_SET).to_string()
}

fn encode_query(s: &str) -> String {
    utf8_percent_encode(s, QUERY_ENCODE_SET).to_string()
}

/// Every `%` must introduce two hex digits.
fn check_escapes(s: &str, field: &str) -> OtpAuthResult<()> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let ok = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !ok {
                let end = (i + 3).min(bytes.len());
                return Err(OtpAuthError::invalid_escape(
                    field,
                    &String::from_utf8_lossy(&bytes[i..end]),
                ));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}

/// Path-style unescape: `+` is literal.
fn unescape_path(s: &str, field: &str) -> OtpAuthResult<String> {
    check_escapes(s, field)?;
    percent_decode_str(s)
        .decode_utf8()
        .map(|c| c.into_owned())
        .map_err(|e| OtpAuthError::invalid_escape(field, s).with_detail(e.to_string()))
}

/// Form-style unescape: `+` is a space.
fn unescape_query(s: &str, field: &str) -> OtpAuthResult<String> {
    unescape_path(&s.replace('+', " "), field)
}
