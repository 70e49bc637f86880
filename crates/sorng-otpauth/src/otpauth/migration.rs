//! Google Authenticator migration payload (`MigrationPayload` protobuf).
//!
//! Schema:
//! ```text
//! MigrationPayload
//!   1: repeated OtpParameters
//!   2: version      3: batch_size
//!   4: batch_index  5: batch_id
//! OtpParameters
//!   1: secret (bytes)   2: name      3: issuer
//!   4: algorithm (0=unspecified,1=SHA1,2=SHA256,3=SHA512,4=MD5)
//!   5: digits    (0=unspecified,1=SIX,2=EIGHT)
//!   6: type      (0=unspecified,1=HOTP,2=TOTP)
//!   7: counter
//! ```

use crate::otpauth::error::{OtpAuthError, OtpAuthResult};
use crate::otpauth::secret::{decode_base32, encode_base32};
use crate::otpauth::types::{
    Algorithm, MigrationAlgorithm, MigrationBatch, MigrationDigits, MigrationOtpType,
    MigrationPayload, OtpAuthUri, OtpParameters, DEFAULT_PERIOD,
};
use crate::otpauth::wire::{expect_wire_type, WireReader, WireType, WireWriter};

// Outer message.
const PAYLOAD_OTP_PARAMETERS: u32 = 1;
const PAYLOAD_VERSION: u32 = 2;
const PAYLOAD_BATCH_SIZE: u32 = 3;
const PAYLOAD_BATCH_INDEX: u32 = 4;
const PAYLOAD_BATCH_ID: u32 = 5;

// OtpParameters.
const PARAM_SECRET: u32 = 1;
const PARAM_NAME: u32 = 2;
const PARAM_ISSUER: u32 = 3;
const PARAM_ALGORITHM: u32 = 4;
const PARAM_DIGITS: u32 = 5;
const PARAM_TYPE: u32 = 6;
const PARAM_COUNTER: u32 = 7;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Decode
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Decode a raw migration buffer into its records, in buffer order.
///
/// Unknown fields are skipped. Bookkeeping fields that are absent read as 0.
pub fn decode_payload(buf: &[u8]) -> OtpAuthResult<MigrationPayload> {
    let mut r = WireReader::new(buf);
    let mut payload = MigrationPayload {
        otp_parameters: Vec::new(),
        batch: MigrationBatch {
            version: 0,
            batch_size: 0,
            batch_index: 0,
            batch_id: 0,
        },
    };

    while !r.is_empty() {
        let (field, wire_type) = r.read_tag()?;
        match field {
            PAYLOAD_OTP_PARAMETERS => {
                expect_wire_type(field, wire_type, WireType::LengthDelimited)?;
                let sub = r.read_bytes()?;
                payload.otp_parameters.push(decode_otp_parameters(sub)?);
            }
            PAYLOAD_VERSION => {
                payload.batch.version = read_varint_field(&mut r, field, wire_type)?
            }
            PAYLOAD_BATCH_SIZE => {
                payload.batch.batch_size = read_varint_field(&mut r, field, wire_type)?
            }
            PAYLOAD_BATCH_INDEX => {
                payload.batch.batch_index = read_varint_field(&mut r, field, wire_type)?
            }
            PAYLOAD_BATCH_ID => {
                payload.batch.batch_id = read_varint_field(&mut r, field, wire_type)?
            }
            _ => {
                log::trace!("skipping unknown payload field {} ({:?})", field, wire_type);
                r.skip_field(wire_type)?;
            }
        }
    }

    log::debug!(
        "decoded migration payload: {} record(s), batch {}/{}",
        payload.otp_parameters.len(),
        payload.batch.batch_index,
        payload.batch.batch_size
    );
    Ok(payload)
}

fn decode_otp_parameters(buf: &[u8]) -> OtpAuthResult<OtpParameters> {
    let mut r = WireReader::new(buf);
    let mut out = OtpParameters::default();

    while !r.is_empty() {
        let (field, wire_type) = r.read_tag()?;
        match field {
            PARAM_SECRET => {
                expect_wire_type(field, wire_type, WireType::LengthDelimited)?;
                out.secret = r.read_bytes()?.to_vec();
            }
            PARAM_NAME => {
                expect_wire_type(field, wire_type, WireType::LengthDelimited)?;
                out.name = r.read_string("name")?;
            }
            PARAM_ISSUER => {
                expect_wire_type(field, wire_type, WireType::LengthDelimited)?;
                out.issuer = r.read_string("issuer")?;
            }
            PARAM_ALGORITHM => {
                let v = read_varint_field(&mut r, field, wire_type)?;
                out.algorithm = MigrationAlgorithm::from_wire(v)
                    .ok_or_else(|| out_of_range("algorithm", v))?;
            }
            PARAM_DIGITS => {
                let v = read_varint_field(&mut r, field, wire_type)?;
                out.digits =
                    MigrationDigits::from_wire(v).ok_or_else(|| out_of_range("digits", v))?;
            }
            PARAM_TYPE => {
                let v = read_varint_field(&mut r, field, wire_type)?;
                out.otp_type =
                    MigrationOtpType::from_wire(v).ok_or_else(|| out_of_range("type", v))?;
            }
            PARAM_COUNTER => out.counter = read_varint_field(&mut r, field, wire_type)?,
            _ => {
                log::trace!("skipping unknown OtpParameters field {} ({:?})", field, wire_type);
                r.skip_field(wire_type)?;
            }
        }
    }
    Ok(out)
}

fn read_varint_field(
    r: &mut WireReader<'_>,
    field: u32,
    wire_type: WireType,
) -> OtpAuthResult<u64> {
    expect_wire_type(field, wire_type, WireType::Varint)?;
    r.read_varint()
}

fn out_of_range(field: &str, value: u64) -> OtpAuthError {
    OtpAuthError::malformed(format!("{} enum value {} out of range", field, value))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Record ⇄ entity mapping
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl OtpParameters {
    /// Map onto a URI entity, resolving unspecified enums to their defaults.
    /// The wire schema has no period, so it is always 30.
    pub fn into_uri(self) -> OtpAuthUri {
        OtpAuthUri {
            otp_type: self.otp_type.resolve().to_string(),
            issuer: self.issuer,
            account: self.name,
            raw_secret: encode_base32(&self.secret),
            algorithm: self.algorithm.resolve().name().to_string(),
            digits: self.digits.resolve(),
            period: DEFAULT_PERIOD,
            counter: self.counter,
        }
    }

    /// Validate an entity against what the wire schema can carry.
    ///
    /// Checked in order: type, algorithm, digit count, secret.
    pub fn try_from_uri(uri: &OtpAuthUri) -> OtpAuthResult<Self> {
        let otp_type = if uri.otp_type.is_empty() {
            MigrationOtpType::Unspecified
        } else if uri.is_hotp() {
            MigrationOtpType::Hotp
        } else if uri.is_totp() {
            MigrationOtpType::Totp
        } else {
            return Err(OtpAuthError::unknown_type(&uri.otp_type));
        };

        let algorithm = if uri.algorithm.is_empty() {
            MigrationAlgorithm::Unspecified
        } else {
            Algorithm::from_name(&uri.algorithm)
                .map(MigrationAlgorithm::from)
                .ok_or_else(|| OtpAuthError::unsupported_algorithm(&uri.algorithm))?
        };

        let digits = match uri.digits {
            0 => MigrationDigits::Unspecified,
            6 => MigrationDigits::Six,
            8 => MigrationDigits::Eight,
            other => return Err(OtpAuthError::unsupported_digits(other)),
        };

        let secret = if uri.raw_secret.is_empty() {
            Vec::new()
        } else {
            decode_base32(&uri.raw_secret)?
        };

        Ok(Self {
            secret,
            name: uri.account.clone(),
            issuer: uri.issuer.clone(),
            algorithm,
            digits,
            otp_type,
            counter: uri.counter,
        })
    }
}

impl From<OtpParameters> for OtpAuthUri {
    fn from(p: OtpParameters) -> Self {
        p.into_uri()
    }
}

impl TryFrom<&OtpAuthUri> for OtpParameters {
    type Error = OtpAuthError;

    fn try_from(uri: &OtpAuthUri) -> Result<Self, Self::Error> {
        Self::try_from_uri(uri)
    }
}

impl MigrationPayload {
    /// Records mapped onto URI entities, in buffer order.
    pub fn into_uris(self) -> Vec<OtpAuthUri> {
        self.otp_parameters
            .into_iter()
            .map(OtpParameters::into_uri)
            .collect()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Encode
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Encode entities as a migration buffer.
///
/// Every entity is validated before anything is written, so a failure never
/// yields a partial buffer. Zero-valued fields are omitted.
pub fn encode_payload(uris: &[OtpAuthUri], batch: &MigrationBatch) -> OtpAuthResult<Vec<u8>> {
    let records = uris
        .iter()
        .map(OtpParameters::try_from_uri)
        .collect::<OtpAuthResult<Vec<_>>>()?;

    let mut w = WireWriter::new();
    for record in &records {
        w.write_message(PAYLOAD_OTP_PARAMETERS, &encode_otp_parameters(record));
    }
    for (field, value) in [
        (PAYLOAD_VERSION, batch.version),
        (PAYLOAD_BATCH_SIZE, batch.batch_size),
        (PAYLOAD_BATCH_INDEX, batch.batch_index),
        (PAYLOAD_BATCH_ID, batch.batch_id),
    ] {
        if value != 0 {
            w.write_varint_field(field, value);
        }
    }

    log::debug!(
        "encoded migration payload: {} record(s), {} bytes",
        records.len(),
        w.len()
    );
    Ok(w.into_bytes())
}

fn encode_otp_parameters(p: &OtpParameters) -> WireWriter {
    let mut w = WireWriter::new();
    if !p.secret.is_empty() {
        w.write_bytes_field(PARAM_SECRET, &p.secret);
    }
    if !p.name.is_empty() {
        w.write_bytes_field(PARAM_NAME, p.name.as_bytes());
    }
    if !p.issuer.is_empty() {
        w.write_bytes_field(PARAM_ISSUER, p.issuer.as_bytes());
    }
    for (field, value) in [
        (PARAM_ALGORITHM, p.algorithm.wire_value()),
        (PARAM_DIGITS, p.digits.wire_value()),
        (PARAM_TYPE, p.otp_type.wire_value()),
        (PARAM_COUNTER, p.counter),
    ] {
        if value != 0 {
            w.write_varint_field(field, value);
        }
    }
    w
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otpauth::error::OtpAuthErrorKind;

    /// Two records (hotp "test 1", totp "test 2") plus version 2, batch 0 of 1.
    const SAMPLE: &[u8] = &[
        0x0a, 0x21, //
        0x0a, 0x0f, 0x2d, 0x33, 0x95, 0x90, 0x34, 0xce, 0x56, 0x43, 0x20, 0x21, 0x59, 0x06,
        0x80, 0x85, 0x64, //
        0x12, 0x06, b't', b'e', b's', b't', b' ', b'1', //
        0x20, 0x01, 0x28, 0x01, 0x30, 0x01, 0x38, 0x03, //
        0x0a, 0x1a, //
        0x0a, 0x0a, 0x03, 0xde, 0xb2, 0x3d, 0x04, 0x44, 0x9e, 0x40, 0x08, 0xf8, //
        0x12, 0x06, b't', b'e', b's', b't', b' ', b'2', //
        0x20, 0x01, 0x28, 0x01, 0x30, 0x02, //
        0x10, 0x02, 0x18, 0x01, 0x20, 0x00,
    ];

    fn kind_of(uri: OtpAuthUri) -> OtpAuthErrorKind {
        encode_payload(&[uri], &MigrationBatch::default())
            .unwrap_err()
            .kind
    }

    // ── Decode ───────────────────────────────────────────────────

    #[test]
    fn decode_sample_records() {
        let payload = decode_payload(SAMPLE).unwrap();
        assert_eq!(payload.otp_parameters.len(), 2);

        let first = &payload.otp_parameters[0];
        assert_eq!(first.name, "test 1");
        assert_eq!(first.algorithm, MigrationAlgorithm::Sha1);
        assert_eq!(first.digits, MigrationDigits::Six);
        assert_eq!(first.otp_type, MigrationOtpType::Hotp);
        assert_eq!(first.counter, 3);

        let second = &payload.otp_parameters[1];
        assert_eq!(second.name, "test 2");
        assert_eq!(second.otp_type, MigrationOtpType::Totp);
        assert_eq!(second.counter, 0);
    }

    #[test]
    fn decode_sample_batch_fields() {
        let payload = decode_payload(SAMPLE).unwrap();
        assert_eq!(
            payload.batch,
            MigrationBatch {
                version: 2,
                batch_size: 1,
                batch_index: 0,
                batch_id: 0,
            }
        );
    }

    #[test]
    fn decode_sample_maps_to_entities() {
        let uris = decode_payload(SAMPLE).unwrap().into_uris();
        assert_eq!(
            uris[0],
            OtpAuthUri::new("hotp", "test 1")
                .with_secret("FUZZLEBUZZLEGIBBLEDIBBLE")
                .with_algorithm("SHA1")
                .with_digits(6)
                .with_period(30)
                .with_counter(3)
        );
        assert_eq!(
            uris[1],
            OtpAuthUri::new("totp", "test 2")
                .with_secret("APPLEPIEISPEACHY")
                .with_algorithm("SHA1")
                .with_digits(6)
                .with_period(30)
        );
    }

    #[test]
    fn decode_empty_buffer() {
        let payload = decode_payload(&[]).unwrap();
        assert!(payload.otp_parameters.is_empty());
        assert_eq!(payload.batch.version, 0);
    }

    #[test]
    fn unspecified_fields_resolve_to_defaults() {
        // A record holding only a name.
        let payload = decode_payload(&[0x0a, 0x03, 0x12, 0x01, b'x']).unwrap();
        let uri = payload.into_uris().remove(0);
        assert_eq!(uri.otp_type, "");
        assert_eq!(uri.account, "x");
        assert_eq!(uri.raw_secret, "");
        assert_eq!(uri.algorithm, "SHA1");
        assert_eq!(uri.digits, 6);
        assert_eq!(uri.period, 30);
    }

    #[test]
    fn decode_eight_digits_and_md5() {
        let payload = decode_payload(&[0x0a, 0x04, 0x20, 0x04, 0x28, 0x02]).unwrap();
        let uri = payload.into_uris().remove(0);
        assert_eq!(uri.algorithm, "MD5");
        assert_eq!(uri.digits, 8);
    }

    #[test]
    fn decode_skips_unknown_fields() {
        let data = [
            0x0a, 0x07, // record, 7 bytes
            0x48, 0x05, // inner field 9 varint (unknown)
            0x12, 0x01, b'y', // name
            0x50, 0x00, // inner field 10 varint (unknown)
            0x32, 0x02, b'h', b'i', // outer field 6 bytes (unknown)
            0x3d, 1, 2, 3, 4, // outer field 7 fixed32 (unknown)
        ];
        let payload = decode_payload(&data).unwrap();
        assert_eq!(payload.otp_parameters.len(), 1);
        assert_eq!(payload.otp_parameters[0].name, "y");
    }

    // ── Decode errors ────────────────────────────────────────────

    #[test]
    fn decode_truncated_submessage() {
        let err = decode_payload(&SAMPLE[..10]).unwrap_err();
        assert_eq!(err.kind, OtpAuthErrorKind::MalformedWireFormat);
    }

    #[test]
    fn decode_truncated_varint() {
        let err = decode_payload(&[0x10, 0x80]).unwrap_err();
        assert_eq!(err.kind, OtpAuthErrorKind::MalformedWireFormat);
    }

    #[test]
    fn decode_group_wire_type_rejected() {
        let err = decode_payload(&[0x0b]).unwrap_err();
        assert_eq!(err.kind, OtpAuthErrorKind::MalformedWireFormat);
    }

    #[test]
    fn decode_out_of_range_enums_rejected() {
        for data in [
            [0x0a, 0x02, 0x20, 0x05], // algorithm 5
            [0x0a, 0x02, 0x28, 0x03], // digits 3
            [0x0a, 0x02, 0x30, 0x03], // type 3
        ] {
            let err = decode_payload(&data).unwrap_err();
            assert_eq!(err.kind, OtpAuthErrorKind::MalformedWireFormat);
            assert!(err.message.contains("out of range"));
        }
    }

    #[test]
    fn decode_wrong_wire_type_for_known_field() {
        // name (field 2) sent as a varint
        let err = decode_payload(&[0x0a, 0x02, 0x10, 0x01]).unwrap_err();
        assert_eq!(err.kind, OtpAuthErrorKind::MalformedWireFormat);
        // records (field 1) sent as a varint
        assert!(decode_payload(&[0x08, 0x01]).is_err());
    }

    #[test]
    fn decode_invalid_utf8_name() {
        let err = decode_payload(&[0x0a, 0x04, 0x12, 0x02, 0xc3, 0x28]).unwrap_err();
        assert_eq!(err.kind, OtpAuthErrorKind::MalformedWireFormat);
    }

    // ── Encode ───────────────────────────────────────────────────

    #[test]
    fn encode_sample_records_bit_exact() {
        let uris = decode_payload(SAMPLE).unwrap().into_uris();
        let batch = MigrationBatch {
            version: 2,
            batch_size: 1,
            batch_index: 0,
            batch_id: 0,
        };
        let encoded = encode_payload(&uris, &batch).unwrap();
        // Identical except the explicit batch_index = 0 the producer wrote.
        assert_eq!(encoded, SAMPLE[..SAMPLE.len() - 2].to_vec());
    }

    #[test]
    fn encode_omits_zero_fields() {
        let uri = OtpAuthUri::new("", "a");
        let batch = MigrationBatch {
            version: 0,
            batch_size: 0,
            batch_index: 0,
            batch_id: 0,
        };
        let encoded = encode_payload(&[uri], &batch).unwrap();
        assert_eq!(encoded, vec![0x0a, 0x03, 0x12, 0x01, b'a']);
    }

    #[test]
    fn encode_default_batch() {
        let encoded = encode_payload(&[], &MigrationBatch::default()).unwrap();
        assert_eq!(encoded, vec![0x10, 0x01, 0x18, 0x01]);
    }

    #[test]
    fn encode_accepts_mixed_case() {
        let uri = OtpAuthUri::new("TOTP", "a").with_algorithm("sha512").with_digits(8);
        let record = OtpParameters::try_from_uri(&uri).unwrap();
        assert_eq!(record.otp_type, MigrationOtpType::Totp);
        assert_eq!(record.algorithm, MigrationAlgorithm::Sha512);
        assert_eq!(record.digits, MigrationDigits::Eight);
    }

    #[test]
    fn encode_decode_preserves_order_and_fields() {
        let uris = vec![
            OtpAuthUri::new("totp", "first")
                .with_issuer("Acme")
                .with_secret("JBSWY3DPEHPK3PXP")
                .with_algorithm("SHA256")
                .with_digits(8)
                .with_period(30),
            OtpAuthUri::new("hotp", "second")
                .with_secret("MFRGG")
                .with_algorithm("MD5")
                .with_digits(6)
                .with_period(30)
                .with_counter(u64::MAX),
        ];
        let encoded = encode_payload(&uris, &MigrationBatch::default()).unwrap();
        let payload = decode_payload(&encoded).unwrap();
        assert_eq!(payload.batch, MigrationBatch::default());
        assert_eq!(payload.into_uris(), uris);
    }

    // ── Encode errors ────────────────────────────────────────────

    #[test]
    fn encode_rejects_unknown_type() {
        assert_eq!(kind_of(OtpAuthUri::new("bogus", "a")), OtpAuthErrorKind::UnknownType);
    }

    #[test]
    fn encode_rejects_unsupported_algorithm() {
        let uri = OtpAuthUri::new("totp", "a").with_algorithm("wat");
        assert_eq!(kind_of(uri), OtpAuthErrorKind::UnsupportedAlgorithm);
    }

    #[test]
    fn encode_rejects_unsupported_digits() {
        for digits in [7, 12] {
            let uri = OtpAuthUri::new("totp", "a").with_digits(digits);
            assert_eq!(kind_of(uri), OtpAuthErrorKind::UnsupportedDigitCount);
        }
    }

    #[test]
    fn encode_rejects_illegal_base32() {
        let uri = OtpAuthUri::new("totp", "a").with_secret("*****");
        let err = encode_payload(&[uri], &MigrationBatch::default()).unwrap_err();
        assert_eq!(err.kind, OtpAuthErrorKind::IllegalBase32Data);
        assert!(err.detail.is_some());
    }

    #[test]
    fn encode_validation_order() {
        // Type is checked before algorithm, algorithm before digits.
        let uri = OtpAuthUri::new("bogus", "a")
            .with_algorithm("wat")
            .with_digits(12)
            .with_secret("*****");
        assert_eq!(kind_of(uri.clone()), OtpAuthErrorKind::UnknownType);
        assert_eq!(
            kind_of(uri.clone().with_algorithm("")),
            OtpAuthErrorKind::UnknownType
        );
        let mut uri = uri;
        uri.otp_type = "totp".into();
        assert_eq!(kind_of(uri.clone()), OtpAuthErrorKind::UnsupportedAlgorithm);
        assert_eq!(
            kind_of(uri.clone().with_algorithm("SHA1")),
            OtpAuthErrorKind::UnsupportedDigitCount
        );
        assert_eq!(
            kind_of(uri.with_algorithm("SHA1").with_digits(6)),
            OtpAuthErrorKind::IllegalBase32Data
        );
    }

    #[test]
    fn failing_entity_anywhere_fails_whole_batch() {
        let uris = vec![OtpAuthUri::new("totp", "ok"), OtpAuthUri::new("bogus", "bad")];
        assert!(encode_payload(&uris, &MigrationBatch::default()).is_err());
    }
}
