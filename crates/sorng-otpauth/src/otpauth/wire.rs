//! Protobuf-compatible tag/length/value wire codec.
//!
//! Only what the migration schema needs: varints, length-delimited byte
//! strings and nested messages. Fixed32/fixed64 are understood solely so
//! that unknown fields using them can be skipped.

use bytes::{BufMut, BytesMut};

use crate::otpauth::error::{OtpAuthError, OtpAuthResult};

/// A 64-bit varint never needs more than 10 groups of 7 bits.
pub const MAX_VARINT_LEN: usize = 10;

/// Largest field number the tag encoding allows.
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// Wire type carried in the low three bits of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Varint,
    Fixed64,
    LengthDelimited,
    Fixed32,
}

impl WireType {
    /// Groups (3, 4) and the unassigned values 6 and 7 are rejected.
    pub fn from_bits(bits: u64) -> OtpAuthResult<Self> {
        match bits {
            0 => Ok(Self::Varint),
            1 => Ok(Self::Fixed64),
            2 => Ok(Self::LengthDelimited),
            5 => Ok(Self::Fixed32),
            other => Err(OtpAuthError::malformed(format!(
                "unsupported wire type {}",
                other
            ))),
        }
    }

    pub fn bits(&self) -> u64 {
        match self {
            Self::Varint => 0,
            Self::Fixed64 => 1,
            Self::LengthDelimited => 2,
            Self::Fixed32 => 5,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Reader
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Forward-only cursor over an encoded message.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// `true` once every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Little-endian base-128 varint.
    pub fn read_varint(&mut self) -> OtpAuthResult<u64> {
        let start = self.pos;
        let mut result: u64 = 0;
        for i in 0..MAX_VARINT_LEN {
            let byte = match self.buf.get(self.pos) {
                Some(b) => *b,
                None => {
                    return Err(OtpAuthError::malformed(format!(
                        "truncated varint at offset {}",
                        start
                    )))
                }
            };
            self.pos += 1;
            // The tenth group holds only the top bit of a u64.
            if i == MAX_VARINT_LEN - 1 && byte > 1 {
                return Err(OtpAuthError::malformed(format!(
                    "overlong varint at offset {}",
                    start
                )));
            }
            result |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(OtpAuthError::malformed(format!(
            "overlong varint at offset {}",
            start
        )))
    }

    /// Field number and wire type of the next field.
    pub fn read_tag(&mut self) -> OtpAuthResult<(u32, WireType)> {
        let key = self.read_varint()?;
        let field = key >> 3;
        if field == 0 || field > u64::from(MAX_FIELD_NUMBER) {
            return Err(OtpAuthError::malformed(format!(
                "invalid field number {}",
                field
            )));
        }
        let wire_type = WireType::from_bits(key & 0x07)?;
        Ok((field as u32, wire_type))
    }

    /// Length-delimited payload; the length prefix is itself a varint.
    pub fn read_bytes(&mut self) -> OtpAuthResult<&'a [u8]> {
        let len = self.read_varint()?;
        let len = usize::try_from(len).map_err(|_| {
            OtpAuthError::malformed(format!("length {} does not fit in memory", len))
        })?;
        self.take(len)
    }

    /// Length-delimited UTF-8 text.
    pub fn read_string(&mut self, field: &str) -> OtpAuthResult<String> {
        let raw = self.read_bytes()?;
        String::from_utf8(raw.to_vec()).map_err(|e| {
            OtpAuthError::malformed(format!("{} is not valid UTF-8", field))
                .with_detail(e.to_string())
        })
    }

    /// Discard the value of a field whose tag has already been read.
    pub fn skip_field(&mut self, wire_type: WireType) -> OtpAuthResult<()> {
        match wire_type {
            WireType::Varint => self.read_varint().map(|_| ()),
            WireType::Fixed64 => self.take(8).map(|_| ()),
            WireType::LengthDelimited => self.read_bytes().map(|_| ()),
            WireType::Fixed32 => self.take(4).map(|_| ()),
        }
    }

    fn take(&mut self, n: usize) -> OtpAuthResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(OtpAuthError::malformed(format!(
                "field of {} bytes at offset {} runs past end of buffer ({} bytes left)",
                n,
                self.pos,
                self.remaining()
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }
}

/// Fail if a known field arrived with an unexpected wire type.
pub fn expect_wire_type(field: u32, got: WireType, want: WireType) -> OtpAuthResult<()> {
    if got == want {
        Ok(())
    } else {
        Err(OtpAuthError::malformed(format!(
            "field {} has wire type {:?}, expected {:?}",
            field, got, want
        )))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Writer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Append-only message builder.
#[derive(Debug, Clone, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.put_u8((value as u8 & 0x7f) | 0x80);
            value >>= 7;
        }
        self.buf.put_u8(value as u8);
    }

    pub fn write_tag(&mut self, field: u32, wire_type: WireType) {
        self.write_varint((u64::from(field) << 3) | wire_type.bits());
    }

    /// Length prefix followed by the raw bytes.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.write_varint(data.len() as u64);
        self.buf.put_slice(data);
    }

    pub fn write_varint_field(&mut self, field: u32, value: u64) {
        self.write_tag(field, WireType::Varint);
        self.write_varint(value);
    }

    pub fn write_bytes_field(&mut self, field: u32, data: &[u8]) {
        self.write_tag(field, WireType::LengthDelimited);
        self.write_bytes(data);
    }

    /// Nested message as a length-delimited field.
    pub fn write_message(&mut self, field: u32, message: &WireWriter) {
        self.write_bytes_field(field, &message.buf);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}
