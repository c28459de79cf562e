//! Schema-agnostic reader for the tag/varint binary encoding used by console
//! index links.
//!
//! The reader knows nothing about index definitions. It walks a byte buffer
//! and yields `(field number, wire type, value)` triples; nested messages are
//! decoded by running a second reader over a length-delimited payload.

use thiserror::Error;

const CONTINUATION_BIT: u8 = 0x80;
const PAYLOAD_MASK: u8 = 0x7f;
const WIRE_TYPE_MASK: u64 = 0b111;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("payload truncated at byte {offset}")]
    Truncated { offset: usize },
    #[error("varint starting at byte {offset} does not fit in 64 bits")]
    VarintOverflow { offset: usize },
    #[error("unsupported wire type {wire_type} at byte {offset}")]
    UnsupportedWireType { wire_type: u8, offset: usize },
}

/// How the value following a tag is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint,
    Fixed64,
    LengthDelimited,
    Fixed32,
}

impl WireType {
    fn from_tag_bits(bits: u8, offset: usize) -> Result<Self, DecodeError> {
        match bits {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            5 => Ok(WireType::Fixed32),
            other => Err(DecodeError::UnsupportedWireType {
                wire_type: other,
                offset,
            }),
        }
    }
}

/// Raw value attached to a field. Fixed-width payloads are kept opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireValue<'a> {
    Varint(u64),
    Bytes(&'a [u8]),
    Opaque(&'a [u8]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireField<'a> {
    pub number: u64,
    pub wire_type: WireType,
    pub value: WireValue<'a>,
}

impl<'a> WireField<'a> {
    pub fn as_varint(&self) -> Option<u64> {
        match self.value {
            WireValue::Varint(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match self.value {
            WireValue::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Read one varint starting at `offset`, returning the value and the offset
/// just past its final byte.
pub fn read_varint(buf: &[u8], offset: usize) -> Result<(u64, usize), DecodeError> {
    let mut value: u64 = 0;
    let mut cursor = offset;
    for index in 0.. {
        let byte = *buf.get(cursor).ok_or(DecodeError::Truncated { offset: cursor })?;
        cursor += 1;
        let shift = 7 * index;
        let chunk = u64::from(byte & PAYLOAD_MASK);
        if shift >= 64 || (shift > 0 && chunk >> (64 - shift) != 0) {
            return Err(DecodeError::VarintOverflow { offset });
        }
        value |= chunk << shift;
        if byte & CONTINUATION_BIT == 0 {
            break;
        }
    }
    Ok((value, cursor))
}

/// Lazy iterator over the top-level fields of one encoded message.
///
/// Iteration stops after the first error; a malformed buffer never yields
/// fields past the point of corruption.
pub struct FieldReader<'a> {
    buf: &'a [u8],
    cursor: usize,
    failed: bool,
}

impl<'a> FieldReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self::at(buf, 0)
    }

    pub fn at(buf: &'a [u8], cursor: usize) -> Self {
        Self {
            buf,
            cursor,
            failed: false,
        }
    }

    fn read_field(&mut self) -> Result<WireField<'a>, DecodeError> {
        let tag_offset = self.cursor;
        let (tag, cursor) = read_varint(self.buf, self.cursor)?;
        self.cursor = cursor;
        let number = tag >> 3;
        let wire_type = WireType::from_tag_bits((tag & WIRE_TYPE_MASK) as u8, tag_offset)?;

        let value = match wire_type {
            WireType::Varint => {
                let (value, cursor) = read_varint(self.buf, self.cursor)?;
                self.cursor = cursor;
                WireValue::Varint(value)
            }
            WireType::LengthDelimited => {
                let (length, cursor) = read_varint(self.buf, self.cursor)?;
                let bytes = self.take(cursor, length)?;
                WireValue::Bytes(bytes)
            }
            WireType::Fixed64 => WireValue::Opaque(self.take(self.cursor, 8)?),
            WireType::Fixed32 => WireValue::Opaque(self.take(self.cursor, 4)?),
        };

        Ok(WireField {
            number,
            wire_type,
            value,
        })
    }

    fn take(&mut self, start: usize, length: u64) -> Result<&'a [u8], DecodeError> {
        let end = usize::try_from(length)
            .ok()
            .and_then(|len| start.checked_add(len))
            .filter(|end| *end <= self.buf.len())
            .ok_or(DecodeError::Truncated {
                offset: self.buf.len(),
            })?;
        self.cursor = end;
        Ok(&self.buf[start..end])
    }
}

impl<'a> Iterator for FieldReader<'a> {
    type Item = Result<WireField<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor >= self.buf.len() {
            return None;
        }
        let field = self.read_field();
        if field.is_err() {
            self.failed = true;
        }
        Some(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_decodes_single_and_multi_byte_values() {
        assert_eq!(read_varint(&[0x01], 0).unwrap(), (1, 1));
        assert_eq!(read_varint(&[0x7f], 0).unwrap(), (127, 1));
        assert_eq!(read_varint(&[0x80, 0x01], 0).unwrap(), (128, 2));
        // cursor starts mid-buffer: 0xac 0x02 encodes 300
        assert_eq!(read_varint(&[0xff, 0xac, 0x02], 1).unwrap(), (300, 3));
    }

    #[test]
    fn varint_reports_truncation() {
        let err = read_varint(&[0x80, 0x80], 0).expect_err("missing terminator");
        assert_eq!(err, DecodeError::Truncated { offset: 2 });
    }

    #[test]
    fn varint_rejects_more_than_64_bits() {
        let mut bytes = vec![0xff; 10];
        bytes.push(0x01);
        let err = read_varint(&bytes, 0).expect_err("overflow");
        assert_eq!(err, DecodeError::VarintOverflow { offset: 0 });
    }

    #[test]
    fn reader_yields_varint_and_length_delimited_fields_in_order() {
        // field 1 = "ab", field 2 = 1, field 3 = nested {field 1 = "x"}
        let buf = [0x0a, 0x02, b'a', b'b', 0x10, 0x01, 0x1a, 0x03, 0x0a, 0x01, b'x'];
        let fields: Vec<_> = FieldReader::new(&buf)
            .collect::<Result<_, _>>()
            .expect("decodes");
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].number, 1);
        assert_eq!(fields[0].as_bytes(), Some(&b"ab"[..]));
        assert_eq!(fields[1].wire_type, WireType::Varint);
        assert_eq!(fields[1].as_varint(), Some(1));

        let nested = fields[2].as_bytes().expect("nested payload");
        let inner: Vec<_> = FieldReader::new(nested)
            .collect::<Result<_, _>>()
            .expect("nested decodes");
        assert_eq!(inner[0].as_bytes(), Some(&b"x"[..]));
    }

    #[test]
    fn reader_skips_fixed_width_payloads() {
        // field 4 fixed32, then field 1 varint 7
        let buf = [0x25, 1, 2, 3, 4, 0x08, 0x07];
        let fields: Vec<_> = FieldReader::new(&buf)
            .collect::<Result<_, _>>()
            .expect("decodes");
        assert!(matches!(fields[0].value, WireValue::Opaque(bytes) if bytes.len() == 4));
        assert_eq!(fields[1].as_varint(), Some(7));
    }

    #[test]
    fn reader_stops_after_overlong_length() {
        let buf = [0x0a, 0x05, b'a'];
        let mut reader = FieldReader::new(&buf);
        assert!(matches!(reader.next(), Some(Err(DecodeError::Truncated { .. }))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn reader_rejects_group_wire_types() {
        let buf = [0x0b];
        let err = FieldReader::new(&buf).next().unwrap().expect_err("group");
        assert_eq!(
            err,
            DecodeError::UnsupportedWireType {
                wire_type: 3,
                offset: 0
            }
        );
    }
}
