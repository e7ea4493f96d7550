//! Tag-delimited binary wire format cursor.
//!
//! Vector tiles arrive as a protobuf-style stream of tagged fields:
//! variable-length base-128 integers, zig-zag signed deltas, and
//! length-prefixed sub-messages. [`Cursor`] walks one byte span without
//! copying it; sub-messages are new cursors scoped to exactly their
//! declared span.
//!
//! The cursor never panics on malformed input. A declared length that
//! overruns the remaining span, or a varint cut off mid-sequence, surfaces
//! as a [`WireError`] for the caller to handle; the tile decoder treats
//! these as tolerable damage and keeps whatever was decoded so far.

use thiserror::Error;

/// Wire type: varint-encoded scalar.
pub const WIRE_VARINT: u8 = 0;
/// Wire type: fixed 64-bit value.
pub const WIRE_FIXED64: u8 = 1;
/// Wire type: length-prefixed bytes (strings, sub-messages, packed arrays).
pub const WIRE_LENGTH: u8 = 2;
/// Wire type: fixed 32-bit value.
pub const WIRE_FIXED32: u8 = 5;

/// Errors produced while walking the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WireError {
    /// The buffer ended in the middle of a varint or fixed-width value.
    #[error("unexpected end of buffer")]
    UnexpectedEof,

    /// A length prefix claims more bytes than remain in the span.
    #[error("declared length {declared} exceeds remaining {remaining} bytes")]
    Truncated { declared: usize, remaining: usize },

    /// A varint ran past 10 bytes without terminating.
    #[error("varint exceeds 64 bits")]
    VarintOverflow,

    /// A field carries a wire type the format does not use.
    #[error("unsupported wire type {0}")]
    UnsupportedWireType(u8),
}

/// Zero-copy cursor over one tagged byte span.
///
/// Typical use iterates fields with [`next`](Cursor::next) and dispatches
/// on [`tag`](Cursor::tag):
///
/// ```
/// use vectile::wire::Cursor;
///
/// let bytes = [0x08, 0x2a]; // field 1, varint 42
/// let mut cursor = Cursor::new(&bytes);
/// while cursor.next().unwrap() {
///     match cursor.tag() {
///         1 => assert_eq!(cursor.varint().unwrap(), 42),
///         _ => cursor.skip().unwrap(),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    tag: u32,
    wire_type: u8,
}

impl<'a> Cursor<'a> {
    /// Wraps a byte span.
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            tag: 0,
            wire_type: WIRE_VARINT,
        }
    }

    /// Advances to the next tagged field.
    ///
    /// Returns `Ok(false)` at the end of the span. After `Ok(true)` the
    /// field's tag is available via [`tag`](Cursor::tag) and its value
    /// must be consumed (or [`skip`](Cursor::skip)ped) before the next
    /// call.
    pub fn next(&mut self) -> Result<bool, WireError> {
        if !self.has_more() {
            return Ok(false);
        }
        let key = self.varint()?;
        self.tag = (key >> 3) as u32;
        self.wire_type = (key & 0x7) as u8;
        Ok(true)
    }

    /// Tag of the current field.
    pub fn tag(&self) -> u32 {
        self.tag
    }

    /// Wire type of the current field.
    pub fn wire_type(&self) -> u8 {
        self.wire_type
    }

    /// Returns true while bytes remain; the caller's loop-termination
    /// condition when draining packed arrays.
    pub fn has_more(&self) -> bool {
        self.pos < self.buf.len()
    }

    /// Bytes remaining in the span.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Decodes a base-128 continuation-encoded unsigned integer.
    pub fn varint(&mut self) -> Result<u64, WireError> {
        let mut value: u64 = 0;
        let mut shift = 0u32;

        loop {
            let byte = *self.buf.get(self.pos).ok_or(WireError::UnexpectedEof)?;
            self.pos += 1;

            if shift >= 64 {
                return Err(WireError::VarintOverflow);
            }
            value |= u64::from(byte & 0x7f) << shift;

            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    /// Decodes a zig-zag signed integer.
    pub fn svarint(&mut self) -> Result<i64, WireError> {
        let value = self.varint()?;
        Ok(((value >> 1) as i64) ^ -((value & 1) as i64))
    }

    /// Decodes a varint truncated to 32 bits, the format's convention for
    /// counts and table indices.
    pub fn int64(&mut self) -> Result<u32, WireError> {
        Ok(self.varint()? as u32)
    }

    /// Reads a length-prefixed byte run.
    pub fn bytes(&mut self) -> Result<&'a [u8], WireError> {
        let len = self.varint()? as usize;
        let remaining = self.remaining();
        if len > remaining {
            return Err(WireError::Truncated {
                declared: len,
                remaining,
            });
        }
        let run = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(run)
    }

    /// Reads a length-prefixed byte run as text.
    ///
    /// Invalid UTF-8 is replaced rather than rejected; the tile format
    /// carries attribute strings whose damage should not fail the tile.
    pub fn string(&mut self) -> Result<String, WireError> {
        Ok(String::from_utf8_lossy(self.bytes()?).into_owned())
    }

    /// Reads a length-prefixed sub-message and returns a cursor scoped to
    /// exactly that span. The parent cursor is positioned after the
    /// sub-message; the two share no state.
    pub fn message(&mut self) -> Result<Cursor<'a>, WireError> {
        Ok(Cursor::new(self.bytes()?))
    }

    /// Advances past the current field's value without interpreting it,
    /// using the wire type to determine its length.
    pub fn skip(&mut self) -> Result<(), WireError> {
        match self.wire_type {
            WIRE_VARINT => {
                self.varint()?;
            }
            WIRE_FIXED64 => {
                self.advance(8)?;
            }
            WIRE_LENGTH => {
                self.bytes()?;
            }
            WIRE_FIXED32 => {
                self.advance(4)?;
            }
            other => return Err(WireError::UnsupportedWireType(other)),
        }
        Ok(())
    }

    fn advance(&mut self, n: usize) -> Result<(), WireError> {
        if n > self.remaining() {
            return Err(WireError::UnexpectedEof);
        }
        self.pos += n;
        Ok(())
    }
}
