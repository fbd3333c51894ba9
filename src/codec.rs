//! # Point Codec
//!
//! Turns the raw buffer produced by a read primitive into a [`PointValue`].
//!
//! Buffers follow one convention regardless of the function code:
//! - FC01/FC02: one byte per bit, `0` or `1`, `quantity` bytes;
//! - FC03/FC04: each register high byte first, `quantity * 2` bytes.
//!
//! ## Decode Table
//!
//! | Value type | Buffer length | Result |
//! |------------|---------------|--------|
//! | signed integer | 2 / 4 / 8 | i16 / i32 / i64 |
//! | unsigned integer | 2 / 4 / 8 | u16 / u32 / u64 |
//! | string | any | text, invalid UTF-8 replaced |
//! | floating point | 4 / 8 | f32 / f64 |
//!
//! Every other length is a decode error. Nothing is truncated or padded.

use std::fmt;

use crate::bytes::{wire_to_bytes_2, wire_to_bytes_4, wire_to_bytes_8, ByteOrder};
use crate::error::{BridgeError, BridgeResult};
use crate::value::PointValue;

/// Declared interpretation of a point buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    SignedInteger,
    UnsignedInteger,
    String,
    FloatingPoint,
}

impl ValueType {
    /// Map the numeric selection used in point parameters (1-4).
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::SignedInteger),
            2 => Some(Self::UnsignedInteger),
            3 => Some(Self::String),
            4 => Some(Self::FloatingPoint),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::SignedInteger => 1,
            Self::UnsignedInteger => 2,
            Self::String => 3,
            Self::FloatingPoint => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::SignedInteger => "signed integer",
            Self::UnsignedInteger => "unsigned integer",
            Self::String => "string",
            Self::FloatingPoint => "floating point",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.code(), self.name())
    }
}

// ============================================================================
// Read buffers
// ============================================================================

/// FC01/FC02 result buffer: one byte per bit.
pub fn bits_to_buffer(bits: &[bool]) -> Vec<u8> {
    bits.iter().map(|&b| u8::from(b)).collect()
}

/// FC03/FC04 result buffer: registers high byte first.
pub fn registers_to_buffer(registers: &[u16]) -> Vec<u8> {
    registers.iter().flat_map(|r| r.to_be_bytes()).collect()
}

// ============================================================================
// Decoding
// ============================================================================

fn unsupported_width(value_type: ValueType, len: usize) -> BridgeError {
    BridgeError::decode(format!(
        "{} cannot be decoded from a {}-byte buffer",
        value_type.name(),
        len
    ))
}

/// Decode a point buffer.
///
/// # Example
///
/// ```rust
/// use modbus_bridge::{decode_point_value, ByteOrder, PointValue, ValueType};
///
/// // registers [1, 2] as read by FC03
/// let buf = [0x00, 0x01, 0x00, 0x02];
/// let value = decode_point_value(&buf, ValueType::SignedInteger, ByteOrder::BigEndian).unwrap();
/// assert_eq!(value, PointValue::I32(65538));
/// ```
pub fn decode_point_value(buf: &[u8], value_type: ValueType, order: ByteOrder) -> BridgeResult<PointValue> {
    match value_type {
        ValueType::SignedInteger => match buf.len() {
            2 => Ok(PointValue::I16(i16::from_be_bytes(wire_to_bytes_2(
                &[buf[0], buf[1]],
                order,
            )))),
            4 => {
                let raw: [u8; 4] = [buf[0], buf[1], buf[2], buf[3]];
                Ok(PointValue::I32(i32::from_be_bytes(wire_to_bytes_4(&raw, order))))
            }
            8 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(buf);
                Ok(PointValue::I64(i64::from_be_bytes(wire_to_bytes_8(&raw, order))))
            }
            len => Err(unsupported_width(value_type, len)),
        },

        ValueType::UnsignedInteger => match buf.len() {
            2 => Ok(PointValue::U16(u16::from_be_bytes(wire_to_bytes_2(
                &[buf[0], buf[1]],
                order,
            )))),
            4 => {
                let raw: [u8; 4] = [buf[0], buf[1], buf[2], buf[3]];
                Ok(PointValue::U32(u32::from_be_bytes(wire_to_bytes_4(&raw, order))))
            }
            8 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(buf);
                Ok(PointValue::U64(u64::from_be_bytes(wire_to_bytes_8(&raw, order))))
            }
            len => Err(unsupported_width(value_type, len)),
        },

        ValueType::FloatingPoint => match buf.len() {
            4 => {
                let raw: [u8; 4] = [buf[0], buf[1], buf[2], buf[3]];
                Ok(PointValue::F32(f32::from_be_bytes(wire_to_bytes_4(&raw, order))))
            }
            8 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(buf);
                Ok(PointValue::F64(f64::from_be_bytes(wire_to_bytes_8(&raw, order))))
            }
            len => Err(unsupported_width(value_type, len)),
        },

        ValueType::String => Ok(PointValue::Text(String::from_utf8_lossy(buf).into_owned())),
    }
}
