//! # Point Values
//!
//! Typed result of decoding a point buffer.
//!
//! | Variant | Buffer bytes | Value type |
//! |---------|--------------|------------|
//! | I16/I32/I64 | 2/4/8 | signed integer |
//! | U16/U32/U64 | 2/4/8 | unsigned integer |
//! | F32/F64 | 4/8 | floating point |
//! | Text | any | string |

use std::fmt;

use serde::Serialize;

/// A decoded point value.
///
/// Serializes as a bare JSON scalar or string, which is the shape the host
/// expects in the `value` field of a read result.
///
/// # Example
///
/// ```rust
/// use modbus_bridge::PointValue;
///
/// let temp = PointValue::F32(25.5);
/// assert_eq!(serde_json::to_string(&temp).unwrap(), "25.5");
/// assert_eq!(temp.type_name(), "f32");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PointValue {
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Text(String),
}

impl PointValue {
    /// Numeric view of the value; `None` for text.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PointValue::I16(v) => Some(f64::from(*v)),
            PointValue::U16(v) => Some(f64::from(*v)),
            PointValue::I32(v) => Some(f64::from(*v)),
            PointValue::U32(v) => Some(f64::from(*v)),
            PointValue::I64(v) => Some(*v as f64),
            PointValue::U64(v) => Some(*v as f64),
            PointValue::F32(v) => Some(f64::from(*v)),
            PointValue::F64(v) => Some(*v),
            PointValue::Text(_) => None,
        }
    }

    /// Width of the value in bytes as it was read.
    pub fn byte_len(&self) -> usize {
        match self {
            PointValue::I16(_) | PointValue::U16(_) => 2,
            PointValue::I32(_) | PointValue::U32(_) | PointValue::F32(_) => 4,
            PointValue::I64(_) | PointValue::U64(_) | PointValue::F64(_) => 8,
            PointValue::Text(s) => s.len(),
        }
    }

    /// Returns the type name as a string for logging/debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            PointValue::I16(_) => "i16",
            PointValue::U16(_) => "u16",
            PointValue::I32(_) => "i32",
            PointValue::U32(_) => "u32",
            PointValue::I64(_) => "i64",
            PointValue::U64(_) => "u64",
            PointValue::F32(_) => "f32",
            PointValue::F64(_) => "f64",
            PointValue::Text(_) => "string",
        }
    }
}

impl fmt::Display for PointValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointValue::I16(v) => write!(f, "{}", v),
            PointValue::U16(v) => write!(f, "{}", v),
            PointValue::I32(v) => write!(f, "{}", v),
            PointValue::U32(v) => write!(f, "{}", v),
            PointValue::I64(v) => write!(f, "{}", v),
            PointValue::U64(v) => write!(f, "{}", v),
            PointValue::F32(v) => write!(f, "{}", v),
            PointValue::F64(v) => write!(f, "{}", v),
            PointValue::Text(v) => f.write_str(v),
        }
    }
}

// ============================================================================
// From implementations for ergonomic construction
// ============================================================================

impl From<i16> for PointValue {
    fn from(v: i16) -> Self {
        PointValue::I16(v)
    }
}

impl From<u16> for PointValue {
    fn from(v: u16) -> Self {
        PointValue::U16(v)
    }
}

impl From<i32> for PointValue {
    fn from(v: i32) -> Self {
        PointValue::I32(v)
    }
}

impl From<u32> for PointValue {
    fn from(v: u32) -> Self {
        PointValue::U32(v)
    }
}

impl From<i64> for PointValue {
    fn from(v: i64) -> Self {
        PointValue::I64(v)
    }
}

impl From<u64> for PointValue {
    fn from(v: u64) -> Self {
        PointValue::U64(v)
    }
}

impl From<f32> for PointValue {
    fn from(v: f32) -> Self {
        PointValue::F32(v)
    }
}

impl From<f64> for PointValue {
    fn from(v: f64) -> Self {
        PointValue::F64(v)
    }
}

impl From<String> for PointValue {
    fn from(v: String) -> Self {
        PointValue::Text(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_f64() {
        assert_eq!(PointValue::U16(100).as_f64(), Some(100.0));
        assert_eq!(PointValue::I16(-50).as_f64(), Some(-50.0));
        assert_eq!(PointValue::I32(65538).as_f64(), Some(65538.0));
        assert!((PointValue::F32(3.14).as_f64().unwrap() - 3.14).abs() < 0.001);
        assert_eq!(PointValue::Text("x".into()).as_f64(), None);
    }

    #[test]
    fn test_serializes_as_bare_value() {
        assert_eq!(serde_json::to_string(&PointValue::I32(65538)).unwrap(), "65538");
        assert_eq!(serde_json::to_string(&PointValue::U64(u64::MAX)).unwrap(), "18446744073709551615");
        assert_eq!(serde_json::to_string(&PointValue::F64(1.5)).unwrap(), "1.5");
        assert_eq!(serde_json::to_string(&PointValue::Text("AB".into())).unwrap(), "\"AB\"");
    }

    #[test]
    fn test_byte_len() {
        assert_eq!(PointValue::I16(0).byte_len(), 2);
        assert_eq!(PointValue::F32(0.0).byte_len(), 4);
        assert_eq!(PointValue::U64(0).byte_len(), 8);
        assert_eq!(PointValue::Text("abc".into()).byte_len(), 3);
    }

    #[test]
    fn test_display() {
        assert_eq!(PointValue::I16(-1234).to_string(), "-1234");
        assert_eq!(PointValue::Text("pump".into()).to_string(), "pump");
    }

    #[test]
    fn test_from_primitives() {
        assert_eq!(PointValue::from(1u16), PointValue::U16(1));
        assert_eq!(PointValue::from(-1i64), PointValue::I64(-1));
        assert_eq!(PointValue::from(String::from("a")), PointValue::Text("a".into()));
    }
}
