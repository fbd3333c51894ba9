//! Error types for the wire layer and the bridge operations.
//!
//! Two layers, two enums:
//!
//! - [`ModbusError`] describes what went wrong on the field bus: socket and
//!   serial I/O, timeouts, malformed frames, exception responses.
//! - [`BridgeError`] is what the host sees. Every operation of the bridge
//!   returns it, and each variant maps to a stable negative status code via
//!   [`BridgeError::code`].
//!
//! Wire errors cross into the bridge taxonomy at the connection boundary
//! (`From<ModbusError> for BridgeError` yields [`BridgeError::Io`]).

use thiserror::Error;

/// Result type for wire-level operations.
pub type ModbusResult<T> = Result<T, ModbusError>;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised by the Modbus transports and the wire client.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModbusError {
    /// Socket or serial line I/O failed
    #[error("I/O error: {message}")]
    Io { message: String },

    /// The link is not established or could not be established
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// No complete response within the configured timeout
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Malformed or unexpected frame
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// The device answered with a Modbus exception
    #[error("Modbus exception: function 0x{function:02X}, code 0x{code:02X} ({message})")]
    Exception {
        function: u8,
        code: u8,
        message: String,
    },

    /// Request or response payload is not acceptable
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Function code outside the supported vocabulary
    #[error("Invalid function code: {code}")]
    InvalidFunction { code: u8 },

    /// Bad transport configuration (address, serial settings)
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl ModbusError {
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn exception(function: u8, code: u8) -> Self {
        Self::Exception {
            function,
            code,
            message: crate::constants::exception_description(code).to_string(),
        }
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    pub fn invalid_function(code: u8) -> Self {
        Self::InvalidFunction { code }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether the link itself must be considered broken.
    ///
    /// After a timeout or a framing error the stream may still hold a late
    /// response, so the connection cannot be reused and has to be re-established.
    /// Exception responses and rejected requests leave the link healthy.
    pub fn is_link_failure(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Connection { .. } | Self::Timeout { .. } | Self::Protocol { .. }
        )
    }
}

impl From<std::io::Error> for ModbusError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

/// Errors reported to the host for a single bridge call.
///
/// None of them is fatal; the call fails and the bridge stays usable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Malformed JSON, missing field, unrecognized selection
    #[error("parse error: {0}")]
    Parse(String),

    /// Address, quantity or another numeric field out of bounds
    #[error("out of range: {0}")]
    Range(String),

    /// Unknown function code or value type
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// The transport could not be opened
    #[error("connect failed: {0}")]
    Connect(String),

    /// Transport read/write failed on an established channel
    #[error("I/O error: {0}")]
    Io(String),

    /// Buffer length incompatible with the declared value type
    #[error("decode error: {0}")]
    Decode(String),

    /// Unknown channel id
    #[error("channel not found: {0}")]
    NotFound(String),

    /// Channel id already in use
    #[error("channel already exists: {0}")]
    Conflict(String),
}

impl BridgeError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn range(message: impl Into<String>) -> Self {
        Self::Range(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Status code handed back to the host. Always negative.
    pub fn code(&self) -> i32 {
        match self {
            Self::Parse(_) => -1,
            Self::Range(_) => -2,
            Self::Unsupported(_) => -3,
            Self::Connect(_) => -4,
            Self::Io(_) => -5,
            Self::Decode(_) => -6,
            Self::NotFound(_) => -7,
            Self::Conflict(_) => -8,
        }
    }

    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse",
            Self::Range(_) => "range",
            Self::Unsupported(_) => "unsupported",
            Self::Connect(_) => "connect",
            Self::Io(_) => "io",
            Self::Decode(_) => "decode",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
        }
    }
}

impl From<ModbusError> for BridgeError {
    fn from(err: ModbusError) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_failure_classification() {
        assert!(ModbusError::io("reset").is_link_failure());
        assert!(ModbusError::timeout("read", 1000).is_link_failure());
        assert!(ModbusError::protocol("bad MBAP").is_link_failure());
        assert!(!ModbusError::exception(0x03, 0x02).is_link_failure());
        assert!(!ModbusError::invalid_data("quantity").is_link_failure());
    }

    #[test]
    fn test_exception_message() {
        let err = ModbusError::exception(0x03, 0x02);
        let text = err.to_string();
        assert!(text.contains("0x03"));
        assert!(text.contains("Illegal Data Address"));
    }

    #[test]
    fn test_codes_are_negative_and_distinct() {
        let errors = [
            BridgeError::parse("a"),
            BridgeError::range("a"),
            BridgeError::unsupported("a"),
            BridgeError::Connect("a".into()),
            BridgeError::Io("a".into()),
            BridgeError::decode("a"),
            BridgeError::NotFound("a".into()),
            BridgeError::Conflict("a".into()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(BridgeError::code).collect();
        assert!(codes.iter().all(|c| *c < 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_wire_error_becomes_io() {
        let err: BridgeError = ModbusError::timeout("read holding registers", 500).into();
        assert_eq!(err.kind(), "io");
        assert!(err.to_string().contains("500ms"));
    }

    #[test]
    fn test_json_error_becomes_parse() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: BridgeError = json_err.into();
        assert!(matches!(err, BridgeError::Parse(_)));
    }
}
