//! # Channel and Point Parameters
//!
//! The host hands over channel and point descriptors as JSON text. This
//! module turns them into typed configuration and rejects anything that
//! does not fit, classifying the failure:
//!
//! - malformed JSON, a missing field, a field of the wrong shape or a
//!   selection that matches nothing → [`BridgeError::Parse`];
//! - a well-formed number outside its bounds → [`BridgeError::Range`];
//! - a function code or value type outside the supported vocabulary →
//!   [`BridgeError::Unsupported`].
//!
//! Numeric fields accept either a JSON integer or a numeric string.
//! Selections (`function_code`, `value_type`) accept the label form used by
//! the parameter schema, e.g. `"3(read holding registers)"`, of which only
//! the leading integer matters.
//!
//! ## Channel
//!
//! ```json
//! {"type": "tcp", "ipaddr": "192.168.1.10", "port": 502, "modbus_slave_id": 1, "timeout": 1000}
//! {"type": "rtu", "com": "1", "baud_rate": "9600", "parity": "N", "data_bit": "8",
//!  "stop_bit": "1", "modbus_slave_id": 1, "timeout": 1000}
//! ```
//!
//! ## Point
//!
//! ```json
//! {"address": 0, "quantity": 2, "function_code": "3(read holding registers)", "value_type": "1(signed integer)"}
//! ```

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::bytes::ByteOrder;
use crate::codec::ValueType;
use crate::constants::{MAX_SLAVE_ID, MIN_SLAVE_ID};
use crate::error::{BridgeError, BridgeResult};
use crate::protocol::{ModbusFunction, SlaveId};

/// Accepted timeout range in milliseconds.
pub const MIN_TIMEOUT_MS: i64 = 1;
pub const MAX_TIMEOUT_MS: i64 = 60_000;

// ============================================================================
// Typed configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Tcp,
    Rtu,
}

impl TransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Rtu => "rtu",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Serial device, either by index or by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialPort {
    Index(u32),
    Path(String),
}

impl SerialPort {
    /// Device path; indexes are appended to `prefix` (`/dev/ttyS` + `1`).
    pub fn device_path(&self, prefix: &str) -> String {
        match self {
            Self::Index(n) => format!("{}{}", prefix, n),
            Self::Path(path) => path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialParams {
    pub port: SerialPort,
    pub baud_rate: u32,
    pub parity: Parity,
    pub data_bits: u8,
    pub stop_bits: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportParams {
    Tcp { host: String, port: u16 },
    Rtu(SerialParams),
}

/// Everything needed to open a channel. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub slave_id: SlaveId,
    /// Applied as both response and inter-byte timeout
    pub timeout: Duration,
    pub byte_order: ByteOrder,
    pub transport: TransportParams,
}

impl ChannelConfig {
    pub fn kind(&self) -> TransportKind {
        match self.transport {
            TransportParams::Tcp { .. } => TransportKind::Tcp,
            TransportParams::Rtu(_) => TransportKind::Rtu,
        }
    }

    /// Human-readable peer, for logs.
    pub fn endpoint(&self, serial_prefix: &str) -> String {
        match &self.transport {
            TransportParams::Tcp { host, port } => format!("{}:{}", host, port),
            TransportParams::Rtu(serial) => serial.port.device_path(serial_prefix),
        }
    }
}

/// Read function codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadFunction {
    Coils,
    DiscreteInputs,
    HoldingRegisters,
    InputRegisters,
}

impl ReadFunction {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Coils),
            2 => Some(Self::DiscreteInputs),
            3 => Some(Self::HoldingRegisters),
            4 => Some(Self::InputRegisters),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self.modbus_function().to_u8()
    }

    pub fn modbus_function(self) -> ModbusFunction {
        match self {
            Self::Coils => ModbusFunction::ReadCoils,
            Self::DiscreteInputs => ModbusFunction::ReadDiscreteInputs,
            Self::HoldingRegisters => ModbusFunction::ReadHoldingRegisters,
            Self::InputRegisters => ModbusFunction::ReadInputRegisters,
        }
    }

    /// FC01/FC02 return bits, FC03/FC04 registers.
    pub fn is_bit_access(self) -> bool {
        matches!(self, Self::Coils | Self::DiscreteInputs)
    }

    /// Length of the result buffer for `quantity` items.
    pub fn buffer_len(self, quantity: u16) -> usize {
        if self.is_bit_access() {
            quantity as usize
        } else {
            quantity as usize * 2
        }
    }
}

/// One point read, parsed per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointDescriptor {
    pub address: u16,
    pub quantity: u16,
    pub function: ReadFunction,
    pub value_type: ValueType,
}

// ============================================================================
// Raw JSON shapes
// ============================================================================

/// A JSON integer or a string holding one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FlexNumber {
    Int(i64),
    Text(String),
}

impl FlexNumber {
    fn integer(&self, field: &str) -> BridgeResult<i64> {
        match self {
            Self::Int(n) => Ok(*n),
            Self::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| BridgeError::parse(format!("field `{}`: `{}` is not a number", field, s))),
        }
    }

    /// Leading integer of a selection label.
    fn selection(&self, field: &str) -> BridgeResult<i64> {
        match self {
            Self::Int(n) => Ok(*n),
            Self::Text(s) => leading_integer(s)
                .ok_or_else(|| BridgeError::parse(format!("field `{}`: no selection in `{}`", field, s))),
        }
    }
}

fn leading_integer(label: &str) -> Option<i64> {
    let label = label.trim_start();
    let end = label
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(label.len(), |(i, _)| i);
    label[..end].parse().ok()
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    #[serde(rename = "type")]
    kind: String,
    modbus_slave_id: FlexNumber,
    timeout: FlexNumber,
    #[serde(default)]
    byte_order: Option<String>,

    #[serde(default)]
    ipaddr: Option<String>,
    #[serde(default)]
    port: Option<FlexNumber>,

    #[serde(default)]
    com: Option<FlexNumber>,
    #[serde(default)]
    baud_rate: Option<FlexNumber>,
    #[serde(default)]
    parity: Option<String>,
    #[serde(default)]
    data_bit: Option<FlexNumber>,
    #[serde(default)]
    stop_bit: Option<FlexNumber>,
}

#[derive(Debug, Deserialize)]
struct RawPoint {
    address: FlexNumber,
    quantity: FlexNumber,
    function_code: FlexNumber,
    value_type: FlexNumber,
}

fn required<'a, T>(value: &'a Option<T>, field: &str) -> BridgeResult<&'a T> {
    value
        .as_ref()
        .ok_or_else(|| BridgeError::parse(format!("missing field `{}`", field)))
}

fn in_range(value: i64, min: i64, max: i64, field: &str) -> BridgeResult<i64> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(BridgeError::range(format!(
            "field `{}`: {} outside {}..={}",
            field, value, min, max
        )))
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a channel descriptor.
pub fn parse_channel_config(json: &str) -> BridgeResult<ChannelConfig> {
    let raw: RawChannel = serde_json::from_str(json)?;

    let kind = match raw.kind.trim().to_ascii_lowercase().as_str() {
        "tcp" => TransportKind::Tcp,
        "rtu" => TransportKind::Rtu,
        other => return Err(BridgeError::parse(format!("unknown channel type `{}`", other))),
    };

    let byte_order = match &raw.byte_order {
        Some(s) => ByteOrder::from_str(s)
            .ok_or_else(|| BridgeError::parse(format!("unknown byte order `{}`", s)))?,
        None => ByteOrder::default(),
    };

    let slave_id = raw.modbus_slave_id.integer("modbus_slave_id")?;
    let timeout = raw.timeout.integer("timeout")?;

    let transport = match kind {
        TransportKind::Tcp => {
            let host = required(&raw.ipaddr, "ipaddr")?.trim().to_string();
            if host.is_empty() {
                return Err(BridgeError::parse("field `ipaddr` is empty"));
            }
            let port = required(&raw.port, "port")?.integer("port")?;
            TransportParams::Tcp {
                host,
                port: in_range(port, 1, u16::MAX as i64, "port")? as u16,
            }
        }
        TransportKind::Rtu => TransportParams::Rtu(parse_serial(&raw)?),
    };

    let slave_id = in_range(slave_id, MIN_SLAVE_ID as i64, MAX_SLAVE_ID as i64, "modbus_slave_id")? as u8;
    let timeout = in_range(timeout, MIN_TIMEOUT_MS, MAX_TIMEOUT_MS, "timeout")? as u64;

    Ok(ChannelConfig {
        slave_id,
        timeout: Duration::from_millis(timeout),
        byte_order,
        transport,
    })
}

fn parse_serial(raw: &RawChannel) -> BridgeResult<SerialParams> {
    let port = match required(&raw.com, "com")? {
        FlexNumber::Int(n) => SerialPort::Index(in_range(*n, 0, u32::MAX as i64, "com")? as u32),
        FlexNumber::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Err(BridgeError::parse("field `com` is empty"));
            }
            match s.parse::<u32>() {
                Ok(n) => SerialPort::Index(n),
                Err(_) => SerialPort::Path(s.to_string()),
            }
        }
    };

    let parity = match required(&raw.parity, "parity")?.trim().to_ascii_uppercase().as_str() {
        "N" | "NONE" => Parity::None,
        "E" | "EVEN" => Parity::Even,
        "O" | "ODD" => Parity::Odd,
        other => return Err(BridgeError::parse(format!("unknown parity `{}`", other))),
    };

    let data_bits = required(&raw.data_bit, "data_bit")?.integer("data_bit")?;
    if !(5..=8).contains(&data_bits) {
        return Err(BridgeError::parse(format!("unsupported data bits {}", data_bits)));
    }
    let stop_bits = required(&raw.stop_bit, "stop_bit")?.integer("stop_bit")?;
    if !(1..=2).contains(&stop_bits) {
        return Err(BridgeError::parse(format!("unsupported stop bits {}", stop_bits)));
    }

    let baud_rate = required(&raw.baud_rate, "baud_rate")?.integer("baud_rate")?;
    let baud_rate = in_range(baud_rate, 1, u32::MAX as i64, "baud_rate")? as u32;

    Ok(SerialParams {
        port,
        baud_rate,
        parity,
        data_bits: data_bits as u8,
        stop_bits: stop_bits as u8,
    })
}

/// Parse a point descriptor.
pub fn parse_point_descriptor(json: &str) -> BridgeResult<PointDescriptor> {
    let raw: RawPoint = serde_json::from_str(json)?;

    let address = raw.address.integer("address")?;
    let quantity = raw.quantity.integer("quantity")?;
    let function_code = raw.function_code.selection("function_code")?;
    let value_type = raw.value_type.selection("value_type")?;

    let address = in_range(address, 0, u16::MAX as i64, "address")? as u16;
    let quantity = in_range(quantity, 1, u16::MAX as i64, "quantity")? as u16;

    let function = ReadFunction::from_code(function_code)
        .ok_or_else(|| BridgeError::unsupported(format!("function code {}", function_code)))?;
    let value_type = ValueType::from_code(value_type)
        .ok_or_else(|| BridgeError::unsupported(format!("value type {}", value_type)))?;

    Ok(PointDescriptor {
        address,
        quantity,
        function,
        value_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_channel() {
        let config = parse_channel_config(
            r#"{"type":"tcp","ipaddr":"127.0.0.1","port":502,"modbus_slave_id":1,"timeout":1000}"#,
        )
        .unwrap();
        assert_eq!(config.kind(), TransportKind::Tcp);
        assert_eq!(config.slave_id, 1);
        assert_eq!(config.timeout, Duration::from_millis(1000));
        assert_eq!(config.byte_order, ByteOrder::BigEndian);
        assert_eq!(
            config.transport,
            TransportParams::Tcp {
                host: "127.0.0.1".into(),
                port: 502
            }
        );
        assert_eq!(config.endpoint("/dev/ttyS"), "127.0.0.1:502");
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let config = parse_channel_config(
            r#"{"type":"tcp","ipaddr":"plc.local","port":"1502","modbus_slave_id":"17","timeout":"250"}"#,
        )
        .unwrap();
        assert_eq!(config.slave_id, 17);
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert!(matches!(config.transport, TransportParams::Tcp { port: 1502, .. }));
    }

    #[test]
    fn test_rtu_channel() {
        let config = parse_channel_config(
            r#"{"type":"rtu","com":"1","baud_rate":"9600","parity":"e","data_bit":"8","stop_bit":"1",
                "modbus_slave_id":3,"timeout":500,"byte_order":"CDAB"}"#,
        )
        .unwrap();
        assert_eq!(config.kind(), TransportKind::Rtu);
        assert_eq!(config.byte_order, ByteOrder::BigEndianSwap);
        let TransportParams::Rtu(serial) = &config.transport else {
            panic!("expected rtu transport");
        };
        assert_eq!(serial.port, SerialPort::Index(1));
        assert_eq!(serial.baud_rate, 9600);
        assert_eq!(serial.parity, Parity::Even);
        assert_eq!(serial.data_bits, 8);
        assert_eq!(serial.stop_bits, 1);
        assert_eq!(config.endpoint("/dev/ttyS"), "/dev/ttyS1");
        assert_eq!(config.endpoint("COM"), "COM1");
    }

    #[test]
    fn test_rtu_literal_path() {
        let config = parse_channel_config(
            r#"{"type":"rtu","com":"/dev/ttyUSB0","baud_rate":19200,"parity":"N","data_bit":8,"stop_bit":2,
                "modbus_slave_id":1,"timeout":1000}"#,
        )
        .unwrap();
        assert_eq!(config.endpoint("/dev/ttyS"), "/dev/ttyUSB0");
    }

    #[test]
    fn test_channel_parse_errors() {
        let cases = [
            "not json",
            r#"{"ipaddr":"127.0.0.1","port":502,"modbus_slave_id":1,"timeout":1000}"#,
            r#"{"type":"udp","ipaddr":"127.0.0.1","port":502,"modbus_slave_id":1,"timeout":1000}"#,
            r#"{"type":"tcp","port":502,"modbus_slave_id":1,"timeout":1000}"#,
            r#"{"type":"tcp","ipaddr":"127.0.0.1","port":"abc","modbus_slave_id":1,"timeout":1000}"#,
            r#"{"type":"tcp","ipaddr":"127.0.0.1","port":502,"modbus_slave_id":[1],"timeout":1000}"#,
            r#"{"type":"tcp","ipaddr":"127.0.0.1","port":502,"modbus_slave_id":1,"timeout":1000,"byte_order":"XYZW"}"#,
            r#"{"type":"rtu","com":"1","baud_rate":"9600","parity":"X","data_bit":"8","stop_bit":"1","modbus_slave_id":1,"timeout":1000}"#,
            r#"{"type":"rtu","com":"1","baud_rate":"9600","parity":"N","data_bit":"9","stop_bit":"1","modbus_slave_id":1,"timeout":1000}"#,
            r#"{"type":"rtu","baud_rate":"9600","parity":"N","data_bit":"8","stop_bit":"1","modbus_slave_id":1,"timeout":1000}"#,
        ];
        for json in cases {
            assert!(
                matches!(parse_channel_config(json), Err(BridgeError::Parse(_))),
                "expected parse error for {}",
                json
            );
        }
    }

    #[test]
    fn test_channel_range_errors() {
        let cases = [
            r#"{"type":"tcp","ipaddr":"127.0.0.1","port":502,"modbus_slave_id":0,"timeout":1000}"#,
            r#"{"type":"tcp","ipaddr":"127.0.0.1","port":502,"modbus_slave_id":248,"timeout":1000}"#,
            r#"{"type":"tcp","ipaddr":"127.0.0.1","port":502,"modbus_slave_id":1,"timeout":0}"#,
            r#"{"type":"tcp","ipaddr":"127.0.0.1","port":502,"modbus_slave_id":1,"timeout":60001}"#,
            r#"{"type":"tcp","ipaddr":"127.0.0.1","port":70000,"modbus_slave_id":1,"timeout":1000}"#,
        ];
        for json in cases {
            assert!(
                matches!(parse_channel_config(json), Err(BridgeError::Range(_))),
                "expected range error for {}",
                json
            );
        }
    }

    #[test]
    fn test_point_labels() {
        let point = parse_point_descriptor(
            r#"{"address":0,"quantity":2,"function_code":"3(read holding registers)","value_type":"1(signed integer)"}"#,
        )
        .unwrap();
        assert_eq!(point.address, 0);
        assert_eq!(point.quantity, 2);
        assert_eq!(point.function, ReadFunction::HoldingRegisters);
        assert_eq!(point.value_type, ValueType::SignedInteger);
        assert_eq!(point.function.buffer_len(point.quantity), 4);
    }

    #[test]
    fn test_point_bare_integers() {
        let point =
            parse_point_descriptor(r#"{"address":"100","quantity":8,"function_code":1,"value_type":2}"#).unwrap();
        assert_eq!(point.address, 100);
        assert_eq!(point.function, ReadFunction::Coils);
        assert_eq!(point.value_type, ValueType::UnsignedInteger);
        assert_eq!(point.function.buffer_len(point.quantity), 8);
    }

    #[test]
    fn test_point_errors() {
        let parse = [
            r#"{"quantity":1,"function_code":"3","value_type":"1"}"#,
            r#"{"address":0,"quantity":1,"function_code":"(3)","value_type":"1"}"#,
            r#"{"address":0,"quantity":1,"function_code":"3","value_type":"signed"}"#,
            r#"{"address":0.5,"quantity":1,"function_code":"3","value_type":"1"}"#,
        ];
        for json in parse {
            assert!(matches!(parse_point_descriptor(json), Err(BridgeError::Parse(_))), "{}", json);
        }

        let range = [
            r#"{"address":65536,"quantity":1,"function_code":"3","value_type":"1"}"#,
            r#"{"address":-1,"quantity":1,"function_code":"3","value_type":"1"}"#,
            r#"{"address":0,"quantity":0,"function_code":"3","value_type":"1"}"#,
        ];
        for json in range {
            assert!(matches!(parse_point_descriptor(json), Err(BridgeError::Range(_))), "{}", json);
        }

        let unsupported = [
            r#"{"address":0,"quantity":1,"function_code":"6(write single register)","value_type":"1"}"#,
            r#"{"address":0,"quantity":1,"function_code":"3","value_type":"5"}"#,
        ];
        for json in unsupported {
            assert!(matches!(parse_point_descriptor(json), Err(BridgeError::Unsupported(_))), "{}", json);
        }
    }

    #[test]
    fn test_leading_integer() {
        assert_eq!(leading_integer("16(write multiple registers)"), Some(16));
        assert_eq!(leading_integer(" 4"), Some(4));
        assert_eq!(leading_integer("x4"), None);
        assert_eq!(leading_integer(""), None);
    }
}
