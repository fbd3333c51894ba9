//! Parameter schema returned by `describe`.
//!
//! The host renders channel and point forms from this schema, so labels and
//! choices here are exactly what comes back in the JSON descriptors later.

use serde::Serialize;
use serde_json::{json, Value};

use crate::constants::DEFAULT_TCP_PORT;

/// How the host should render a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Select,
    Number,
    Text,
    /// Composite `ipaddr` + `port` group
    Tcp,
    /// Composite `com` + `baud_rate` + `parity` + `data_bit` + `stop_bit` group
    Serial,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamDesc {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: ParamKind,
    /// Shown only when this `field=value` condition holds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

impl ParamDesc {
    fn select(key: &'static str, label: &'static str, choices: Vec<&'static str>, default: &'static str) -> Self {
        Self {
            key,
            label,
            kind: ParamKind::Select,
            condition: None,
            choices,
            default: Some(json!(default)),
            min: None,
            max: None,
        }
    }

    fn number(key: &'static str, label: &'static str, default: i64, min: i64, max: i64) -> Self {
        Self {
            key,
            label,
            kind: ParamKind::Number,
            condition: None,
            choices: Vec::new(),
            default: Some(json!(default)),
            min: Some(min),
            max: Some(max),
        }
    }

    fn group(key: &'static str, label: &'static str, kind: ParamKind, condition: &'static str) -> Self {
        Self {
            key,
            label,
            kind,
            condition: Some(condition),
            choices: Vec::new(),
            default: None,
            min: None,
            max: None,
        }
    }

    fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Channel and point descriptors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeMetadata {
    pub channel: Vec<ParamDesc>,
    pub point: Vec<ParamDesc>,
}

pub const FUNCTION_CODE_CHOICES: [&str; 8] = [
    "1(read coils)",
    "2(read discrete inputs)",
    "3(read holding registers)",
    "4(read input registers)",
    "5(write single coil)",
    "6(write single register)",
    "15(write multiple coils)",
    "16(write multiple registers)",
];

pub const VALUE_TYPE_CHOICES: [&str; 4] = [
    "1(signed integer)",
    "2(unsigned integer)",
    "3(string)",
    "4(floating point)",
];

impl BridgeMetadata {
    pub fn modbus() -> Self {
        let channel = vec![
            ParamDesc::select("type", "Channel type", vec!["tcp", "rtu"], "tcp"),
            ParamDesc::group("tcp", "TCP endpoint", ParamKind::Tcp, "type=tcp")
                .with_default(json!({ "port": DEFAULT_TCP_PORT })),
            ParamDesc::group("serial", "Serial line", ParamKind::Serial, "type=rtu"),
            ParamDesc::number("modbus_slave_id", "Slave id", 1, 1, 32),
            ParamDesc::number("timeout", "Timeout (ms)", 1000, 100, 3000),
            ParamDesc {
                key: "byte_order",
                label: "Byte order",
                kind: ParamKind::Select,
                condition: None,
                choices: vec!["ABCD", "DCBA", "CDAB", "BADC"],
                default: Some(json!("ABCD")),
                min: None,
                max: None,
            },
        ];

        let point = vec![
            ParamDesc::number("address", "Address", 0, 0, u16::MAX as i64),
            ParamDesc::number("quantity", "Quantity", 1, 1, u16::MAX as i64),
            ParamDesc::select(
                "function_code",
                "Function code",
                FUNCTION_CODE_CHOICES.to_vec(),
                "3(read holding registers)",
            ),
            ParamDesc::select("value_type", "Value type", VALUE_TYPE_CHOICES.to_vec(), "1(signed integer)"),
        ];

        Self { channel, point }
    }

    pub fn to_json(&self) -> Value {
        // plain data, serialization cannot fail
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Default for BridgeMetadata {
    fn default() -> Self {
        Self::modbus()
    }
}
