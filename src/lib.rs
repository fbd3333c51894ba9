//! # Modbus Bridge
//!
//! Exposes Modbus TCP and RTU devices to a host runtime through a small set
//! of generic operations: describe, create channel, delete channel, read
//! point, write point. The host addresses channels by opaque ids and passes
//! all parameters as JSON; the bridge turns each read into one field-bus
//! transaction and the response into a typed, timestamped value.
//!
//! ## Supported Reads
//!
//! | Code | Function | Buffer |
//! |------|----------|--------|
//! | 0x01 | Read Coils | one byte per bit |
//! | 0x02 | Read Discrete Inputs | one byte per bit |
//! | 0x03 | Read Holding Registers | big-endian register bytes |
//! | 0x04 | Read Input Registers | big-endian register bytes |
//!
//! The buffer is decoded by value type (signed, unsigned, string, float) and
//! width; see [`decode_point_value`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use modbus_bridge::{BridgeConfig, BridgeOperations, BridgeResult, ModbusBridge};
//!
//! #[tokio::main]
//! async fn main() -> BridgeResult<()> {
//!     let bridge = ModbusBridge::new(BridgeConfig::default());
//!
//!     bridge
//!         .create_channel(
//!             "plc-1",
//!             r#"{"type":"tcp","ipaddr":"127.0.0.1","port":502,"modbus_slave_id":1,"timeout":1000}"#,
//!         )
//!         .await?;
//!
//!     let reading = bridge
//!         .read_point(
//!             "plc-1",
//!             r#"{"address":0,"quantity":2,"function_code":"3(read holding registers)","value_type":"1(signed integer)"}"#,
//!         )
//!         .await?;
//!     println!("{}", reading);
//!
//!     bridge.delete_channel("plc-1").await?;
//!     Ok(())
//! }
//! ```

// ============================================================================
// Wire layer
// ============================================================================

/// Error types for the wire layer and the bridge
pub mod error;

/// Modbus protocol constants
pub mod constants;

/// Request/response types and PDU encoding
pub mod protocol;

/// TCP and RTU transports
pub mod transport;

/// Function-code level client
pub mod client;

/// Logging setup and frame dumps
pub mod logging;

// ============================================================================
// Values and decoding
// ============================================================================

/// Decoded point values
pub mod value;

/// Byte order handling for multi-register values
pub mod bytes;

/// Raw buffer decoding by value type
pub mod codec;

/// Per-request read limits
pub mod device_limits;

// ============================================================================
// Bridge
// ============================================================================

/// JSON channel and point parameters
pub mod params;

/// Parameter schema
pub mod metadata;

/// Bridge-wide configuration
pub mod config;

/// Device link owned by a channel
pub mod connection;

/// Reconnection after link failures
pub mod reconnect;

/// Live channels by id
pub mod registry;

/// Point read and write
pub mod pipeline;

/// Host-facing operations
pub mod bridge;

/// Tick loop and shutdown
pub mod runtime;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use tokio;

// === Host boundary ===
pub use bridge::{BridgeOperations, ModbusBridge};
pub use config::BridgeConfig;
pub use metadata::{BridgeMetadata, ParamDesc, ParamKind};
pub use runtime::{BridgeRuntime, ShutdownHandle};

// === Errors ===
pub use error::{BridgeError, BridgeResult, ModbusError, ModbusResult};

// === Channels and points ===
pub use params::{
    parse_channel_config, parse_point_descriptor, ChannelConfig, PointDescriptor, ReadFunction,
    TransportKind, TransportParams,
};
pub use pipeline::PointReading;
pub use reconnect::ConnectionState;
pub use registry::{ChannelRegistry, ChannelStatus};

// === Values ===
pub use bytes::{regs_to_bytes_4, regs_to_bytes_8, ByteOrder};
pub use codec::{decode_point_value, ValueType};
pub use device_limits::DeviceLimits;
pub use value::PointValue;

// === Wire layer ===
pub use client::{GenericModbusClient, ModbusClient};
pub use protocol::{ModbusFunction, ModbusRequest, ModbusResponse, SlaveId};
pub use transport::{ModbusTransport, TcpTransport, TransportStats, TransportTimeouts};

#[cfg(feature = "rtu")]
pub use transport::{RtuTransport, SerialSettings};

// === Logging ===
pub use logging::{init_logging, LoggingMode};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
