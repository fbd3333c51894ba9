//! # Device Limits Configuration
//!
//! Per-request read limits checked before a point read goes on the wire.
//!
//! ## Modbus Specification Limits
//!
//! - **Read Holding/Input Registers (FC03/04)**: Max 125 registers per request
//! - **Read Coils/Discrete Inputs (FC01/02)**: Max 2000 bits per request
//!
//! Some devices accept less. Lowering the limits here makes the bridge
//! reject oversized points with a range error instead of letting the device
//! answer with an exception.

use serde::Deserialize;

use crate::constants::{MAX_READ_COILS, MAX_READ_REGISTERS};
use crate::error::{BridgeError, BridgeResult};
use crate::params::ReadFunction;

/// Default maximum registers per read operation (Modbus specification).
pub const DEFAULT_MAX_READ_REGISTERS: u16 = MAX_READ_REGISTERS;

/// Default maximum coils per read operation (Modbus specification).
pub const DEFAULT_MAX_READ_COILS: u16 = MAX_READ_COILS;

/// Device-specific read limits.
///
/// # Example
///
/// ```rust
/// use modbus_bridge::DeviceLimits;
///
/// // A device that only supports 50 registers per read
/// let limits = DeviceLimits::new().with_max_read_registers(50);
///
/// assert_eq!(limits.max_read_registers, 50);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawLimits")]
pub struct DeviceLimits {
    /// Maximum registers per read request.
    pub max_read_registers: u16,
    /// Maximum coils per read request.
    pub max_read_coils: u16,
}

impl DeviceLimits {
    /// Create new device limits with default protocol values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lower limits suitable for older devices: 50 registers, 500 coils.
    pub fn conservative() -> Self {
        Self {
            max_read_registers: 50,
            max_read_coils: 500,
        }
    }

    /// Clamped to 1..=125.
    pub fn with_max_read_registers(mut self, count: u16) -> Self {
        self.max_read_registers = count.clamp(1, MAX_READ_REGISTERS);
        self
    }

    /// Clamped to 1..=2000.
    pub fn with_max_read_coils(mut self, count: u16) -> Self {
        self.max_read_coils = count.clamp(1, MAX_READ_COILS);
        self
    }

    /// Largest quantity accepted for `function`.
    pub fn max_quantity(&self, function: ReadFunction) -> u16 {
        if function.is_bit_access() {
            self.max_read_coils
        } else {
            self.max_read_registers
        }
    }

    /// Reject a read whose quantity exceeds the limit for its function.
    pub fn check_read(&self, function: ReadFunction, quantity: u16) -> BridgeResult<()> {
        let max = self.max_quantity(function);
        if quantity > max {
            return Err(BridgeError::range(format!(
                "quantity {} exceeds the limit of {} for function code {}",
                quantity,
                max,
                function.code()
            )));
        }
        Ok(())
    }
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_read_registers: DEFAULT_MAX_READ_REGISTERS,
            max_read_coils: DEFAULT_MAX_READ_COILS,
        }
    }
}

/// Limits as written in configuration, before validation.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawLimits {
    max_read_registers: u16,
    max_read_coils: u16,
}

impl Default for RawLimits {
    fn default() -> Self {
        Self {
            max_read_registers: DEFAULT_MAX_READ_REGISTERS,
            max_read_coils: DEFAULT_MAX_READ_COILS,
        }
    }
}

impl TryFrom<RawLimits> for DeviceLimits {
    type Error = String;

    /// Zero is rejected; values above the protocol limit are capped like the builders do.
    fn try_from(raw: RawLimits) -> Result<Self, Self::Error> {
        if raw.max_read_registers == 0 {
            return Err("max_read_registers must be at least 1".to_string());
        }
        if raw.max_read_coils == 0 {
            return Err("max_read_coils must be at least 1".to_string());
        }
        Ok(Self::new()
            .with_max_read_registers(raw.max_read_registers)
            .with_max_read_coils(raw.max_read_coils))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = DeviceLimits::default();
        assert_eq!(limits.max_read_registers, 125);
        assert_eq!(limits.max_read_coils, 2000);
    }

    #[test]
    fn test_builder_caps_at_protocol_limit() {
        let limits = DeviceLimits::new()
            .with_max_read_registers(60)
            .with_max_read_coils(5000);

        assert_eq!(limits.max_read_registers, 60);
        assert_eq!(limits.max_read_coils, 2000);
    }

    #[test]
    fn test_check_read() {
        let limits = DeviceLimits::new();

        assert!(limits.check_read(ReadFunction::HoldingRegisters, 125).is_ok());
        assert!(matches!(
            limits.check_read(ReadFunction::InputRegisters, 126),
            Err(BridgeError::Range(_))
        ));
        assert!(limits.check_read(ReadFunction::Coils, 2000).is_ok());
        assert!(limits.check_read(ReadFunction::DiscreteInputs, 2001).is_err());
    }

    #[test]
    fn test_conservative_limits() {
        let limits = DeviceLimits::conservative();
        assert_eq!(limits.max_quantity(ReadFunction::HoldingRegisters), 50);
        assert_eq!(limits.max_quantity(ReadFunction::Coils), 500);
    }

    #[test]
    fn test_deserialize_partial() {
        let limits: DeviceLimits = serde_json::from_str(r#"{"max_read_registers": 32}"#).unwrap();
        assert_eq!(limits.max_read_registers, 32);
        assert_eq!(limits.max_read_coils, 2000);
    }

    #[test]
    fn test_deserialize_caps_and_rejects() {
        let limits: DeviceLimits =
            serde_json::from_str(r#"{"max_read_registers": 500, "max_read_coils": 9000}"#).unwrap();
        assert_eq!(limits, DeviceLimits::default());

        assert!(serde_json::from_str::<DeviceLimits>(r#"{"max_read_registers": 0}"#).is_err());
        assert!(serde_json::from_str::<DeviceLimits>(r#"{"max_read_coils": 0}"#).is_err());
        assert!(serde_json::from_str::<DeviceLimits>(r#"{"max_read_regs": 10}"#).is_err());
    }

    #[test]
    fn test_builder_raises_zero() {
        let limits = DeviceLimits::new().with_max_read_registers(0).with_max_read_coils(0);
        assert_eq!(limits.max_read_registers, 1);
        assert_eq!(limits.max_read_coils, 1);
    }
}
