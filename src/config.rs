//! Bridge-wide configuration.
//!
//! Per-channel settings come from the JSON parameters of each channel; this
//! struct carries only what applies to the whole bridge.

use std::time::Duration;

use serde::Deserialize;

use crate::connection::LinkSettings;
use crate::device_limits::DeviceLimits;
use crate::error::{BridgeError, BridgeResult};

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Prefix turned into a device path together with a serial port index.
pub fn default_serial_port_prefix() -> String {
    if cfg!(windows) {
        "COM".to_string()
    } else {
        "/dev/ttyS".to_string()
    }
}

/// Bridge configuration.
///
/// # Example
///
/// ```rust
/// use modbus_bridge::{BridgeConfig, DeviceLimits};
///
/// let config = BridgeConfig::new()
///     .with_tick_interval_ms(250)
///     .with_limits(DeviceLimits::conservative());
///
/// assert_eq!(config.tick_interval().as_millis(), 250);
/// assert_eq!(config.limits.max_read_registers, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Housekeeping tick of the runtime loop
    pub tick_interval_ms: u64,
    pub serial_port_prefix: String,
    /// Hex-dump every frame at debug level
    pub packet_logging: bool,
    pub limits: DeviceLimits,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            serial_port_prefix: default_serial_port_prefix(),
            packet_logging: false,
            limits: DeviceLimits::default(),
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a JSON object. Missing fields take their defaults;
    /// unknown fields are rejected.
    pub fn from_json(json: &str) -> BridgeResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if !value.is_object() {
            return Err(BridgeError::parse("bridge configuration must be a JSON object"));
        }
        let config: Self = serde_json::from_value(value)?;
        if config.tick_interval_ms == 0 {
            return Err(BridgeError::range("tick_interval_ms must be positive"));
        }
        Ok(config)
    }

    /// Zero is raised to one millisecond.
    pub fn with_tick_interval_ms(mut self, ms: u64) -> Self {
        self.tick_interval_ms = ms.max(1);
        self
    }

    pub fn with_serial_port_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.serial_port_prefix = prefix.into();
        self
    }

    pub fn with_packet_logging(mut self, enabled: bool) -> Self {
        self.packet_logging = enabled;
        self
    }

    pub fn with_limits(mut self, limits: DeviceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            serial_port_prefix: self.serial_port_prefix.clone(),
            packet_logging: self.packet_logging,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert!(!config.packet_logging);
        assert_eq!(config.limits, DeviceLimits::default());
        assert_eq!(config.link_settings(), LinkSettings::default());
    }

    #[test]
    fn test_from_json_partial() {
        let config = BridgeConfig::from_json(
            r#"{"packet_logging": true, "serial_port_prefix": "/dev/ttyUSB", "limits": {"max_read_registers": 60}}"#,
        )
        .unwrap();
        assert!(config.packet_logging);
        assert_eq!(config.tick_interval_ms, DEFAULT_TICK_INTERVAL_MS);
        assert_eq!(config.limits.max_read_registers, 60);
        assert_eq!(config.limits.max_read_coils, DeviceLimits::default().max_read_coils);
        assert_eq!(config.link_settings().serial_port_prefix, "/dev/ttyUSB");
    }

    #[test]
    fn test_from_json_rejects_zero_tick() {
        assert!(matches!(
            BridgeConfig::from_json(r#"{"tick_interval_ms": 0}"#),
            Err(BridgeError::Range(_))
        ));
    }

    #[test]
    fn test_from_json_requires_object() {
        for json in ["[1]", "[]", "1", "\"x\"", "null"] {
            assert!(
                matches!(BridgeConfig::from_json(json), Err(BridgeError::Parse(_))),
                "{}",
                json
            );
        }
    }

    #[test]
    fn test_from_json_rejects_unknown_fields() {
        let err = BridgeConfig::from_json(r#"{"tick_interval": 10}"#).unwrap_err();
        assert!(matches!(err, BridgeError::Parse(_)));
        let err = BridgeConfig::from_json(r#"{"limits": {"max_registers": 10}}"#).unwrap_err();
        assert!(matches!(err, BridgeError::Parse(_)));
    }

    #[test]
    fn test_from_json_validates_limits() {
        let config =
            BridgeConfig::from_json(r#"{"limits": {"max_read_registers": 500, "max_read_coils": 9000}}"#).unwrap();
        assert_eq!(config.limits.max_read_registers, 125);
        assert_eq!(config.limits.max_read_coils, 2000);

        let err = BridgeConfig::from_json(r#"{"limits": {"max_read_registers": 0}}"#).unwrap_err();
        assert!(matches!(err, BridgeError::Parse(_)));
        let err = BridgeConfig::from_json(r#"{"limits": {"max_read_coils": 0}}"#).unwrap_err();
        assert!(matches!(err, BridgeError::Parse(_)));
    }

    #[test]
    fn test_builders() {
        let config = BridgeConfig::new()
            .with_tick_interval_ms(0)
            .with_serial_port_prefix("COM")
            .with_packet_logging(true);
        assert_eq!(config.tick_interval_ms, 1);
        assert_eq!(config.link_settings().serial_port_prefix, "COM");
        assert!(config.link_settings().packet_logging);
    }
}
