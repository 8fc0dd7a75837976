//! Bridge configuration
//!
//! Loaded once at startup. Every check in [`BridgeConfig::validate`] is fatal:
//! the engine never runs with an invalid configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::protocol::{DEFAULT_BAUD_RATE, DEFAULT_COM_PORT, SUPPORTED_BAUD_RATES};

/// Shortest allowed poll interval in ticks
pub const MIN_POLL_INTERVAL: u32 = 2;
/// Longest allowed poll interval in ticks
pub const MAX_POLL_INTERVAL: u32 = 180;

/// Configuration errors, all fatal at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No zones configured")]
    NoZones,

    #[error("Zone name must not be empty")]
    EmptyZoneName,

    #[error("Duplicate zone name: {0}")]
    DuplicateZoneName(String),

    #[error("Duplicate zone address {address} (zone '{zone}')")]
    DuplicateZoneAddress { zone: String, address: u8 },

    #[error("Zone '{zone}' has invalid address {address}, valid addresses are 1-255")]
    InvalidAddress { zone: String, address: u8 },

    #[error("Poll interval {0} out of range (2-180)")]
    InvalidPollInterval(u32),

    #[error("Response timeout must be at least one tick")]
    InvalidResponseTimeout,

    #[error("Unsupported baud rate: {0}")]
    InvalidBaudRate(u32),
}

/// Temperature scale reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Degrees Celsius
    Celsius,
    /// Degrees Fahrenheit
    #[default]
    Fahrenheit,
}

impl Units {
    /// Name used in `hvac.zoneinfo` replies
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Celsius => "celsius",
            Units::Fahrenheit => "fahrenheit",
        }
    }
}

/// A configured zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Zone name used on the message bus
    pub name: String,
    /// Thermostat bus address
    pub address: u8,
}

/// Bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Serial device path
    #[serde(default = "default_com_port")]
    pub com_port: String,

    /// Serial baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// xPL instance id
    #[serde(default = "default_instance")]
    pub instance: String,

    /// Ticks between successive zone polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u32,

    /// Ticks to wait for a device reply before abandoning it
    #[serde(default = "default_response_timeout")]
    pub response_timeout: u32,

    /// Temperature scale
    #[serde(default)]
    pub units: Units,

    /// Zones in polling order
    #[serde(default)]
    pub zones: Vec<ZoneConfig>,
}

fn default_com_port() -> String {
    DEFAULT_COM_PORT.to_string()
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_instance() -> String {
    "default".to_string()
}

fn default_poll_interval() -> u32 {
    5
}

fn default_response_timeout() -> u32 {
    5
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            com_port: default_com_port(),
            baud_rate: default_baud_rate(),
            instance: default_instance(),
            poll_interval: default_poll_interval(),
            response_timeout: default_response_timeout(),
            units: Units::default(),
            zones: Vec::new(),
        }
    }
}

impl BridgeConfig {
    /// Load a JSON config file. The result is not validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a JSON config document. The result is not validated.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check every startup constraint
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_BAUD_RATES.contains(&self.baud_rate) {
            return Err(ConfigError::InvalidBaudRate(self.baud_rate));
        }
        if !(MIN_POLL_INTERVAL..=MAX_POLL_INTERVAL).contains(&self.poll_interval) {
            return Err(ConfigError::InvalidPollInterval(self.poll_interval));
        }
        if self.response_timeout == 0 {
            return Err(ConfigError::InvalidResponseTimeout);
        }
        if self.zones.is_empty() {
            return Err(ConfigError::NoZones);
        }

        let mut names = HashSet::new();
        let mut addresses = HashSet::new();
        for zone in &self.zones {
            if zone.name.trim().is_empty() {
                return Err(ConfigError::EmptyZoneName);
            }
            if zone.address == 0 {
                return Err(ConfigError::InvalidAddress {
                    zone: zone.name.clone(),
                    address: zone.address,
                });
            }
            if !names.insert(zone.name.to_ascii_lowercase()) {
                return Err(ConfigError::DuplicateZoneName(zone.name.clone()));
            }
            if !addresses.insert(zone.address) {
                return Err(ConfigError::DuplicateZoneAddress {
                    zone: zone.name.clone(),
                    address: zone.address,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(name: &str, address: u8) -> ZoneConfig {
        ZoneConfig {
            name: name.to_string(),
            address,
        }
    }

    fn config_with(zones: Vec<ZoneConfig>) -> BridgeConfig {
        BridgeConfig {
            zones,
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_from_minimal_json() {
        let cfg = BridgeConfig::from_json(r#"{"zones":[{"name":"living","address":2}]}"#).unwrap();
        assert_eq!(cfg.com_port, "/dev/ttyS0");
        assert_eq!(cfg.baud_rate, 9600);
        assert_eq!(cfg.poll_interval, 5);
        assert_eq!(cfg.units, Units::Fahrenheit);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_units_parse() {
        let cfg = BridgeConfig::from_json(r#"{"units":"celsius"}"#).unwrap();
        assert_eq!(cfg.units, Units::Celsius);
        assert!(BridgeConfig::from_json(r#"{"units":"kelvin"}"#).is_err());
    }

    #[test]
    fn test_no_zones() {
        assert!(matches!(
            config_with(vec![]).validate(),
            Err(ConfigError::NoZones)
        ));
    }

    #[test]
    fn test_duplicate_name_case_insensitive() {
        let cfg = config_with(vec![zone("Living", 1), zone("living", 2)]);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::DuplicateZoneName(_))
        ));
    }

    #[test]
    fn test_duplicate_address() {
        let cfg = config_with(vec![zone("living", 1), zone("bedroom", 1)]);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::DuplicateZoneAddress { address: 1, .. })
        ));
    }

    #[test]
    fn test_address_zero_rejected() {
        let cfg = config_with(vec![zone("living", 0)]);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_address_out_of_u8_range_fails_parse() {
        let res = BridgeConfig::from_json(r#"{"zones":[{"name":"living","address":256}]}"#);
        assert!(matches!(res, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_poll_interval_bounds() {
        let mut cfg = config_with(vec![zone("living", 1)]);
        cfg.poll_interval = 1;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidPollInterval(1))
        ));
        cfg.poll_interval = 181;
        assert!(cfg.validate().is_err());
        cfg.poll_interval = 180;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_bad_baud_rate() {
        let mut cfg = config_with(vec![zone("living", 1)]);
        cfg.baud_rate = 300;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidBaudRate(300))
        ));
    }
}
