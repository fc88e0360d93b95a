use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Driver used when the configuration does not name one
pub const DEFAULT_DRIVER: &str = "mock";

/// Default interval between event pumps (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Longest poll interval accepted (milliseconds)
pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;

/// Driver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    /// Registered driver name
    pub name: String,
    /// Emit diagnostic traces for every send and receive
    pub debug: bool,
    /// Modem device path, e.g. `/dev/ttyUSB0`
    pub device: Option<String>,
    /// MSISDN of the modem's own SIM
    pub own_number: Option<String>,
    /// Interval between event pumps (milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_DRIVER.to_string(),
            debug: false,
            device: None,
            own_number: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Invalid parameter value
    #[error("invalid {parameter} = {value}: {reason}")]
    InvalidParameter { parameter: String, value: String, reason: String },
    /// Configuration file I/O error
    #[error("{message}")]
    IoError { message: String },
    /// JSON serialization/deserialization error
    #[error("{message}")]
    SerializationError { message: String },
}

impl DriverConfig {
    /// Configuration with tracing switched on
    pub fn debug() -> Self {
        Self {
            debug: true,
            ..Default::default()
        }
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: DriverConfig = serde_json::from_str(json).map_err(|e| {
            ConfigError::SerializationError {
                message: format!("Failed to parse driver config: {}", e),
            }
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            message: format!("Failed to read config file '{}': {}", path_str, e),
        })?;

        Self::from_json_str(&content)
    }

    /// Save configuration to JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = serde_json::to_string_pretty(self).map_err(|e| {
            ConfigError::SerializationError {
                message: format!("Failed to serialize config: {}", e),
            }
        })?;

        fs::write(&path, content).map_err(|e| ConfigError::IoError {
            message: format!("Failed to write config file '{}': {}", path_str, e),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(invalid("name", &self.name, "driver name must not be empty"));
        }

        if self.poll_interval_ms == 0 || self.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(invalid(
                "poll_interval_ms",
                &self.poll_interval_ms.to_string(),
                "must be between 1 and 60000",
            ));
        }

        if let Some(device) = &self.device {
            if device.trim().is_empty() {
                return Err(invalid("device", device, "device path must not be empty"));
            }
        }

        if let Some(number) = &self.own_number {
            let digits = number.strip_prefix('+').unwrap_or(number);
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid("own_number", number, "expected an MSISDN such as +15551234"));
            }
        }

        Ok(())
    }
}

fn invalid(parameter: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter: parameter.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
