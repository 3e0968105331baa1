//! Build-time device configuration
//!
//! `switch.toml` is embedded into the binary and parsed once at boot. Nothing here can change
//! while the device runs; a new configuration means a new build.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::connectivity::link::LinkPolicy;
use crate::device::button::PressThresholds;

const EMBEDDED_CONFIG: &str = include_str!("../switch.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct SwitchConfig {
    pub device: DeviceConfig,
    pub network: NetworkConfig,
    pub broker: BrokerConfig,
    pub gpio: GpioConfig,
    pub timing: TimingConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    /// Suffix of the host name, which becomes `esp8266-<name>`
    pub name: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "switch".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Interface whose link state decides whether the network is up
    pub interface: String,
    /// Command spawned (never awaited) to kick off a new association
    pub reconnect_command: Vec<String>,
    pub retry_interval_ms: u64,
    pub max_failures: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interface: "wlan0".to_string(),
            reconnect_command: vec![
                "wpa_cli".to_string(),
                "-i".to_string(),
                "wlan0".to_string(),
                "reconnect".to_string(),
            ],
            retry_interval_ms: 1000,
            max_failures: 150,
        }
    }
}

impl NetworkConfig {
    pub fn policy(&self) -> LinkPolicy {
        LinkPolicy {
            retry_interval_ms: self.retry_interval_ms,
            max_failures: self.max_failures,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    /// Upper bound of the blocking connect attempt
    pub connect_timeout_ms: u64,
    /// Budget per event-loop poll while draining inbound messages
    pub poll_timeout_ms: u64,
    pub retry_interval_ms: u64,
    pub max_failures: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            user: None,
            password: None,
            keep_alive_secs: 15,
            connect_timeout_ms: 500,
            poll_timeout_ms: 5,
            retry_interval_ms: 5000,
            max_failures: 10,
        }
    }
}

impl BrokerConfig {
    pub fn policy(&self) -> LinkPolicy {
        LinkPolicy {
            retry_interval_ms: self.retry_interval_ms,
            max_failures: self.max_failures,
        }
    }
}

/// BCM pin numbers
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GpioConfig {
    pub relay_pin: u8,
    pub led_pin: u8,
    pub button_pin: u8,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            relay_pin: 17,
            led_pin: 27,
            button_pin: 22,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    pub debounce_ms: u64,
    pub short_press_ms: u64,
    pub medium_press_ms: u64,
    pub long_press_ms: u64,
    pub status_interval_ms: u64,
    /// Delay after driving the relay, masks coil bounce
    pub settle_ms: u64,
    /// Pause between two loop iterations
    pub tick_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 35,
            short_press_ms: 1000,
            medium_press_ms: 5000,
            long_press_ms: 60000,
            status_interval_ms: 60000,
            settle_ms: 50,
            tick_ms: 10,
        }
    }
}

impl TimingConfig {
    pub fn thresholds(&self) -> PressThresholds {
        PressThresholds {
            short_ms: self.short_press_ms,
            medium_ms: self.medium_press_ms,
            long_ms: self.long_press_ms,
        }
    }
}

impl SwitchConfig {
    /// Parses the configuration compiled into the binary
    pub fn embedded() -> Result<Self, ConfigError> {
        let config = Self::from_toml(EMBEDDED_CONFIG)?;
        info!(
            "Loaded embedded configuration for device '{}'",
            config.device.name
        );
        Ok(config)
    }

    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config: SwitchConfig = toml::from_str(source)?;
        config.validate()?;
        debug!("Configuration: {:?}", config);
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.device.name.trim().is_empty() {
            return Err(ConfigError::Invalid("device.name must not be empty".into()));
        }
        if self.broker.host.trim().is_empty() {
            return Err(ConfigError::Invalid("broker.host must not be empty".into()));
        }

        let intervals = [
            ("network.retry_interval_ms", self.network.retry_interval_ms),
            ("broker.retry_interval_ms", self.broker.retry_interval_ms),
            ("broker.connect_timeout_ms", self.broker.connect_timeout_ms),
            ("timing.debounce_ms", self.timing.debounce_ms),
            ("timing.status_interval_ms", self.timing.status_interval_ms),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{} must be non-zero", name)));
        }

        let t = &self.timing;
        if !(t.short_press_ms < t.medium_press_ms && t.medium_press_ms < t.long_press_ms) {
            return Err(ConfigError::Invalid(format!(
                "press thresholds must increase: short={} medium={} long={}",
                t.short_press_ms, t.medium_press_ms, t.long_press_ms
            )));
        }

        Ok(())
    }
}
