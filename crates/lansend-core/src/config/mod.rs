//! Configuration management for Lansend.
//!
//! This module handles loading, saving, and validating Lansend configuration.
//!
//! ## Configuration File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/lansend/config.toml` |
//! | macOS | `~/Library/Application Support/Lansend/config.toml` |
//! | Windows | `%APPDATA%\Lansend\config.toml` |
//!
//! ## Example
//!
//! ```rust,ignore
//! use lansend_core::config::Config;
//!
//! let config = Config::load()?;
//! println!("Alias: {}", config.device.alias);
//! ```

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::{DeviceType, ProtocolType};

/// Main configuration struct for Lansend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device identity settings
    pub device: DeviceConfig,
    /// Network settings
    pub network: NetworkConfig,
    /// Receiving side settings
    pub receiver: ReceiverConfig,
    /// Sending side settings
    pub sender: SenderConfig,
}

/// Device identity options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Display name announced on the network
    pub alias: String,
    /// Device model label
    pub device_model: String,
    /// Device type tag
    pub device_type: DeviceType,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            alias: hostname::get().map_or_else(
                |_| "Lansend Device".to_string(),
                |h| h.to_string_lossy().to_string(),
            ),
            device_model: std::env::consts::OS.to_string(),
            device_type: DeviceType::Desktop,
        }
    }
}

/// Network configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// HTTP port the receiver listens on
    pub port: u16,
    /// Multicast group for announcements
    pub multicast_group: Ipv4Addr,
    /// Multicast port for announcements
    pub multicast_port: u16,
    /// Interval between periodic announcements
    #[serde(with = "humantime_serde")]
    pub announce_interval: Duration,
    /// Minimum gap between two reciprocal announcements to the same peer
    /// (0s answers every announcement)
    #[serde(with = "humantime_serde")]
    pub reply_cooldown: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: crate::DEFAULT_PORT,
            multicast_group: crate::DEFAULT_MULTICAST_GROUP,
            multicast_port: crate::DEFAULT_PORT,
            announce_interval: Duration::from_secs(crate::DEFAULT_ANNOUNCE_INTERVAL_SECS),
            reply_cooldown: Duration::from_secs(1),
        }
    }
}

/// Receiving side options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Directory received files are written to
    pub download_dir: PathBuf,
    /// Upper bound on a single upload's byte copy
    #[serde(with = "humantime_serde")]
    pub upload_timeout: Duration,
    /// Idle sessions older than this are swept (0s keeps sessions until
    /// cancelled)
    #[serde(with = "humantime_serde")]
    pub session_ttl: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from(crate::DEFAULT_DOWNLOAD_DIR),
            upload_timeout: Duration::from_secs(60 * 60),
            session_ttl: Duration::ZERO,
        }
    }
}

impl ReceiverConfig {
    /// Session time-to-live, if expiry is enabled.
    #[must_use]
    pub fn session_ttl(&self) -> Option<Duration> {
        (!self.session_ttl.is_zero()).then_some(self.session_ttl)
    }
}

/// Sending side options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Scheme used to reach peers
    pub scheme: ProtocolType,
    /// Connection setup timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Timeout for the JSON exchanges (prepare-upload, info, register, cancel)
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Attach a SHA-256 hash to every offered file
    pub hash_files: bool,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            scheme: ProtocolType::Http,
            connect_timeout: Duration::from_secs(crate::DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(30),
            hash_files: false,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// If the configuration file doesn't exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read,
    /// parsed or validated.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::ConfigError(format!("Failed to read config: {e}")))?;

        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be parsed or is invalid.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    ///
    /// Creates the configuration directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigError(format!("Failed to create config directory: {e}"))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(&path, content)
            .map_err(|e| Error::ConfigError(format!("Failed to write config: {e}")))
    }

    /// Check values that would otherwise fail later at socket setup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if !self.network.multicast_group.is_multicast() {
            return Err(Error::InvalidConfig {
                key: "network.multicast_group".into(),
                reason: format!("{} is not a multicast address", self.network.multicast_group),
            });
        }
        if self.network.announce_interval.is_zero() {
            return Err(Error::InvalidConfig {
                key: "network.announce_interval".into(),
                reason: "must be greater than zero".into(),
            });
        }
        for (key, value) in [
            ("receiver.upload_timeout", self.receiver.upload_timeout),
            ("sender.connect_timeout", self.sender.connect_timeout),
            ("sender.request_timeout", self.sender.request_timeout),
        ] {
            if value.is_zero() {
                return Err(Error::InvalidConfig {
                    key: key.into(),
                    reason: "must be greater than zero".into(),
                });
            }
        }
        if self.device.alias.trim().is_empty() {
            return Err(Error::InvalidConfig {
                key: "device.alias".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Get the default configuration directory path.
    #[must_use]
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "lansend", "Lansend")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the full path to the configuration file.
    #[must_use]
    pub fn config_path() -> PathBuf {
        Self::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let (digits, unit) = match s.char_indices().last() {
            Some((idx, unit @ ('s' | 'm' | 'h'))) => (&s[..idx], unit),
            _ => return Err(serde::de::Error::custom("invalid duration format")),
        };
        let value: u64 = digits.parse().map_err(serde::de::Error::custom)?;
        let secs = match unit {
            'm' => value.checked_mul(60),
            'h' => value.checked_mul(3600),
            _ => Some(value),
        }
        .ok_or_else(|| serde::de::Error::custom("duration too large"))?;
        Ok(Duration::from_secs(secs))
    }
}
