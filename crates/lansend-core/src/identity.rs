//! Local device identity.
//!
//! The identity is built once at startup and shared read-only by discovery,
//! the receiver routes and the sender. Its fingerprint is a random UUID that
//! stays stable for the lifetime of the process.

use uuid::Uuid;

use crate::config::Config;
use crate::protocol::{DeviceType, InfoDto, MulticastDto, ProtocolType, RegisterDto};

/// How this device presents itself to peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Display name
    pub alias: String,
    /// Protocol version string
    pub version: String,
    /// Device model label
    pub device_model: String,
    /// Device type
    pub device_type: DeviceType,
    /// Random per-process identifier
    pub fingerprint: String,
    /// HTTP port the receiver listens on
    pub port: u16,
    /// Scheme the receiver serves
    pub protocol: ProtocolType,
    /// Download API support (never offered here)
    pub download: bool,
}

impl DeviceIdentity {
    /// Create an identity with a fresh fingerprint.
    #[must_use]
    pub fn new(alias: impl Into<String>, device_model: impl Into<String>, port: u16) -> Self {
        Self {
            alias: alias.into(),
            version: crate::PROTOCOL_VERSION.to_string(),
            device_model: device_model.into(),
            device_type: DeviceType::Desktop,
            fingerprint: Uuid::new_v4().to_string(),
            port,
            protocol: ProtocolType::Http,
            download: false,
        }
    }

    /// Build the identity from configuration.
    ///
    /// The receiver only serves plain HTTP, so the advertised scheme is
    /// always `http` regardless of the sender's scheme setting.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut identity = Self::new(
            config.device.alias.clone(),
            config.device.device_model.clone(),
            config.network.port,
        );
        identity.device_type = config.device.device_type;
        identity
    }

    /// Multicast packet for this device.
    #[must_use]
    pub fn to_announcement(&self, announce: bool) -> MulticastDto {
        MulticastDto {
            alias: self.alias.clone(),
            version: Some(self.version.clone()),
            device_model: Some(self.device_model.clone()),
            device_type: Some(self.device_type),
            fingerprint: self.fingerprint.clone(),
            port: Some(self.port),
            protocol: Some(self.protocol),
            download: self.download,
            announce,
        }
    }

    /// Payload of `GET /info`.
    #[must_use]
    pub fn to_info(&self) -> InfoDto {
        InfoDto {
            alias: self.alias.clone(),
            version: Some(self.version.clone()),
            device_model: Some(self.device_model.clone()),
            device_type: Some(self.device_type),
            fingerprint: Some(self.fingerprint.clone()),
            download: self.download,
        }
    }

    /// Register-shaped payload, used by `/register` and as sender info.
    #[must_use]
    pub fn to_register(&self) -> RegisterDto {
        RegisterDto {
            alias: self.alias.clone(),
            version: Some(self.version.clone()),
            device_model: Some(self.device_model.clone()),
            device_type: Some(self.device_type),
            fingerprint: Some(self.fingerprint.clone()),
            port: Some(self.port),
            protocol: Some(self.protocol),
            download: self.download,
        }
    }

    /// Whether a peer fingerprint is our own.
    #[must_use]
    pub fn is_self(&self, fingerprint: &str) -> bool {
        self.fingerprint == fingerprint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprints_are_unique() {
        let a = DeviceIdentity::new("A", "linux", 53317);
        let b = DeviceIdentity::new("A", "linux", 53317);

        assert_ne!(a.fingerprint, b.fingerprint);
        assert!(Uuid::parse_str(&a.fingerprint).is_ok());
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.device.alias = "Office".to_string();
        config.device.device_type = DeviceType::Server;
        config.network.port = 4000;

        let identity = DeviceIdentity::from_config(&config);

        assert_eq!(identity.alias, "Office");
        assert_eq!(identity.device_type, DeviceType::Server);
        assert_eq!(identity.port, 4000);
        assert_eq!(identity.version, "2.1");
        assert_eq!(identity.protocol, ProtocolType::Http);
        assert!(!identity.download);
    }

    #[test]
    fn test_payloads_share_fingerprint() {
        let identity = DeviceIdentity::new("A", "linux", 53317);

        assert_eq!(identity.to_announcement(true).fingerprint, identity.fingerprint);
        assert_eq!(identity.to_info().fingerprint.as_deref(), Some(identity.fingerprint.as_str()));
        assert_eq!(
            identity.to_register().fingerprint.as_deref(),
            Some(identity.fingerprint.as_str())
        );
        assert!(identity.is_self(&identity.fingerprint));
        assert!(!identity.is_self("someone-else"));
    }

    #[test]
    fn test_announcement_flag() {
        let identity = DeviceIdentity::new("A", "linux", 53317);
        assert!(identity.to_announcement(true).announce);
        assert!(!identity.to_announcement(false).announce);
    }
}
