//! Wire messages for the LocalSend v2 protocol.
//!
//! Every message is JSON with camelCase field names. Optional fields are
//! omitted when empty so that payloads stay byte-compatible with other
//! LocalSend implementations.
//!
//! ## Routes
//!
//! | Method | Path | Body |
//! |--------|------|------|
//! | GET | `/api/localsend/v2/info` | → [`InfoDto`] |
//! | POST | `/api/localsend/v2/register` | [`RegisterDto`] → [`RegisterDto`] |
//! | POST | `/api/localsend/v2/prepare-upload` | [`PrepareUploadRequest`] → [`PrepareUploadResponse`] |
//! | POST | `/api/localsend/v2/upload?sessionId&fileId&token` | raw bytes |
//! | POST | `/api/localsend/v2/cancel?sessionId` | empty |
//!
//! ## Multicast Packet
//!
//! ```json
//! {
//!   "alias": "Kitchen Laptop",
//!   "version": "2.1",
//!   "deviceModel": "linux",
//!   "deviceType": "desktop",
//!   "fingerprint": "0b6f1c52-...",
//!   "port": 53317,
//!   "protocol": "http",
//!   "announcement": true,
//!   "announce": true
//! }
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Device info route.
pub const INFO_PATH: &str = "/api/localsend/v2/info";

/// Register (handshake) route.
pub const REGISTER_PATH: &str = "/api/localsend/v2/register";

/// Prepare-upload route.
pub const PREPARE_UPLOAD_PATH: &str = "/api/localsend/v2/prepare-upload";

/// Upload route.
pub const UPLOAD_PATH: &str = "/api/localsend/v2/upload";

/// Cancel route.
pub const CANCEL_PATH: &str = "/api/localsend/v2/cancel";

/// Device category, used by peers to pick an icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Phone or tablet
    Mobile,
    /// Desktop or laptop
    Desktop,
    /// Browser client
    Web,
    /// Device without a screen
    Headless,
    /// Always-on server
    Server,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Mobile => "mobile",
            Self::Desktop => "desktop",
            Self::Web => "web",
            Self::Headless => "headless",
            Self::Server => "server",
        };
        f.write_str(s)
    }
}

/// Scheme a device serves its HTTP surface on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolType {
    /// Plain HTTP
    Http,
    /// HTTP over TLS (self-signed certificates)
    Https,
}

impl ProtocolType {
    /// URL scheme for this protocol.
    #[must_use]
    pub const fn scheme(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// UDP multicast announcement.
///
/// The announcing flag travels under two names on the wire
/// (`announcement` from v1, `announce` from v2). Both are written on send and
/// either one is honored on receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MulticastWire", into = "MulticastWire")]
pub struct MulticastDto {
    /// Display name
    pub alias: String,
    /// Protocol version
    pub version: Option<String>,
    /// Device model label
    pub device_model: Option<String>,
    /// Device type
    pub device_type: Option<DeviceType>,
    /// Stable per-process identifier
    pub fingerprint: String,
    /// HTTP port
    pub port: Option<u16>,
    /// HTTP scheme
    pub protocol: Option<ProtocolType>,
    /// Download API support
    pub download: bool,
    /// Whether the sender expects peers to answer with their own announcement
    pub announce: bool,
}

impl MulticastDto {
    /// Device fields of the announcement, in register shape.
    #[must_use]
    pub fn to_register(&self) -> RegisterDto {
        RegisterDto {
            alias: self.alias.clone(),
            version: self.version.clone(),
            device_model: self.device_model.clone(),
            device_type: self.device_type,
            fingerprint: Some(self.fingerprint.clone()),
            port: self.port,
            protocol: self.protocol,
            download: self.download,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MulticastWire {
    alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    device_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    device_type: Option<DeviceType>,
    fingerprint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    protocol: Option<ProtocolType>,
    #[serde(default, skip_serializing_if = "is_false")]
    download: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    announcement: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    announce: bool,
}

impl From<MulticastWire> for MulticastDto {
    fn from(wire: MulticastWire) -> Self {
        Self {
            alias: wire.alias,
            version: wire.version,
            device_model: wire.device_model,
            device_type: wire.device_type,
            fingerprint: wire.fingerprint,
            port: wire.port,
            protocol: wire.protocol,
            download: wire.download,
            announce: wire.announcement || wire.announce,
        }
    }
}

impl From<MulticastDto> for MulticastWire {
    fn from(dto: MulticastDto) -> Self {
        Self {
            alias: dto.alias,
            version: dto.version,
            device_model: dto.device_model,
            device_type: dto.device_type,
            fingerprint: dto.fingerprint,
            port: dto.port,
            protocol: dto.protocol,
            download: dto.download,
            announcement: dto.announce,
            announce: dto.announce,
        }
    }
}

/// Response body of `GET /info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoDto {
    /// Display name
    pub alias: String,
    /// Protocol version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Device model label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_model: Option<String>,
    /// Device type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<DeviceType>,
    /// Stable per-process identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    /// Download API support
    #[serde(default, skip_serializing_if = "is_false")]
    pub download: bool,
}

/// Body of `POST /register`, also the sender info inside prepare-upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDto {
    /// Display name
    pub alias: String,
    /// Protocol version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Device model label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_model: Option<String>,
    /// Device type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<DeviceType>,
    /// Stable per-process identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    /// HTTP port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// HTTP scheme
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<ProtocolType>,
    /// Download API support
    #[serde(default, skip_serializing_if = "is_false")]
    pub download: bool,
}

/// Metadata describing one offered file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDto {
    /// File id, unique within one session
    pub id: String,
    /// File name as chosen by the sender (untrusted)
    pub file_name: String,
    /// Declared size in bytes
    pub size: u64,
    /// MIME type label
    pub file_type: String,
    /// Optional content hash (SHA-256 hex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Optional text preview or thumbnail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    /// Free-form metadata such as modification time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Legacy protocol marker
    #[serde(default, skip_serializing_if = "is_false")]
    pub legacy: bool,
}

/// Body of `POST /prepare-upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepareUploadRequest {
    /// Sender identity
    pub info: RegisterDto,
    /// Offered files keyed by file id
    pub files: HashMap<String, FileDto>,
}

/// Response of `POST /prepare-upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareUploadResponse {
    /// New session id
    pub session_id: String,
    /// Upload token per file id
    pub files: HashMap<String, String>,
}

/// Query parameters of `POST /upload`.
///
/// All fields are optional at the type level so that a missing parameter is
/// reported as a malformed request instead of a generic extractor failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadQuery {
    /// Session id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// File id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    /// Upload token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Query parameters of `POST /cancel`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelQuery {
    /// Session id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human readable message
    pub message: String,
    /// Error code (e.g., "E002" for a bad session or token)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}
