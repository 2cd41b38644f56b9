//! Sending side of the transfer protocol.
//!
//! [`Sender::send_file`] drives one transfer:
//!
//! 1. Describe the local file (fresh file id, MIME type, optional hash)
//! 2. `POST /prepare-upload` with our identity and a one-file offer
//! 3. Take the token issued for our file id
//! 4. `POST /upload` with the file streamed as the request body
//!
//! A non-success response at any step fails the send with the peer's
//! status and body. Once a session exists, a failed send is followed by a
//! best-effort cancel so the peer can drop it.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, Response};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::config::SenderConfig;
use crate::error::{Error, Result};
use crate::file;
use crate::identity::DeviceIdentity;
use crate::protocol::{
    FileDto, InfoDto, PrepareUploadRequest, PrepareUploadResponse, ProtocolType, RegisterDto,
    CANCEL_PATH, INFO_PATH, PREPARE_UPLOAD_PATH, REGISTER_PATH, UPLOAD_PATH,
};

/// Outcome of a completed send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    /// Session the peer created
    pub session_id: String,
    /// File id we offered
    pub file_id: String,
    /// File name we offered
    pub file_name: String,
    /// Bytes uploaded
    pub bytes: u64,
}

/// HTTP client for a peer's receiver routes.
#[derive(Debug, Clone)]
pub struct Sender {
    client: Client,
    identity: Arc<DeviceIdentity>,
    scheme: ProtocolType,
    request_timeout: Duration,
    hash_files: bool,
}

impl Sender {
    /// Create a sender.
    ///
    /// For HTTPS peers self-signed certificates are accepted, since LocalSend
    /// devices generate their own.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(identity: Arc<DeviceIdentity>, config: &SenderConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .danger_accept_invalid_certs(config.scheme == ProtocolType::Https)
            .build()?;

        Ok(Self {
            client,
            identity,
            scheme: config.scheme,
            request_timeout: config.request_timeout,
            hash_files: config.hash_files,
        })
    }

    /// Build the URL of a route on a peer.
    #[must_use]
    pub fn url(&self, address: &str, port: u16, path: &str) -> String {
        let host = match address.parse::<IpAddr>() {
            Ok(IpAddr::V6(v6)) => format!("[{v6}]"),
            _ => address.to_string(),
        };
        format!("{}://{host}:{port}{path}", self.scheme.scheme())
    }

    /// Describe a local file as an offer entry with a fresh file id.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, is not a regular file
    /// or cannot be read for hashing.
    pub async fn describe_file(&self, path: &Path) -> Result<FileDto> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.display().to_string())
            } else {
                Error::Io(e)
            }
        })?;
        if !metadata.is_file() {
            return Err(Error::InvalidPath(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| Error::InvalidPath(path.display().to_string()))?;

        let file_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        let hash = if self.hash_files {
            Some(file::hash_file(path).await?)
        } else {
            None
        };

        let modified = metadata.modified().ok().map(|time| {
            let time: DateTime<Utc> = time.into();
            serde_json::json!({ "modified": time.to_rfc3339() })
        });

        Ok(FileDto {
            id: Uuid::new_v4().to_string(),
            file_name,
            size: metadata.len(),
            file_type,
            hash,
            preview: None,
            metadata: modified,
            legacy: false,
        })
    }

    /// Query a peer's device info.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or is rejected.
    pub async fn fetch_info(&self, address: &str, port: u16) -> Result<InfoDto> {
        let response = self
            .client
            .get(self.url(address, port, INFO_PATH))
            .timeout(self.request_timeout)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Introduce ourselves to a peer.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or is rejected.
    pub async fn register(&self, address: &str, port: u16) -> Result<RegisterDto> {
        let response = self
            .client
            .post(self.url(address, port, REGISTER_PATH))
            .timeout(self.request_timeout)
            .json(&self.identity.to_register())
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Offer files to a peer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] on a non-success response, or an error if
    /// the request fails.
    pub async fn prepare_upload(
        &self,
        address: &str,
        port: u16,
        files: HashMap<String, FileDto>,
    ) -> Result<PrepareUploadResponse> {
        let request = PrepareUploadRequest {
            info: self.identity.to_register(),
            files,
        };

        let url = self.url(address, port, PREPARE_UPLOAD_PATH);
        tracing::debug!("Sending prepare-upload to {}", url);

        let response = self
            .client
            .post(url)
            .timeout(self.request_timeout)
            .json(&request)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Stream a local file to the upload route.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rejected`] on a non-success response, or an error if
    /// the file cannot be opened or the request fails.
    pub async fn upload(
        &self,
        address: &str,
        port: u16,
        credentials: (&str, &str, &str),
        path: &Path,
    ) -> Result<u64> {
        let (session_id, file_id, token) = credentials;
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();

        let response = self
            .client
            .post(self.url(address, port, UPLOAD_PATH))
            .query(&[("sessionId", session_id), ("fileId", file_id), ("token", token)])
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, size)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await?;
        check(response).await?;

        Ok(size)
    }

    /// Ask a peer to drop a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or is rejected.
    pub async fn cancel(&self, address: &str, port: u16, session_id: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url(address, port, CANCEL_PATH))
            .query(&[("sessionId", session_id)])
            .timeout(self.request_timeout)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Send one file to a peer.
    ///
    /// # Errors
    ///
    /// - [`Error::FileNotFound`] if the file does not exist
    /// - [`Error::Rejected`] if the peer refuses the offer or the upload
    /// - [`Error::MissingToken`] if the peer issued no token for our file
    /// - [`Error::Http`] on connection failures
    pub async fn send_file(&self, address: &str, port: u16, path: &Path) -> Result<SendReport> {
        let descriptor = self.describe_file(path).await?;
        let file_id = descriptor.id.clone();
        let file_name = descriptor.file_name.clone();

        tracing::info!(
            "Offering {} ({}) to {}:{}",
            file_name,
            file::format_size(descriptor.size),
            address,
            port
        );

        let files = HashMap::from([(file_id.clone(), descriptor)]);
        let prepared = self.prepare_upload(address, port, files).await?;
        let session_id = prepared.session_id;

        let Some(token) = prepared.files.get(&file_id) else {
            self.cancel_quietly(address, port, &session_id).await;
            return Err(Error::MissingToken(file_id));
        };

        tracing::debug!(session = %session_id, "Uploading {}", file_name);
        let bytes = match self
            .upload(address, port, (&session_id, &file_id, token), path)
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                self.cancel_quietly(address, port, &session_id).await;
                return Err(e);
            }
        };

        tracing::info!(session = %session_id, "Sent {} ({} bytes)", file_name, bytes);

        Ok(SendReport {
            session_id,
            file_id,
            file_name,
            bytes,
        })
    }

    async fn cancel_quietly(&self, address: &str, port: u16, session_id: &str) {
        if let Err(e) = self.cancel(address, port, session_id).await {
            tracing::debug!(session = %session_id, "Cancel after failed send also failed: {}", e);
        }
    }
}

/// Turn a non-success response into [`Error::Rejected`].
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Rejected {
        status: status.as_u16(),
        body,
    })
}
