//! # Lansend Core Library
//!
//! `lansend-core` implements the protocol engine of a LocalSend-compatible
//! local network file transfer tool.
//!
//! ## Features
//!
//! - **Multicast discovery**: periodic and reactive UDP announcements on
//!   `224.0.0.167:53317`, with self-suppression and peer deduplication
//! - **Transfer sessions**: prepare-upload, per-file bearer tokens, streamed
//!   uploads and idempotent cancellation
//! - **Sender**: the negotiating half of the same wire contract
//!
//! ## Modules
//!
//! - [`config`] - Configuration management
//! - [`discovery`] - Multicast announce/listen and the peer registry
//! - [`error`] - Error types
//! - [`mod@file`] - Download store and file name sanitization
//! - [`identity`] - Local device identity
//! - [`protocol`] - Wire messages shared by both halves of the protocol
//! - [`sender`] - Sending side (prepare-upload and upload client)
//! - [`server`] - Receiving side HTTP routes
//! - [`session`] - Transfer session table and upload tokens
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lansend_core::{config::Config, identity::DeviceIdentity, sender::Sender};
//!
//! let config = Config::load()?;
//! let identity = Arc::new(DeviceIdentity::from_config(&config));
//! let sender = Sender::new(identity, &config.sender)?;
//! sender.send_file("192.168.1.20", 53317, "report.txt".as_ref()).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

pub mod config;
pub mod discovery;
pub mod error;
pub mod file;
pub mod identity;
pub mod protocol;
pub mod sender;
pub mod server;
pub mod session;

pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// LocalSend protocol version implemented by this crate
pub const PROTOCOL_VERSION: &str = "2.1";

/// Default HTTP port, also the default multicast port
pub const DEFAULT_PORT: u16 = 53317;

/// Default multicast group for announcements
pub const DEFAULT_MULTICAST_GROUP: std::net::Ipv4Addr = std::net::Ipv4Addr::new(224, 0, 0, 167);

/// Default interval between periodic announcements in seconds
pub const DEFAULT_ANNOUNCE_INTERVAL_SECS: u64 = 2;

/// Largest datagram the listener accepts
pub const UDP_BUFFER_SIZE: usize = 65535;

/// Kernel receive buffer requested for the multicast socket (1 MB)
pub const UDP_SOCKET_BUFFER_SIZE: usize = 1024 * 1024;

/// Default connect timeout for outbound HTTP in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 60;

/// Default download directory, relative to the working directory
pub const DEFAULT_DOWNLOAD_DIR: &str = "downloads";
