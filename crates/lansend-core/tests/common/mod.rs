//! Common test utilities for `Lansend` integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lansend_core::config::SenderConfig;
use lansend_core::file::DownloadStore;
use lansend_core::identity::DeviceIdentity;
use lansend_core::sender::Sender;
use lansend_core::server::{self, AppState};
use tokio::sync::oneshot;

/// Create a temporary directory for test files.
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Create a test file with the given content.
pub fn create_test_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent directories");
    }
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Generate random bytes for testing.
pub fn random_bytes(size: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut bytes = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// A receiver serving on an ephemeral loopback port.
pub struct TestReceiver {
    pub addr: SocketAddr,
    pub state: AppState,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestReceiver {
    /// Start a receiver writing into `download_dir`.
    pub async fn start(download_dir: &Path) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("local addr");

        let identity = Arc::new(DeviceIdentity::new("Receiver", "test", addr.port()));
        let state = AppState::new(identity, DownloadStore::new(download_dir));

        let (tx, rx) = oneshot::channel::<()>();
        let served = state.clone();
        tokio::spawn(async move {
            let shutdown = async {
                let _ = rx.await;
            };
            server::serve(listener, served, shutdown)
                .await
                .expect("Server failed");
        });

        Self {
            addr,
            state,
            shutdown: Some(tx),
        }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

impl Drop for TestReceiver {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Serve an arbitrary router on an ephemeral loopback port, standing in
/// for a peer with scripted responses.
pub async fn spawn_peer(router: axum::Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind peer listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Peer failed");
    });
    addr
}

/// Create a plain-HTTP sender with a fresh identity.
pub fn create_sender() -> Sender {
    let identity = Arc::new(DeviceIdentity::new("Sender", "test", 53317));
    Sender::new(identity, &SenderConfig::default()).expect("Failed to build sender")
}
