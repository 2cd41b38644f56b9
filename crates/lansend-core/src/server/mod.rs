//! Receiver HTTP surface.
//!
//! Serves the five LocalSend v2 routes on top of the [`SessionManager`]:
//!
//! | Method | Endpoint | Handler |
//! |--------|----------|---------|
//! | GET | /api/localsend/v2/info | device info |
//! | POST | /api/localsend/v2/register | handshake |
//! | POST | /api/localsend/v2/prepare-upload | accept an offer |
//! | POST | /api/localsend/v2/upload | stream one file |
//! | POST | /api/localsend/v2/cancel | drop a session |
//!
//! Offers are accepted without asking anyone. Other methods on these paths
//! get `405 Method Not Allowed`.

pub mod error;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        ConnectInfo, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use futures::TryStreamExt;
use tokio::net::TcpListener;
use tokio_util::io::StreamReader;
use tower_http::trace::TraceLayer;

use crate::discovery::{PeerRegistry, PeerSource};
use crate::error::{Error, Result};
use crate::file::DownloadStore;
use crate::identity::DeviceIdentity;
use crate::protocol::{
    CancelQuery, InfoDto, PrepareUploadRequest, PrepareUploadResponse, RegisterDto, UploadQuery,
    CANCEL_PATH, INFO_PATH, PREPARE_UPLOAD_PATH, REGISTER_PATH, UPLOAD_PATH,
};
use crate::session::SessionManager;

use self::error::{ApiError, ApiResult};

/// Shared state of the receiver routes.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Local identity
    pub identity: Arc<DeviceIdentity>,
    /// Session table
    pub sessions: Arc<SessionManager>,
    /// Where uploads are written
    pub store: Arc<DownloadStore>,
    /// Peers seen through register
    pub peers: Arc<PeerRegistry>,
    /// Upper bound on a single upload
    pub upload_timeout: Duration,
}

impl AppState {
    /// Create state with fresh sessions and registry.
    #[must_use]
    pub fn new(identity: Arc<DeviceIdentity>, store: DownloadStore) -> Self {
        Self {
            identity,
            sessions: Arc::new(SessionManager::new()),
            store: Arc::new(store),
            peers: Arc::new(PeerRegistry::new()),
            upload_timeout: Duration::from_secs(60 * 60),
        }
    }
}

/// Build the router for the receiver routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(INFO_PATH, get(info))
        .route(REGISTER_PATH, post(register))
        .route(PREPARE_UPLOAD_PATH, post(prepare_upload))
        .route(UPLOAD_PATH, post(upload))
        .route(CANCEL_PATH, post(cancel))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the HTTP listener on all interfaces.
///
/// # Errors
///
/// Returns an error if the port cannot be bound.
pub async fn bind(port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Transport(format!("failed to bind {addr}: {e}")))
}

/// Serve the receiver routes until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("HTTP server listening on {}", addr);
    }

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .map_err(|e| Error::Transport(format!("HTTP server failed: {e}")))
}

async fn info(State(state): State<AppState>) -> Json<InfoDto> {
    Json(state.identity.to_info())
}

async fn register(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    payload: std::result::Result<Json<RegisterDto>, JsonRejection>,
) -> ApiResult<Json<RegisterDto>> {
    let Json(peer) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    tracing::info!(
        "Register from {} ({}) at {}",
        peer.alias,
        peer.fingerprint.as_deref().unwrap_or("no fingerprint"),
        remote.ip()
    );
    if let Some(fingerprint) = peer.fingerprint.as_deref() {
        if !state.identity.is_self(fingerprint) {
            state
                .peers
                .record(fingerprint, &peer, remote.ip(), PeerSource::Register)
                .await;
        }
    }

    Ok(Json(state.identity.to_register()))
}

async fn prepare_upload(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PrepareUploadRequest>, JsonRejection>,
) -> ApiResult<Json<PrepareUploadResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let response = state
        .sessions
        .prepare_upload(request.info, request.files)
        .await?;
    Ok(Json(response))
}

async fn upload(
    State(state): State<AppState>,
    query: std::result::Result<Query<UploadQuery>, QueryRejection>,
    body: Body,
) -> ApiResult<StatusCode> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let ticket = state.sessions.begin_upload(&query).await?;
    let file_name = &ticket.descriptor.file_name;

    tracing::info!(session = %ticket.session_id, "Receiving {}", file_name);

    let stream = body.into_data_stream().map_err(std::io::Error::other);
    let result = state
        .store
        .receive(
            file_name,
            StreamReader::new(stream),
            &ticket.cancel,
            state.upload_timeout,
        )
        .await;

    state.sessions.finish_upload(&ticket, result.is_ok()).await;

    let received = result.map_err(|e| {
        tracing::debug!(session = %ticket.session_id, "Upload of {} failed: {}", file_name, e);
        ApiError::from(e)
    })?;

    if received.bytes != ticket.descriptor.size {
        tracing::warn!(
            session = %ticket.session_id,
            "Size mismatch for {}: received {} bytes, expected {}",
            file_name,
            received.bytes,
            ticket.descriptor.size
        );
    }

    tracing::info!(
        session = %ticket.session_id,
        "Received {} ({} bytes)",
        received.path.display(),
        received.bytes
    );

    Ok(StatusCode::OK)
}

async fn cancel(
    State(state): State<AppState>,
    query: std::result::Result<Query<CancelQuery>, QueryRejection>,
) -> StatusCode {
    if let Ok(Query(CancelQuery {
        session_id: Some(session_id),
    })) = query
    {
        state.sessions.cancel(&session_id).await;
    }
    StatusCode::OK
}
