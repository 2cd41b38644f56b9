//! Receiver-side transfer sessions.
//!
//! A session is created by a prepare-upload request. It holds the offered
//! files and one upload token per file, minted together before the session
//! becomes visible. Each file then moves through
//! `Pending → Uploading → Consumed`, and the whole session ends when it is
//! cancelled (or, when a TTL is configured, swept after sitting idle).
//!
//! The table lives behind a single mutex so that no caller ever observes a
//! half-built session or a cancel that is only partly applied.

mod token;

pub use token::{generate_token, validate_token};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::protocol::{FileDto, PrepareUploadResponse, RegisterDto, UploadQuery};

/// Upload progress of one offered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// Token issued, no upload started yet
    Pending,
    /// An upload is currently streaming
    Uploading,
    /// An upload completed
    Consumed,
}

#[derive(Debug)]
struct TransferSession {
    sender: RegisterDto,
    files: HashMap<String, FileDto>,
    tokens: HashMap<String, String>,
    states: HashMap<String, FileState>,
    created_at: Instant,
    cancel: CancellationToken,
}

impl TransferSession {
    fn is_uploading(&self) -> bool {
        self.states.values().any(|s| *s == FileState::Uploading)
    }
}

/// Authorization for one upload, handed out after validation.
#[derive(Debug, Clone)]
pub struct UploadTicket {
    /// Session the upload belongs to
    pub session_id: String,
    /// File being uploaded
    pub file_id: String,
    /// Descriptor from the original offer
    pub descriptor: FileDto,
    /// Fired when the session is cancelled
    pub cancel: CancellationToken,
}

/// Owner of the session table.
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: Mutex<HashMap<String, TransferSession>>,
    ttl: Option<Duration>,
}

impl SessionManager {
    /// Create a manager whose sessions live until cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager that sweeps idle sessions older than `ttl`.
    #[must_use]
    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Accept an offer: create a session and mint one token per file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedRequest`] if the offer is empty.
    pub async fn prepare_upload(
        &self,
        sender: RegisterDto,
        files: HashMap<String, FileDto>,
    ) -> Result<PrepareUploadResponse> {
        if files.is_empty() {
            return Err(Error::MalformedRequest("no files offered".to_string()));
        }

        let session_id = Uuid::new_v4().to_string();
        let tokens: HashMap<String, String> = files
            .keys()
            .map(|file_id| (file_id.clone(), generate_token()))
            .collect();
        let states = files
            .keys()
            .map(|file_id| (file_id.clone(), FileState::Pending))
            .collect();

        tracing::info!(
            session = %session_id,
            peer = %sender.alias,
            files = files.len(),
            "Accepted transfer offer"
        );
        for file in files.values() {
            tracing::debug!(session = %session_id, "  - {} ({} bytes)", file.file_name, file.size);
        }

        let response = PrepareUploadResponse {
            session_id: session_id.clone(),
            files: tokens.clone(),
        };

        let session = TransferSession {
            sender,
            files,
            tokens,
            states,
            created_at: Instant::now(),
            cancel: CancellationToken::new(),
        };

        self.sessions.lock().await.insert(session_id, session);

        Ok(response)
    }

    /// Validate upload credentials and mark the file as uploading.
    ///
    /// Checks run in a fixed order and stop at the first failure:
    /// parameters present, session exists, token matches, file offered.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedRequest`] if a parameter is missing
    /// - [`Error::Unauthorized`] if the session is unknown or the token is wrong
    /// - [`Error::UnknownFile`] if the file id is not part of the offer
    /// - [`Error::UploadInProgress`] if the file is already being uploaded
    pub async fn begin_upload(&self, query: &UploadQuery) -> Result<UploadTicket> {
        let (Some(session_id), Some(file_id), Some(token)) = (
            non_empty(query.session_id.as_deref()),
            non_empty(query.file_id.as_deref()),
            non_empty(query.token.as_deref()),
        ) else {
            return Err(Error::MalformedRequest("missing parameters".to_string()));
        };

        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(session_id).ok_or(Error::Unauthorized)?;

        match session.tokens.get(file_id) {
            Some(expected) if validate_token(token, expected) => {}
            _ => return Err(Error::Unauthorized),
        }

        let descriptor = session
            .files
            .get(file_id)
            .cloned()
            .ok_or_else(|| Error::UnknownFile(file_id.to_string()))?;

        let state = session
            .states
            .entry(file_id.to_string())
            .or_insert(FileState::Pending);
        match *state {
            FileState::Uploading => return Err(Error::UploadInProgress(file_id.to_string())),
            FileState::Consumed => {
                tracing::warn!(
                    session = %session_id,
                    file = %file_id,
                    "File already received, accepting upload again"
                );
            }
            FileState::Pending => {}
        }
        *state = FileState::Uploading;

        Ok(UploadTicket {
            session_id: session_id.to_string(),
            file_id: file_id.to_string(),
            descriptor,
            cancel: session.cancel.clone(),
        })
    }

    /// Record the end of an upload started with [`begin_upload`](Self::begin_upload).
    ///
    /// A successful upload marks the file consumed; a failed one returns it
    /// to pending so the sender may retry. Does nothing if the session has
    /// been cancelled meanwhile.
    pub async fn finish_upload(&self, ticket: &UploadTicket, success: bool) {
        let mut sessions = self.sessions.lock().await;
        if let Some(state) = sessions
            .get_mut(&ticket.session_id)
            .and_then(|s| s.states.get_mut(&ticket.file_id))
        {
            *state = if success {
                FileState::Consumed
            } else {
                FileState::Pending
            };
        }
    }

    /// Cancel a session. Unknown ids are ignored.
    ///
    /// Returns whether a session was removed. Any upload still streaming for
    /// the session is signalled through its cancellation token.
    pub async fn cancel(&self, session_id: &str) -> bool {
        let removed = self.sessions.lock().await.remove(session_id);
        match removed {
            Some(session) => {
                session.cancel.cancel();
                tracing::info!(session = %session_id, peer = %session.sender.alias, "Session cancelled");
                true
            }
            None => {
                tracing::debug!(session = %session_id, "Cancel for unknown session");
                false
            }
        }
    }

    /// Remove sessions older than the TTL that have no upload in flight.
    ///
    /// Returns the number of sessions removed. Without a TTL this is a no-op.
    pub async fn sweep_expired(&self) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };

        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|id, session| {
            let keep = session.created_at.elapsed() < ttl || session.is_uploading();
            if !keep {
                session.cancel.cancel();
                tracing::info!(session = %id, "Session expired");
            }
            keep
        });
        before - sessions.len()
    }

    /// Spawn a background task that periodically calls
    /// [`sweep_expired`](Self::sweep_expired).
    ///
    /// Returns `None` when no TTL is configured.
    pub fn spawn_sweeper(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let ttl = self.ttl?;
        let period = (ttl / 2).max(Duration::from_secs(1));
        let manager = Arc::clone(self);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let removed = manager.sweep_expired().await;
                if removed > 0 {
                    tracing::debug!("Swept {} idle sessions", removed);
                }
            }
        }))
    }

    /// State of one file, if the session and file exist.
    pub async fn file_state(&self, session_id: &str, file_id: &str) -> Option<FileState> {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .and_then(|s| s.states.get(file_id).copied())
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Whether there are no live sessions.
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
