//! End-to-end tests running the sender against a live receiver on loopback.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use axum::{extract::Query, http::StatusCode, routing::post, Router};
use common::{
    create_sender, create_temp_dir, create_test_file, random_bytes, spawn_peer, TestReceiver,
};
use lansend_core::discovery::PeerSource;
use lansend_core::protocol::{CancelQuery, FileDto, CANCEL_PATH, PREPARE_UPLOAD_PATH};
use lansend_core::Error;
use tokio::sync::Mutex;

/// A peer that answers prepare-upload with `prepare` and records every
/// cancelled session id.
fn scripted_peer(prepare: (StatusCode, String), cancelled: Arc<Mutex<Vec<String>>>) -> Router {
    Router::new()
        .route(
            PREPARE_UPLOAD_PATH,
            post(move || {
                let prepare = prepare.clone();
                async move { prepare }
            }),
        )
        .route(
            CANCEL_PATH,
            post(move |Query(query): Query<CancelQuery>| {
                let cancelled = Arc::clone(&cancelled);
                async move {
                    cancelled
                        .lock()
                        .await
                        .push(query.session_id.unwrap_or_default());
                    StatusCode::OK
                }
            }),
        )
}

fn descriptor(id: &str, name: &str, size: u64) -> FileDto {
    FileDto {
        id: id.to_string(),
        file_name: name.to_string(),
        size,
        file_type: "application/octet-stream".to_string(),
        hash: None,
        preview: None,
        metadata: None,
        legacy: false,
    }
}

#[tokio::test]
async fn test_send_file_end_to_end() {
    let source = create_temp_dir();
    let downloads = create_temp_dir();
    let content = random_bytes(1024);
    let path = create_test_file(source.path(), "report.txt", &content);

    let receiver = TestReceiver::start(downloads.path()).await;
    let sender = create_sender();

    let report = sender
        .send_file(&receiver.host(), receiver.port(), &path)
        .await
        .expect("send_file");

    assert_eq!(report.file_name, "report.txt");
    assert_eq!(report.bytes, 1024);
    let received = std::fs::read(downloads.path().join("report.txt")).expect("received file");
    assert_eq!(received, content);

    let err = sender
        .upload(
            &receiver.host(),
            receiver.port(),
            (&report.session_id, &report.file_id, "WRONG"),
            &path,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Rejected { status: 403, .. }));
}

#[tokio::test]
async fn test_each_send_gets_its_own_session() {
    let source = create_temp_dir();
    let downloads = create_temp_dir();
    let path = create_test_file(source.path(), "a.bin", &random_bytes(64));

    let receiver = TestReceiver::start(downloads.path()).await;
    let sender = create_sender();

    let first = sender
        .send_file(&receiver.host(), receiver.port(), &path)
        .await
        .expect("first send");
    let second = sender
        .send_file(&receiver.host(), receiver.port(), &path)
        .await
        .expect("second send");

    assert_ne!(first.session_id, second.session_id);
    assert_ne!(first.file_id, second.file_id);
    assert_eq!(receiver.state.sessions.len().await, 2);
}

#[tokio::test]
async fn test_info_and_register() {
    let downloads = create_temp_dir();
    let receiver = TestReceiver::start(downloads.path()).await;
    let sender = create_sender();

    let info = sender
        .fetch_info(&receiver.host(), receiver.port())
        .await
        .expect("info");
    assert_eq!(info.alias, "Receiver");
    assert_eq!(info.version.as_deref(), Some("2.1"));

    let echoed = sender
        .register(&receiver.host(), receiver.port())
        .await
        .expect("register");
    assert_eq!(echoed.alias, "Receiver");
    assert_eq!(echoed.port, Some(receiver.port()));

    let peers = receiver.state.peers.peers().await;
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0].alias, "Sender");
    assert_eq!(peers[0].source, PeerSource::Register);
    assert!(peers[0].address.is_loopback());
}

#[tokio::test]
async fn test_cancel_revokes_tokens() {
    let source = create_temp_dir();
    let downloads = create_temp_dir();
    let path = create_test_file(source.path(), "late.txt", b"too late");

    let receiver = TestReceiver::start(downloads.path()).await;
    let sender = create_sender();

    let files = HashMap::from([("F1".to_string(), descriptor("F1", "late.txt", 8))]);
    let prepared = sender
        .prepare_upload(&receiver.host(), receiver.port(), files)
        .await
        .expect("prepare");
    let token = prepared.files["F1"].clone();

    for _ in 0..2 {
        sender
            .cancel(&receiver.host(), receiver.port(), &prepared.session_id)
            .await
            .expect("cancel is idempotent");
    }
    sender
        .cancel(&receiver.host(), receiver.port(), "never-existed")
        .await
        .expect("unknown session cancel");

    let err = sender
        .upload(
            &receiver.host(),
            receiver.port(),
            (&prepared.session_id, "F1", &token),
            &path,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Rejected { status: 403, .. }));
    assert!(!downloads.path().join("late.txt").exists());
}

#[tokio::test]
async fn test_traversal_name_stays_in_download_dir() {
    let source = create_temp_dir();
    let outer = create_temp_dir();
    let downloads = outer.path().join("downloads");
    let path = create_test_file(source.path(), "payload", b"data");

    let receiver = TestReceiver::start(&downloads).await;
    let sender = create_sender();

    let files = HashMap::from([("F1".to_string(), descriptor("F1", "../../escape.txt", 4))]);
    let prepared = sender
        .prepare_upload(&receiver.host(), receiver.port(), files)
        .await
        .expect("prepare");

    sender
        .upload(
            &receiver.host(),
            receiver.port(),
            (&prepared.session_id, "F1", &prepared.files["F1"]),
            &path,
        )
        .await
        .expect("upload");

    assert!(downloads.join("escape.txt").exists());
    assert!(!outer.path().join("escape.txt").exists());
}

#[tokio::test]
async fn test_tokens_distinct_across_offer() {
    let downloads = create_temp_dir();
    let receiver = TestReceiver::start(downloads.path()).await;
    let sender = create_sender();

    let files: HashMap<String, FileDto> = (0..8)
        .map(|i| {
            let id = format!("F{i}");
            let file = descriptor(&id, &format!("{id}.bin"), 1);
            (id, file)
        })
        .collect();
    let prepared = sender
        .prepare_upload(&receiver.host(), receiver.port(), files.clone())
        .await
        .expect("prepare");

    assert_eq!(prepared.files.len(), files.len());
    let mut tokens: Vec<_> = prepared.files.values().collect();
    tokens.sort();
    tokens.dedup();
    assert_eq!(tokens.len(), files.len());
}

#[tokio::test]
async fn test_empty_offer_is_rejected() {
    let downloads = create_temp_dir();
    let receiver = TestReceiver::start(downloads.path()).await;
    let sender = create_sender();

    let err = sender
        .prepare_upload(&receiver.host(), receiver.port(), HashMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Rejected { status: 400, .. }));
}

#[tokio::test]
async fn test_missing_local_file() {
    let downloads = create_temp_dir();
    let receiver = TestReceiver::start(downloads.path()).await;
    let sender = create_sender();

    let err = sender
        .send_file(
            &receiver.host(),
            receiver.port(),
            std::path::Path::new("/no/such/file.txt"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::FileNotFound(_)));
    assert!(receiver.state.sessions.is_empty().await);
}

#[tokio::test]
async fn test_unreachable_peer() {
    let source = create_temp_dir();
    let path = create_test_file(source.path(), "a.txt", b"a");

    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let err = create_sender()
        .send_file("127.0.0.1", port, &path)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Http(_)));
}

#[tokio::test]
async fn test_missing_token_cancels_session() {
    let source = create_temp_dir();
    let path = create_test_file(source.path(), "a.txt", b"abc");

    let cancelled = Arc::new(Mutex::new(Vec::new()));
    let prepare = (
        StatusCode::OK,
        r#"{"sessionId":"S","files":{}}"#.to_string(),
    );
    let peer = spawn_peer(scripted_peer(prepare, Arc::clone(&cancelled))).await;

    let err = create_sender()
        .send_file("127.0.0.1", peer.port(), &path)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MissingToken(_)));
    assert_eq!(*cancelled.lock().await, vec!["S".to_string()]);
}

#[tokio::test]
async fn test_rejected_offer_carries_peer_body() {
    let source = create_temp_dir();
    let path = create_test_file(source.path(), "a.txt", b"abc");

    let cancelled = Arc::new(Mutex::new(Vec::new()));
    let prepare = (StatusCode::FORBIDDEN, "transfers disabled".to_string());
    let peer = spawn_peer(scripted_peer(prepare, Arc::clone(&cancelled))).await;

    let err = create_sender()
        .send_file("127.0.0.1", peer.port(), &path)
        .await
        .unwrap_err();

    match err {
        Error::Rejected { status, body } => {
            assert_eq!(status, 403);
            assert_eq!(body, "transfers disabled");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert!(cancelled.lock().await.is_empty());
}

#[tokio::test]
async fn test_unparseable_offer_response() {
    let source = create_temp_dir();
    let path = create_test_file(source.path(), "a.txt", b"abc");

    let cancelled = Arc::new(Mutex::new(Vec::new()));
    let prepare = (StatusCode::OK, "not json".to_string());
    let peer = spawn_peer(scripted_peer(prepare, Arc::clone(&cancelled))).await;

    let err = create_sender()
        .send_file("127.0.0.1", peer.port(), &path)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Http(_)));
}
