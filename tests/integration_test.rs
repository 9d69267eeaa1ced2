use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceExt;

use holdline::admission::ACCEPTED_STATUS;
use holdline::api;
use holdline::error::ApiError;
use holdline::protocol::ServerMessage;
use holdline::provider::{InboundMessage, TelephonyApi};
use holdline::state::AppState;
use holdline::types::ChatMessage;
use holdline::voice::{self, AcceptRequest, VoiceWebhook};

/// End-to-end admission flow: call arrives, holds three times, operator
/// accepts, next poll is terminal.
#[tokio::test]
async fn test_full_admission_flow() {
    let state = Arc::new(AppState::new());
    let mut relay_rx = state.relay.subscribe();

    // 1. Call arrives: caller is told to wait and redirected to the poll loop.
    let arrival = voice::incoming_call(
        State(state.clone()),
        axum::Form(VoiceWebhook {
            call_sid: Some("CA100".to_string()),
        }),
    )
    .await;
    assert!(arrival.has_redirect());
    assert!(arrival.to_xml().contains("Please wait"));

    // 2. Every relay participant is notified about the call.
    match relay_rx.recv().await.unwrap() {
        ServerMessage::IncomingCall { call_sid, .. } => assert_eq!(call_sid, "CA100"),
        other => panic!("expected IncomingCall, got {:?}", other),
    }

    // 3. Three polls before any decision: always the hold variant.
    for _ in 0..3 {
        let poll = voice::wait_for_acceptance(
            State(state.clone()),
            axum::Form(VoiceWebhook {
                call_sid: Some("CA100".to_string()),
            }),
        )
        .await;
        assert!(poll.has_redirect());
        assert!(poll.to_xml().contains("Please hold"));
    }

    // 4. Operator accepts.
    let accepted = voice::accept_call(
        State(state.clone()),
        Json(AcceptRequest {
            status: ACCEPTED_STATUS.to_string(),
            call_sid: Some("CA100".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(accepted.0["success"], true);

    // 5. The very next poll observes the acceptance and terminates the loop.
    let terminal = voice::wait_for_acceptance(
        State(state.clone()),
        axum::Form(VoiceWebhook {
            call_sid: Some("CA100".to_string()),
        }),
    )
    .await;
    assert!(!terminal.has_redirect());
    assert!(terminal.to_xml().contains("accepted"));

    // 6. Re-accepting is a visible no-op.
    let again = voice::accept_call(
        State(state),
        Json(AcceptRequest {
            status: ACCEPTED_STATUS.to_string(),
            call_sid: Some("CA100".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(again.0["success"], true);
}

fn chat(sender: &str, n: usize) -> ChatMessage {
    ChatMessage {
        sender: sender.to_string(),
        text: Some(format!("message {}", n)),
        attachment: None,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}

/// N messages to M subscribers: everyone sees all N in send order; a
/// subscriber that drops out mid-sequence has seen a strict prefix.
#[tokio::test]
async fn test_relay_ordering_and_prefix_on_disconnect() {
    let state = AppState::new();

    let mut rx_a = state.relay.subscribe();
    let mut rx_b = state.relay.subscribe();
    let mut rx_c = state.relay.subscribe();

    for n in 0..4 {
        state.relay.send_chat(chat("a@x.com", n));
    }

    // C disconnects after reading two messages: strict prefix, in order.
    for expected in 0..2 {
        match rx_c.recv().await.unwrap() {
            ServerMessage::Chat { message } => {
                assert_eq!(message.text.unwrap(), format!("message {}", expected));
            }
            other => panic!("expected Chat, got {:?}", other),
        }
    }
    drop(rx_c);

    for n in 4..6 {
        state.relay.send_chat(chat("a@x.com", n));
    }

    // A and B observe all six messages in the same total order.
    for rx in [&mut rx_a, &mut rx_b] {
        for expected in 0..6 {
            match rx.recv().await.unwrap() {
                ServerMessage::Chat { message } => {
                    assert_eq!(message.sender, "a@x.com");
                    assert_eq!(message.text.unwrap(), format!("message {}", expected));
                }
                other => panic!("expected Chat, got {:?}", other),
            }
        }
    }
}

/// Records outbound provider requests instead of talking to anyone.
#[derive(Default)]
struct FakeTelephony {
    sent: Mutex<Vec<(String, String, String)>>,
    calls: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl TelephonyApi for FakeTelephony {
    async fn send_message(&self, from: &str, to: &str, body: &str) -> Result<String, ApiError> {
        self.sent
            .lock()
            .await
            .push((from.to_string(), to.to_string(), body.to_string()));
        Ok("SM_FAKE_1".to_string())
    }

    async fn list_inbound(&self, _to: &str) -> Result<Vec<InboundMessage>, ApiError> {
        Ok(vec![InboundMessage {
            sid: "SM_IN_1".to_string(),
            from: "+15550001".to_string(),
            body: "hello".to_string(),
            date_sent: None,
            status: "received".to_string(),
        }])
    }

    async fn create_call(&self, to: &str, from: &str, twiml_url: &str) -> Result<String, ApiError> {
        self.calls
            .lock()
            .await
            .push((to.to_string(), from.to_string(), twiml_url.to_string()));
        Ok("CA_FAKE_1".to_string())
    }
}

#[tokio::test]
async fn test_send_sms_records_in_bounded_log() {
    let fake = Arc::new(FakeTelephony::default());
    let mut state = AppState::new();
    state.provider = Some(fake.clone());
    let state = Arc::new(state);

    let response = api::send_sms(
        State(state.clone()),
        Json(api::SendSmsRequest {
            from: "+15550001".to_string(),
            to: "+15550002".to_string(),
            message: "hi there".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(response.0["success"], true);
    assert_eq!(response.0["sid"], "SM_FAKE_1");

    assert_eq!(fake.sent.lock().await.len(), 1);

    let log = state.sent_sms_log().await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].body, "hi there");
}

#[tokio::test]
async fn test_fetch_received_messages_requires_phone_number() {
    let mut state = AppState::new();
    state.provider = Some(Arc::new(FakeTelephony::default()));
    let state = Arc::new(state);

    let err = api::fetch_received_messages(
        State(state.clone()),
        Query(api::FetchMessagesQuery { phone_number: None }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::MissingParameter("phone_number")));

    let messages = api::fetch_received_messages(
        State(state),
        Query(api::FetchMessagesQuery {
            phone_number: Some("+15550002".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(messages.0.len(), 1);
    assert_eq!(messages.0[0].sid, "SM_IN_1");
}

#[tokio::test]
async fn test_make_call_points_provider_at_our_twiml_endpoint() {
    let fake = Arc::new(FakeTelephony::default());
    let mut state = AppState::new();
    state.provider = Some(fake.clone());
    state.public_base_url = "https://example.test".to_string();
    let state = Arc::new(state);

    let response = api::make_call(
        State(state),
        Json(api::MakeCallRequest {
            to: "+15550003".to_string(),
            from: "+15550001".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(response.0["call_sid"], "CA_FAKE_1");

    let calls = fake.calls.lock().await;
    assert_eq!(calls[0].2, "https://example.test/twiml");
}

#[tokio::test]
async fn test_sms_endpoints_answer_unavailable_without_provider() {
    let state = Arc::new(AppState::new());

    let err = api::send_sms(
        State(state),
        Json(api::SendSmsRequest {
            from: "+1".to_string(),
            to: "+2".to_string(),
            message: "x".to_string(),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::NotConfigured));
}

/// Multipart POST to /upload with a small PDF, sender, identity and text.
fn upload_request() -> Request<Body> {
    let boundary = "X-HOLDLINE-TEST-BOUNDARY";
    let body = format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"doc.pdf\"\r\n\
         Content-Type: application/pdf\r\n\r\n\
         %PDF-1.4 fake content\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"sender\"\r\n\r\n\
         a@x.com\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"identity\"\r\n\r\n\
         user123\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"message\"\r\n\r\n\
         here is the doc\r\n\
         --{b}--\r\n",
        b = boundary
    );

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Upload flow through the real extractor: the stored reference comes back in
/// the response and the broadcast carries a file event with the original name.
#[tokio::test]
async fn test_upload_broadcasts_file_event() {
    let upload_dir = tempfile::tempdir().unwrap();
    let mut state = AppState::new();
    state.upload_dir = upload_dir.path().to_path_buf();
    let state = Arc::new(state);

    let mut relay_rx = state.relay.subscribe();

    let app = Router::new()
        .route("/upload", post(api::upload))
        .with_state(state);

    let response = app.oneshot(upload_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["message"], "Upload successful");
    assert_eq!(json["filename"], "doc.pdf");
    let file_path = json["file_path"].as_str().unwrap();
    assert!(file_path.starts_with("/uploads/"));
    assert!(file_path.ends_with("doc.pdf"));

    // The bytes landed under the upload dir with the unique stored name.
    let stored_name = file_path.strip_prefix("/uploads/").unwrap();
    let on_disk = tokio::fs::read(upload_dir.path().join(stored_name))
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&on_disk).contains("fake content"));

    match relay_rx.recv().await.unwrap() {
        ServerMessage::File { message } => {
            assert_eq!(message.sender, "a@x.com");
            assert_eq!(message.text.as_deref(), Some("here is the doc"));
            let attachment = message.attachment.unwrap();
            assert_eq!(attachment.filename, "doc.pdf");
            assert_eq!(attachment.url, file_path);
        }
        other => panic!("expected File event, got {:?}", other),
    }
}

/// A disk-write failure during upload is the server's fault, not the
/// uploader's: 500-range with the storage error code, and nothing broadcast.
#[tokio::test]
async fn test_upload_storage_failure_is_a_server_error() {
    let mut state = AppState::new();
    // Point at a directory that does not exist so the write fails.
    state.upload_dir = std::path::PathBuf::from("/nonexistent/holdline-upload-test");
    let state = Arc::new(state);

    let mut relay_rx = state.relay.subscribe();

    let app = Router::new()
        .route("/upload", post(api::upload))
        .with_state(state);

    let response = app.oneshot(upload_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "STORAGE_ERROR");

    assert!(relay_rx.try_recv().is_err());
}

/// Registry bookkeeping survives a chat session: register, list, unregister.
#[tokio::test]
async fn test_registry_snapshot_during_broadcast() {
    let state = AppState::new();

    state.register_participant("conn-1", "a@x.com").await;
    state.register_participant("conn-2", "b@x.com").await;

    let snapshot = state.active_participants().await;
    assert_eq!(snapshot.len(), 2);

    // Mutating the registry does not disturb the snapshot already taken.
    state.unregister_participant("conn-1").await;
    assert_eq!(snapshot.len(), 2);
    assert_eq!(state.active_participants().await.len(), 1);
}
