//! HTTP endpoints around the provider: SMS, tokens, outbound calls, uploads.
//!
//! All of this is request/response plumbing — the provider does the heavy
//! lifting. Failures are converted to the structured error responses in
//! `error`, never retried here.

use axum::extract::{Multipart, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::ApiError;
use crate::provider::InboundMessage;
use crate::state::AppState;
use crate::types::{Attachment, ChatMessage, SentSms};

#[derive(Debug, Deserialize)]
pub struct SendSmsRequest {
    pub from: String,
    pub to: String,
    pub message: String,
}

/// POST /send-sms
pub async fn send_sms(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendSmsRequest>,
) -> Result<Json<Value>, ApiError> {
    let provider = state.provider.as_ref().ok_or(ApiError::NotConfigured)?;

    tracing::info!(from = %req.from, to = %req.to, "sending SMS");
    let sid = provider.send_message(&req.from, &req.to, &req.message).await?;

    state
        .record_sent_sms(SentSms {
            sid: sid.clone(),
            from: req.from,
            to: req.to,
            body: req.message,
            sent_at: chrono::Utc::now().to_rfc3339(),
        })
        .await;

    Ok(Json(json!({ "success": true, "sid": sid })))
}

#[derive(Debug, Deserialize)]
pub struct FetchMessagesQuery {
    pub phone_number: Option<String>,
}

/// GET /fetch-received-messages?phone_number=…
///
/// Rejected before any provider call when the number is missing.
pub async fn fetch_received_messages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FetchMessagesQuery>,
) -> Result<Json<Vec<InboundMessage>>, ApiError> {
    let phone_number = query
        .phone_number
        .filter(|p| !p.is_empty())
        .ok_or(ApiError::MissingParameter("phone_number"))?;
    let provider = state.provider.as_ref().ok_or(ApiError::NotConfigured)?;

    Ok(Json(provider.list_inbound(&phone_number).await?))
}

/// GET /get-messages — the bounded in-memory log of SMS sends.
pub async fn get_messages(State(state): State<Arc<AppState>>) -> Json<Vec<SentSms>> {
    Json(state.sent_sms_log().await)
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub identity: Option<String>,
}

/// GET /token?identity=…
pub async fn token(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Value>, ApiError> {
    let issuer = state.token_issuer.as_ref().ok_or(ApiError::NotConfigured)?;
    let identity = query.identity.unwrap_or_else(|| "user123".to_string());
    let token = issuer.mint(&identity)?;
    Ok(Json(json!({ "token": token, "identity": identity })))
}

#[derive(Debug, Deserialize)]
pub struct MakeCallRequest {
    pub to: String,
    pub from: String,
}

/// POST /make-call — start an outbound call whose instructions come from /twiml.
pub async fn make_call(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MakeCallRequest>,
) -> Result<Json<Value>, ApiError> {
    let provider = state.provider.as_ref().ok_or(ApiError::NotConfigured)?;
    let twiml_url = format!("{}/twiml", state.public_base_url);

    let sid = provider.create_call(&req.to, &req.from, &twiml_url).await?;
    tracing::info!(%sid, to = %req.to, "outbound call initiated");
    Ok(Json(json!({ "message": "Call initiated", "call_sid": sid })))
}

/// POST /upload — multipart with `file`, `sender`, `identity` and an optional
/// `message`. Stores the file under the upload dir with a unique name and
/// broadcasts a file-attachment chat event to every participant.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut stored: Option<Attachment> = None;
    let mut sender: Option<String> = None;
    let mut identity: Option<String> = None;
    let mut text: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Upload(e.to_string()))?
    {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .unwrap_or("upload.bin")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Upload(e.to_string()))?;

                // Ulid prefix keeps stored names unique; the original name
                // survives in the broadcast payload.
                let stored_name = format!("{}-{}", ulid::Ulid::new(), filename);
                let path = state.upload_dir.join(&stored_name);
                tokio::fs::write(&path, &data)
                    .await
                    .map_err(|e| ApiError::Storage(e.to_string()))?;

                stored = Some(Attachment {
                    url: format!("/uploads/{}", stored_name),
                    filename,
                });
            }
            Some("sender") => {
                sender = Some(field.text().await.map_err(|e| ApiError::Upload(e.to_string()))?)
            }
            Some("identity") => {
                identity = Some(field.text().await.map_err(|e| ApiError::Upload(e.to_string()))?)
            }
            Some("message") => {
                text = Some(field.text().await.map_err(|e| ApiError::Upload(e.to_string()))?)
            }
            _ => {}
        }
    }

    let attachment = stored.ok_or(ApiError::MissingParameter("file"))?;
    let sender = sender.ok_or(ApiError::MissingParameter("sender"))?;
    tracing::info!(%sender, ?identity, filename = %attachment.filename, "file uploaded");

    state.relay.send_file(ChatMessage {
        sender,
        text: text.filter(|t| !t.is_empty()),
        attachment: Some(attachment.clone()),
        timestamp: chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(json!({
        "message": "Upload successful",
        "file_path": attachment.url,
        "filename": attachment.filename,
    })))
}
