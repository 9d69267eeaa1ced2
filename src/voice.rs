//! Provider-facing voice webhooks.
//!
//! The provider expects markup on every request; a bare error response would
//! strand the caller. So these handlers fail safe — anything unexpected
//! renders the apology document instead of a 4xx/5xx.

use axum::extract::State;
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::admission::apology;
use crate::error::ApiError;
use crate::state::AppState;
use crate::twiml::VoiceResponse;

/// Fields we read out of the provider's webhook POST.
#[derive(Debug, Deserialize)]
pub struct VoiceWebhook {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
}

/// POST /incoming-call
pub async fn incoming_call(
    State(state): State<Arc<AppState>>,
    Form(webhook): Form<VoiceWebhook>,
) -> VoiceResponse {
    let Some(sid) = webhook.call_sid else {
        tracing::warn!("incoming-call webhook without CallSid");
        return apology();
    };
    state.on_incoming_call(&sid).await
}

/// POST /wait-for-acceptance
pub async fn wait_for_acceptance(
    State(state): State<Arc<AppState>>,
    Form(webhook): Form<VoiceWebhook>,
) -> VoiceResponse {
    let Some(sid) = webhook.call_sid else {
        tracing::warn!("wait poll without CallSid");
        return apology();
    };
    state.on_wait_poll(&sid).await
}

/// Operator decision payload.
#[derive(Debug, Deserialize)]
pub struct AcceptRequest {
    pub status: String,
    pub call_sid: Option<String>,
}

/// POST /accept-call
pub async fn accept_call(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AcceptRequest>,
) -> Result<Json<Value>, ApiError> {
    let session = state.on_accept(req.call_sid.as_deref(), &req.status).await?;
    Ok(Json(json!({ "success": true, "call_sid": session.sid })))
}

#[derive(Debug, Deserialize)]
pub struct OutboundWebhook {
    #[serde(alias = "To")]
    pub to: Option<String>,
}

/// POST /twiml — instructions for the outbound leg started by /make-call:
/// greet, brief pause, then bridge to the requested number.
pub async fn outbound_twiml(Form(webhook): Form<OutboundWebhook>) -> VoiceResponse {
    match webhook.to {
        Some(to) if !to.is_empty() => VoiceResponse::new()
            .say("Hello, you are now connected!")
            .pause(1)
            .dial(&to),
        _ => {
            tracing::warn!("outbound twiml request without a number to dial");
            apology()
        }
    }
}
