use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type CallSid = String;
pub type ConnectionId = String;
pub type MessageSid = String;

/// Lifecycle of one inbound call while an operator decides on it.
///
/// `Connected` is terminal; there is no explicit "hung up" state because the
/// provider simply stops polling when the caller leg ends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallPhase {
    Arrived,
    Waiting,
    Connected,
}

/// One inbound call tracked by the admission store, keyed by provider SID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSession {
    pub sid: CallSid,
    pub phase: CallPhase,
    /// How many wait polls this call has been through.
    pub polls: u32,
    pub arrived_at: DateTime<Utc>,
    /// Last time the caller leg polled; equals `arrived_at` until the first
    /// poll. Staleness is judged on this, not on arrival.
    pub last_poll_at: DateTime<Utc>,
}

impl CallSession {
    pub fn is_accepted(&self) -> bool {
        self.phase == CallPhase::Connected
    }
}

/// A connected relay client. Identity is caller-supplied and unauthenticated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub identity: String,
    pub joined_at: DateTime<Utc>,
}

/// Reference to an uploaded file; the bytes live in the upload directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub filename: String,
}

/// One in-flight relay payload. Never stored durably.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    /// RFC3339 send time, stamped by the server.
    pub timestamp: String,
}

/// One SMS we asked the provider to send, kept in a bounded in-memory log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentSms {
    pub sid: MessageSid,
    pub from: String,
    pub to: String,
    pub body: String,
    pub sent_at: String,
}
