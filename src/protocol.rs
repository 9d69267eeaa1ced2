//! Wire protocol for the realtime relay.

use crate::types::{CallSid, ChatMessage, ConnectionId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A participant posts a text message for everyone.
    SendMessage { sender: String, text: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First frame after connect, confirming the registered identity.
    Welcome {
        connection_id: ConnectionId,
        identity: String,
        server_now: String,
    },
    /// A text message, echoed to every participant including the sender.
    Chat { message: ChatMessage },
    /// A file-attachment message, same fan-out as `Chat`.
    File { message: ChatMessage },
    /// Notification bridge event: an inbound call is waiting for an operator.
    /// Delivered to every participant, operators and chat users alike.
    IncomingCall { call_sid: CallSid, message: String },
    Error { code: String, msg: String },
}
