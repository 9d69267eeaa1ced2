mod call;
mod registry;
mod sms;

use crate::admission::AdmissionConfig;
use crate::protocol::ServerMessage;
use crate::provider::TelephonyApi;
use crate::token::TokenIssuer;
use crate::types::*;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// How many relay messages may queue per subscriber before the slowest
/// subscriber starts losing them. Delivery is best-effort, so losing is fine.
const RELAY_CHANNEL_CAPACITY: usize = 100;

/// Fan-out half of the realtime relay.
///
/// One total order for everything sent through here: every subscriber sees
/// every message exactly once in send order, unless it lags or disconnects.
/// No acknowledgment, no retry — a future at-least-once scheme would live
/// behind these same methods.
#[derive(Clone)]
pub struct RelayBroadcaster {
    tx: broadcast::Sender<ServerMessage>,
}

impl RelayBroadcaster {
    fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.tx.subscribe()
    }

    /// Deliver a text message to every subscriber, the sender included.
    pub fn send_chat(&self, message: ChatMessage) {
        // No receivers connected is fine.
        let _ = self.tx.send(ServerMessage::Chat { message });
    }

    /// Deliver a file-attachment message to every subscriber.
    pub fn send_file(&self, message: ChatMessage) {
        let _ = self.tx.send(ServerMessage::File { message });
    }

    /// Notification bridge: announce an inbound call to every participant.
    /// Unfiltered — chat users get it too. Role-based filtering would slot in
    /// here if it is ever wanted.
    pub fn announce_incoming_call(&self, call_sid: &str) {
        let _ = self.tx.send(ServerMessage::IncomingCall {
            call_sid: call_sid.to_string(),
            message: "Incoming call! Please pick up.".to_string(),
        });
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Admission store: inbound calls keyed by provider SID.
    pub calls: Arc<RwLock<HashMap<CallSid, CallSession>>>,
    /// Session registry: connected relay participants by connection id.
    pub participants: Arc<RwLock<HashMap<ConnectionId, Participant>>>,
    /// Bounded log of SMS sends, newest last.
    pub sent_sms: Arc<RwLock<VecDeque<SentSms>>>,
    pub relay: RelayBroadcaster,
    pub admission: AdmissionConfig,
    /// None until provider credentials are configured; SMS and outbound call
    /// endpoints answer 503 in that case.
    pub provider: Option<Arc<dyn TelephonyApi>>,
    pub token_issuer: Option<TokenIssuer>,
    /// Where the provider can reach us, used to build the outbound TwiML URL.
    pub public_base_url: String,
    pub upload_dir: PathBuf,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(HashMap::new())),
            participants: Arc::new(RwLock::new(HashMap::new())),
            sent_sms: Arc::new(RwLock::new(VecDeque::new())),
            relay: RelayBroadcaster::new(RELAY_CHANNEL_CAPACITY),
            admission: AdmissionConfig::default(),
            provider: None,
            token_issuer: None,
            public_base_url: "http://localhost:5000".to_string(),
            upload_dir: PathBuf::from("uploads"),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
