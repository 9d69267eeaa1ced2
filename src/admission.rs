//! Call admission: bridges the operator's asynchronous accept decision into
//! the provider's synchronous poll-and-redirect protocol.
//!
//! The provider cannot hold a request open while a human decides, so the
//! caller leg is parked in a loop: say "please hold", pause, redirect back to
//! the wait endpoint. Every poll re-derives its decision from current state
//! (level-triggered), so an accept lands on the very next poll no matter when
//! it happened.

use crate::error::ApiError;
use crate::state::AppState;
use crate::twiml::VoiceResponse;
use crate::types::CallSession;

/// The one status literal that actually accepts a call.
pub const ACCEPTED_STATUS: &str = "accepted";

/// Tunables for the hold loop.
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// Seconds the caller leg pauses between wait polls. Lower is snappier
    /// but multiplies webhook traffic.
    pub hold_pause_secs: u32,
    /// Polls allowed before we give up on the caller. `None` polls forever.
    pub max_polls: Option<u32>,
    /// Endpoint the provider is redirected back to between polls.
    pub wait_url: String,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            hold_pause_secs: 10,
            // ~15 minutes of holding at the default pause.
            max_polls: Some(90),
            wait_url: "/wait-for-acceptance".to_string(),
        }
    }
}

impl AdmissionConfig {
    /// Load from HOLD_PAUSE_SECS and MAX_WAIT_POLLS (0 disables the cap).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("HOLD_PAUSE_SECS") {
            match v.parse::<u32>() {
                Ok(secs) => config.hold_pause_secs = secs,
                Err(_) => tracing::warn!("ignoring unparsable HOLD_PAUSE_SECS: {:?}", v),
            }
        }
        if let Ok(v) = std::env::var("MAX_WAIT_POLLS") {
            match v.parse::<u32>() {
                Ok(0) => config.max_polls = None,
                Ok(n) => config.max_polls = Some(n),
                Err(_) => tracing::warn!("ignoring unparsable MAX_WAIT_POLLS: {:?}", v),
            }
        }
        config
    }
}

/// What one wait poll decided for the caller leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDecision {
    /// Operator accepted; terminal instruction set, no further redirect.
    Connected,
    /// Still undecided; hold announcement, pause, redirect back here.
    Hold,
    /// Unknown call or exhausted poll budget; apologize and hang up.
    Abandon,
}

impl AppState {
    /// Entry transition: a new inbound call arrived. Resets any stale state
    /// for the SID and notifies every relay participant.
    pub async fn on_incoming_call(&self, sid: &str) -> VoiceResponse {
        tracing::info!(%sid, "incoming call");
        self.begin_call(sid).await;
        self.relay.announce_incoming_call(sid);

        VoiceResponse::new()
            .say("Please wait while we connect your call.")
            .redirect(&self.admission.wait_url)
    }

    /// One iteration of the hold loop.
    pub async fn on_wait_poll(&self, sid: &str) -> VoiceResponse {
        let decision = self.decide_poll(sid).await;
        tracing::debug!(%sid, ?decision, "wait poll");

        match decision {
            PollDecision::Connected => {
                VoiceResponse::new().say("Hello! Your call has been accepted, connecting you now.")
            }
            PollDecision::Hold => VoiceResponse::new()
                .say("Still waiting for the call to be accepted. Please hold.")
                .pause(self.admission.hold_pause_secs)
                .redirect(&self.admission.wait_url),
            PollDecision::Abandon => {
                tracing::warn!(%sid, "abandoning caller leg");
                apology()
            }
        }
    }

    pub async fn decide_poll(&self, sid: &str) -> PollDecision {
        let Some(session) = self.poll_call(sid).await else {
            return PollDecision::Abandon;
        };
        if session.is_accepted() {
            return PollDecision::Connected;
        }
        if let Some(max) = self.admission.max_polls {
            if session.polls > max {
                return PollDecision::Abandon;
            }
        }
        PollDecision::Hold
    }

    /// Operator decision. Only the literal `"accepted"` mutates anything;
    /// any other status is rejected without touching the store. Without a SID
    /// the single pending call is used, and ambiguity is a loud error.
    pub async fn on_accept(
        &self,
        sid: Option<&str>,
        status: &str,
    ) -> Result<CallSession, ApiError> {
        if status != ACCEPTED_STATUS {
            return Err(ApiError::InvalidStatus);
        }
        let sid = match sid {
            Some(s) => s.to_string(),
            None => self.resolve_pending_call().await?,
        };
        let session = self.set_accepted(&sid).await?;
        tracing::info!(sid = %session.sid, "call accepted");
        Ok(session)
    }
}

/// Fail-safe instruction set: the caller always hears something, even when
/// the server has nothing better to offer.
pub fn apology() -> VoiceResponse {
    VoiceResponse::new()
        .say("We are sorry, we are unable to connect your call right now. Goodbye.")
        .hangup()
}
