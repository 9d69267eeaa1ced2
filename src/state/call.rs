//! Admission store: inbound calls keyed by provider SID.
//!
//! All mutation goes through the single `calls` lock, so a poll racing an
//! accept always observes a consistent phase. The lock is never held across
//! an await on I/O.

use super::AppState;
use crate::error::ApiError;
use crate::types::{CallPhase, CallSession, CallSid};
use chrono::{Duration, Utc};

/// Sessions whose caller leg has not polled for this long are dropped when a
/// new call arrives. Abandoned calls are never explicitly terminated (the
/// provider just stops polling when the caller hangs up), so this sweep is
/// the only cleanup they get. Keyed on last poll, not arrival — a caller who
/// has been holding for hours is still active.
const STALE_CALL_HORIZON_MINS: i64 = 60;

impl AppState {
    /// Track a freshly arrived call. A session with the same SID is replaced
    /// outright, which resets any stale acceptance for that SID.
    pub async fn begin_call(&self, sid: &str) -> CallSession {
        let mut calls = self.calls.write().await;
        let now = Utc::now();
        calls.retain(|_, s| now - s.last_poll_at < Duration::minutes(STALE_CALL_HORIZON_MINS));

        let session = CallSession {
            sid: sid.to_string(),
            phase: CallPhase::Arrived,
            polls: 0,
            arrived_at: now,
            last_poll_at: now,
        };
        calls.insert(sid.to_string(), session.clone());
        session
    }

    /// Record one wait poll and return the session as that poll observed it.
    /// Moves a fresh call into `Waiting`; `None` if the SID is unknown.
    pub async fn poll_call(&self, sid: &str) -> Option<CallSession> {
        let mut calls = self.calls.write().await;
        let session = calls.get_mut(sid)?;
        session.last_poll_at = Utc::now();
        if session.phase == CallPhase::Arrived {
            session.phase = CallPhase::Waiting;
        }
        if session.phase == CallPhase::Waiting {
            session.polls += 1;
        }
        Some(session.clone())
    }

    pub async fn is_accepted(&self, sid: &str) -> bool {
        self.calls
            .read()
            .await
            .get(sid)
            .is_some_and(|s| s.is_accepted())
    }

    /// `Arrived | Waiting -> Connected`. Idempotent: accepting an already
    /// connected call reports success the same way.
    pub async fn set_accepted(&self, sid: &str) -> Result<CallSession, ApiError> {
        let mut calls = self.calls.write().await;
        let session = calls
            .get_mut(sid)
            .ok_or_else(|| ApiError::CallNotFound(sid.to_string()))?;
        session.phase = CallPhase::Connected;
        Ok(session.clone())
    }

    /// Resolve the accept target when the operator client sent no SID.
    /// Exactly one pending call is unambiguous; zero or several fail loudly
    /// rather than guessing.
    pub async fn resolve_pending_call(&self) -> Result<CallSid, ApiError> {
        let calls = self.calls.read().await;
        let mut pending = calls.values().filter(|s| !s.is_accepted());
        match (pending.next(), pending.next()) {
            (Some(session), None) => Ok(session.sid.clone()),
            (None, _) => Err(ApiError::NoPendingCall),
            (Some(_), Some(_)) => Err(ApiError::AmbiguousCall),
        }
    }
}
