//! Session registry: who is currently connected to the relay.

use super::AppState;
use crate::types::Participant;
use chrono::Utc;

impl AppState {
    /// Register a relay participant. Idempotent per connection id: a repeat
    /// registration returns the existing participant untouched.
    pub async fn register_participant(&self, connection_id: &str, identity: &str) -> Participant {
        let mut participants = self.participants.write().await;
        participants
            .entry(connection_id.to_string())
            .or_insert_with(|| Participant {
                connection_id: connection_id.to_string(),
                identity: identity.to_string(),
                joined_at: Utc::now(),
            })
            .clone()
    }

    /// Unknown ids are expected here — disconnect races make them normal.
    pub async fn unregister_participant(&self, connection_id: &str) {
        self.participants.write().await.remove(connection_id);
    }

    /// Snapshot of everyone currently connected. Callers iterate the copy,
    /// never the live map.
    pub async fn active_participants(&self) -> Vec<Participant> {
        self.participants.read().await.values().cloned().collect()
    }
}
