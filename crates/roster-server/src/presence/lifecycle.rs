use std::collections::HashMap;

use parking_lot::Mutex;
use roster_core::{ConnectionId, InboundEvent, JoinPayload, JoinRejected, PresenceRecord};

use crate::presence::{ConnectionRegistry, PresenceBroadcaster};

/// Where a connection is in its presence lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Unjoined,
    Viewer,
    Participant,
    Closed,
}

#[derive(Default)]
struct PresenceState {
    registry: ConnectionRegistry,
    sessions: HashMap<ConnectionId, SessionState>,
}

/// Applies connection events to the roster.
///
/// Every mutation, the snapshot taken from it and the resulting publish run
/// under one lock, so subscribers observe roster changes in the order they
/// were applied. Publishing only enqueues, so nothing awaits while the lock
/// is held.
pub struct SessionLifecycle {
    state: Mutex<PresenceState>,
    broadcaster: PresenceBroadcaster,
}

impl SessionLifecycle {
    pub fn new(broadcaster: PresenceBroadcaster) -> Self {
        Self {
            state: Mutex::new(PresenceState::default()),
            broadcaster,
        }
    }

    pub fn broadcaster(&self) -> &PresenceBroadcaster {
        &self.broadcaster
    }

    /// A new transport connection starts unjoined.
    pub fn open(&self, connection_id: &ConnectionId) {
        self.state
            .lock()
            .sessions
            .insert(connection_id.clone(), SessionState::Unjoined);
    }

    /// Unknown connections report `Closed`: ids are never reused.
    pub fn session_state(&self, connection_id: &ConnectionId) -> SessionState {
        self.state
            .lock()
            .sessions
            .get(connection_id)
            .copied()
            .unwrap_or(SessionState::Closed)
    }

    /// Subscribe the connection and reply privately with the current roster.
    pub fn viewer_join(&self, connection_id: &ConnectionId) -> Result<(), JoinRejected> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(session) = state.sessions.get_mut(connection_id) else {
            return Err(JoinRejected::Closed);
        };
        if *session == SessionState::Unjoined {
            *session = SessionState::Viewer;
        }

        self.broadcaster.subscribe(connection_id);
        self.broadcaster.send_private(connection_id, &state.registry);
        tracing::debug!(
            connection_id = %connection_id,
            roster_size = state.registry.len(),
            "Viewer joined"
        );
        Ok(())
    }

    /// Record the connection as a participant and broadcast the new roster.
    pub fn join_live_users(
        &self,
        connection_id: &ConnectionId,
        payload: &JoinPayload,
    ) -> Result<PresenceRecord, JoinRejected> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(session) = state.sessions.get_mut(connection_id) else {
            return Err(JoinRejected::Closed);
        };
        let record = PresenceRecord::from_join(connection_id.clone(), payload)?;

        *session = SessionState::Participant;
        state.registry.upsert(record.clone());
        self.broadcaster.subscribe(connection_id);
        self.broadcaster.publish(&state.registry);

        tracing::info!(
            connection_id = %connection_id,
            email = %record.email,
            roster_size = state.registry.len(),
            "User joined"
        );
        Ok(record)
    }

    /// Tear down a connection. Broadcasts only if it had a presence record.
    pub fn close(&self, connection_id: &ConnectionId) -> Option<PresenceRecord> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.sessions.remove(connection_id)?;

        self.broadcaster.unsubscribe(connection_id);
        let removed = state.registry.remove(connection_id)?;
        self.broadcaster.publish(&state.registry);

        tracing::info!(
            connection_id = %connection_id,
            email = %removed.email,
            roster_size = state.registry.len(),
            "User disconnected"
        );
        Some(removed)
    }

    /// Dispatch a parsed inbound event. Rejections are logged and dropped;
    /// the client is never told.
    pub fn handle(&self, connection_id: &ConnectionId, event: InboundEvent) {
        let result = match &event {
            InboundEvent::ViewerJoin => self.viewer_join(connection_id),
            InboundEvent::JoinLiveUsers(payload) => {
                self.join_live_users(connection_id, payload).map(|_| ())
            }
            InboundEvent::Other(name) => {
                tracing::debug!(connection_id = %connection_id, event = %name, "Unhandled event");
                Ok(())
            }
        };

        if let Err(reason) = result {
            tracing::debug!(
                connection_id = %connection_id,
                event = event.name(),
                reason = %reason,
                "Event rejected"
            );
        }
    }

    pub fn snapshot(&self) -> Vec<PresenceRecord> {
        self.state.lock().registry.snapshot()
    }

    pub fn live_count(&self) -> usize {
        self.state.lock().registry.len()
    }
}
