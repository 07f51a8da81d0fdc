use std::sync::Arc;

use roster_core::{ConnectionId, OutboundEvent, UserSummary};

use crate::client::ClientRegistry;
use crate::presence::ConnectionRegistry;

/// Fans presence events out to every member of the shared channel.
///
/// Delivery is a non-blocking enqueue per subscriber; a full or closed queue
/// loses that one message and does not affect the others.
pub struct PresenceBroadcaster {
    clients: Arc<ClientRegistry>,
}

impl PresenceBroadcaster {
    pub fn new(clients: Arc<ClientRegistry>) -> Self {
        Self { clients }
    }

    pub fn subscribe(&self, connection_id: &ConnectionId) -> bool {
        self.clients.subscribe(connection_id)
    }

    pub fn unsubscribe(&self, connection_id: &ConnectionId) {
        self.clients.unsubscribe(connection_id);
    }

    /// Send the registry's current roster as `live_users_update` to every
    /// subscriber. Returns how many subscribers accepted it.
    pub fn publish(&self, registry: &ConnectionRegistry) -> usize {
        self.fan_out(&OutboundEvent::LiveUsersUpdate(registry.snapshot()))
    }

    /// Announce a newly persisted user. Not a roster change.
    pub fn publish_user_created(&self, summary: UserSummary) -> usize {
        self.fan_out(&OutboundEvent::UserCreatedDb(summary))
    }

    /// Send the current roster to one connection only.
    pub fn send_private(&self, connection_id: &ConnectionId, registry: &ConnectionRegistry) -> bool {
        match OutboundEvent::LiveUsersUpdate(registry.snapshot()).to_json() {
            Some(json) => self.clients.send_to(connection_id, json),
            None => false,
        }
    }

    fn fan_out(&self, event: &OutboundEvent) -> usize {
        let Some(json) = event.to_json() else {
            tracing::warn!(kind = event.kind(), "Failed to serialize outbound event");
            return 0;
        };

        let subscribers = self.clients.subscribers();
        let delivered = subscribers
            .iter()
            .filter(|client| client.try_send(json.clone()))
            .count();

        tracing::debug!(
            kind = event.kind(),
            subscribers = subscribers.len(),
            delivered,
            "Broadcast"
        );
        delivered
    }
}
