use std::sync::Arc;

use roster_core::DirectoryEvent;
use tokio::sync::broadcast;

use crate::presence::SessionLifecycle;

/// Subscribes to user-directory notifications and forwards them to the
/// presence channel.
pub struct EventBridge {
    lifecycle: Arc<SessionLifecycle>,
}

impl EventBridge {
    pub fn new(lifecycle: Arc<SessionLifecycle>) -> Self {
        Self { lifecycle }
    }

    /// Start the bridge. Spawns a task that reads from the broadcast channel
    /// until every sender is dropped.
    pub fn start(&self, mut rx: broadcast::Receiver<DirectoryEvent>) -> tokio::task::JoinHandle<()> {
        let lifecycle = Arc::clone(&self.lifecycle);

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(DirectoryEvent::UserCreated(summary)) => {
                        let email = summary.email.clone();
                        let delivered = lifecycle.broadcaster().publish_user_created(summary);
                        tracing::info!(email = %email, delivered, "Announced new user");
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Event bridge lagged, dropped events");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bridge channel closed");
                        break;
                    }
                }
            }
        })
    }
}

/// Create an event bridge wired to a broadcast channel.
pub fn create_bridge(
    lifecycle: Arc<SessionLifecycle>,
    rx: broadcast::Receiver<DirectoryEvent>,
) -> tokio::task::JoinHandle<()> {
    EventBridge::new(lifecycle).start(rx)
}
