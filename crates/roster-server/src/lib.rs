pub mod client;
pub mod error;
pub mod event_bridge;
pub mod extract;
pub mod handlers;
pub mod presence;
pub mod server;

pub use error::ApiError;
pub use presence::{ConnectionRegistry, PresenceBroadcaster, SessionLifecycle, SessionState};
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
