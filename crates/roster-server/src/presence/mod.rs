//! Live presence: who is connected right now, and fan-out of roster changes
//! to everyone watching.

mod broadcaster;
mod lifecycle;
mod registry;

pub use broadcaster::PresenceBroadcaster;
pub use lifecycle::{SessionLifecycle, SessionState};
pub use registry::ConnectionRegistry;
