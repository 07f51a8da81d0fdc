//! Shared types for the roster server: branded ids, presence records and
//! the wire events exchanged with WebSocket clients.

pub mod events;
pub mod ids;
pub mod presence;
pub mod text;

pub use events::{DirectoryEvent, InboundEvent, OutboundEvent, UserSummary, WireError};
pub use ids::{ConnectionId, UserId};
pub use presence::{JoinPayload, JoinRejected, PresenceRecord};
