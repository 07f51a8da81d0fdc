use serde::{Deserialize, Serialize};

use crate::ids::UserId;
use crate::presence::{JoinPayload, PresenceRecord};

/// Events a WebSocket client sends to the server.
///
/// Frames are JSON objects `{"event": <name>, "data": <payload>}`; `data`
/// may be omitted for events without a payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    ViewerJoin,
    JoinLiveUsers(JoinPayload),
    /// Any event name the server does not handle (e.g. `logout`).
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("invalid frame: {0}")]
    Frame(#[source] serde_json::Error),

    #[error("invalid payload for {event}: {source}")]
    Payload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct InboundFrame {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl InboundEvent {
    pub const VIEWER_JOIN: &'static str = "viewer_join";
    pub const JOIN_LIVE_USERS: &'static str = "join_live_users";

    pub fn parse(text: &str) -> Result<Self, WireError> {
        let frame: InboundFrame = serde_json::from_str(text).map_err(WireError::Frame)?;
        match frame.event.as_str() {
            Self::VIEWER_JOIN => Ok(Self::ViewerJoin),
            Self::JOIN_LIVE_USERS => {
                if frame.data.is_null() {
                    return Ok(Self::JoinLiveUsers(JoinPayload::default()));
                }
                serde_json::from_value(frame.data)
                    .map(Self::JoinLiveUsers)
                    .map_err(|source| WireError::Payload {
                        event: Self::JOIN_LIVE_USERS,
                        source,
                    })
            }
            _ => Ok(Self::Other(frame.event)),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::ViewerJoin => Self::VIEWER_JOIN,
            Self::JoinLiveUsers(_) => Self::JOIN_LIVE_USERS,
            Self::Other(name) => name,
        }
    }
}

/// Events the server pushes to subscribed clients.
///
/// `LiveUsersUpdate` replaces the client's roster; `UserCreatedDb` is appended
/// to its user list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundEvent {
    LiveUsersUpdate(Vec<PresenceRecord>),
    UserCreatedDb(UserSummary),
}

impl OutboundEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LiveUsersUpdate(_) => "live_users_update",
            Self::UserCreatedDb(_) => "user_created_db",
        }
    }

    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

/// Public fields of a freshly persisted user, announced to live viewers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: String,
}

/// Notifications raised by the user directory, bridged onto the presence
/// channel.
#[derive(Clone, Debug)]
pub enum DirectoryEvent {
    UserCreated(UserSummary),
}
