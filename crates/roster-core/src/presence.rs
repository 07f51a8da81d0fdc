use serde::{Deserialize, Serialize};

use crate::ids::ConnectionId;
use crate::text::optional_text;

/// One live connection that has joined the roster.
///
/// Several records may share an email when the same user has more than one
/// connection open; `connection_id` is the only unique key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub connection_id: ConnectionId,
    pub email: String,
    pub display_name: String,
}

/// Identity payload carried by a `join_live_users` event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    #[serde(default, deserialize_with = "optional_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub last_name: Option<String>,
}

impl JoinPayload {
    pub fn new(email: impl Into<String>, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            first_name: Some(first_name.into()),
            last_name: Some(last_name.into()),
        }
    }
}

/// Why a join did not change the roster. Never sent to the client.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum JoinRejected {
    #[error("join payload has no email")]
    MissingEmail,
    #[error("connection is already closed")]
    Closed,
}

impl PresenceRecord {
    /// Build a record from a join payload, normalizing the email and deriving
    /// the display name.
    pub fn from_join(connection_id: ConnectionId, payload: &JoinPayload) -> Result<Self, JoinRejected> {
        let email = payload
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|e| !e.is_empty())
            .ok_or(JoinRejected::MissingEmail)?;

        Ok(Self {
            connection_id,
            email,
            display_name: display_name(payload.first_name.as_deref(), payload.last_name.as_deref()),
        })
    }
}

/// Lower-case and trim an email so it can be matched against stored users.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// `"<first> <last>"` with missing parts treated as empty.
pub fn display_name(first: Option<&str>, last: Option<&str>) -> String {
    format!("{} {}", first.unwrap_or(""), last.unwrap_or(""))
        .trim()
        .to_string()
}
