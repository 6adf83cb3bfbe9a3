//! Previous message record shown between sessions.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;

/// Durable key of the previous message record.
pub const PREVIOUS_MESSAGE_KEY: &str = "previous-message";

/// Last message left by a team, with the team name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreviousMessage {
    pub message: String,
    pub team_name: String,
    pub updated_at: Option<Timestamp>,
}

impl PreviousMessage {
    pub fn new(message: &str, team_name: Option<&str>, at: Timestamp) -> Self {
        Self {
            message: message.trim().to_string(),
            team_name: team_name.map(str::trim).unwrap_or_default().to_string(),
            updated_at: Some(at),
        }
    }

    /// Empty record stamped with the time it was cleared.
    pub fn cleared(at: Timestamp) -> Self {
        Self {
            updated_at: Some(at),
            ..Self::default()
        }
    }

    /// Re-applies trimming to a record read back from storage.
    pub fn sanitized(self) -> Self {
        Self {
            message: self.message.trim().to_string(),
            team_name: self.team_name.trim().to_string(),
            updated_at: self.updated_at,
        }
    }
}
