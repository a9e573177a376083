use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Platform identity of a user or operator.
pub type UserId = i64;

/// The caller attached to every inbound interaction, as reported by the
/// messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl UserIdentity {
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

/// A registered recipient. Created once on first interaction, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: UserId,
    pub display_name: String,
    pub handle: Option<String>,
    pub joined_at: DateTime<Utc>,
}

impl Recipient {
    pub fn from_identity(user: &UserIdentity, joined_at: DateTime<Utc>) -> Self {
        Self {
            id: user.id,
            display_name: user.full_name(),
            handle: user.username.clone(),
            joined_at,
        }
    }
}

/// Opaque reference to content an operator sent (text, photo, video...).
/// The transport copies the referenced message verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    pub chat_id: i64,
    pub message_id: i64,
}

/// Handle to a message previously sent by Herald, used for in-place edits
/// and deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle {
    pub chat_id: i64,
    pub message_id: i64,
}

/// Content captured from an operator, pending confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub owner: UserId,
    pub content: ContentRef,
    pub created_at: DateTime<Utc>,
}
