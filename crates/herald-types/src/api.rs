use serde::{Deserialize, Serialize};

use crate::models::{ContentRef, MessageHandle, UserIdentity};

// -- Actions --

/// Buttons offered to operators. The serialized names are the action ids
/// the platform relay sends back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorAction {
    Broadcast,
    Export,
    Refresh,
    ConfirmSend,
    CancelSend,
}

impl OperatorAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Broadcast => "Broadcast Message",
            Self::Export => "Export User IDs",
            Self::Refresh => "Refresh Stats",
            Self::ConfirmSend => "Send Broadcast",
            Self::CancelSend => "Cancel",
        }
    }
}

// -- Replies --

/// What Herald answers to an interaction. Silence (unauthorized caller,
/// ignored input) is represented by the absence of a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    /// Plain message.
    Text { text: String },

    /// Admin control panel with its menu.
    Panel {
        text: String,
        actions: Vec<OperatorAction>,
    },

    /// A question with a choice of actions.
    Prompt {
        text: String,
        actions: Vec<OperatorAction>,
    },

    /// Short toast-style acknowledgment of a button press.
    Ack { text: String },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn ack(text: impl Into<String>) -> Self {
        Self::Ack { text: text.into() }
    }
}

// -- Requests --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InteractionRequest {
    pub user: UserIdentity,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionRequest {
    pub user: UserIdentity,
    pub action: OperatorAction,
    /// The panel message the button belongs to, for in-place refresh.
    #[serde(default)]
    pub panel: Option<MessageHandle>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentRequest {
    pub user: UserIdentity,
    pub content: ContentRef,
}
