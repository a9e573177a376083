use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use herald_types::api::{OperatorAction, Reply};
use herald_types::models::{ContentRef, MessageHandle, Recipient, UserIdentity};

use crate::auth::OperatorAllowList;
use crate::delivery::DeliveryClient;
use crate::directory::{RecipientDirectory, register_in_background};
use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::export;
use crate::session::{ComposeState, SessionManager};

pub const PANEL_ACTIONS: [OperatorAction; 3] = [
    OperatorAction::Broadcast,
    OperatorAction::Export,
    OperatorAction::Refresh,
];

pub const CONFIRM_ACTIONS: [OperatorAction; 2] =
    [OperatorAction::ConfirmSend, OperatorAction::CancelSend];

pub const CONTENT_PROMPT: &str =
    "Please send your broadcast message (text, photo and video are supported):";
pub const PREVIEW_PROMPT: &str = "Above is a preview of your message. Send it to everyone?";
pub const PREVIEW_FAILED: &str = "Could not show a preview of that message. Please send it again.";
pub const BROADCAST_CANCELLED: &str = "Broadcast cancelled.";
pub const BROADCAST_STARTED: &str = "Broadcast started. You will get a report when it finishes.";
pub const BROADCAST_BUSY: &str =
    "Another broadcast is still running. Confirm again once it finishes, or cancel.";
pub const NOTHING_PENDING: &str = "No broadcast pending";
pub const ALREADY_UPDATED: &str = "Already up to date!";
pub const EXPORT_CAPTION: &str = "All User IDs";

/// Operator-facing command surface, independent of how interactions arrive.
///
/// Every method that returns `Option<Reply>` answers `None` when the caller
/// should get no response at all. Privileged methods check the allow-list
/// on each call.
pub struct OperatorGateway {
    operators: OperatorAllowList,
    directory: Arc<dyn RecipientDirectory>,
    delivery: Arc<dyn DeliveryClient>,
    sessions: SessionManager,
    dispatcher: Dispatcher,
    export_dir: PathBuf,
}

impl OperatorGateway {
    pub fn new(
        operators: OperatorAllowList,
        directory: Arc<dyn RecipientDirectory>,
        delivery: Arc<dyn DeliveryClient>,
        dispatcher: Dispatcher,
        export_dir: PathBuf,
    ) -> Self {
        Self {
            operators,
            directory,
            delivery,
            sessions: SessionManager::new(),
            dispatcher,
            export_dir,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Public entry point: registers the caller and greets them.
    pub fn start(&self, user: &UserIdentity) -> Reply {
        register_in_background(
            self.directory.clone(),
            Recipient::from_identity(user, Utc::now()),
        );
        Reply::text(welcome_text(user))
    }

    pub async fn admin(&self, user: &UserIdentity) -> Option<Reply> {
        if !self.authorized(user, "admin") {
            return None;
        }
        Some(Reply::Panel {
            text: self.panel_text(user).await,
            actions: PANEL_ACTIONS.to_vec(),
        })
    }

    pub async fn action(
        &self,
        user: &UserIdentity,
        action: OperatorAction,
        panel: Option<MessageHandle>,
    ) -> Option<Reply> {
        if !self.authorized(user, "action") {
            return None;
        }
        let reply = match action {
            OperatorAction::Refresh => self.refresh(user, panel).await,
            OperatorAction::Export => self.export(user).await,
            OperatorAction::Broadcast => self.begin_broadcast(user).await,
            OperatorAction::ConfirmSend => self.confirm(user).await,
            OperatorAction::CancelSend => self.cancel(user).await,
        };
        Some(reply)
    }

    /// Content sent by an operator. Only consumed while that operator's
    /// session is waiting for it; otherwise ignored.
    pub async fn content(&self, user: &UserIdentity, content: ContentRef) -> Option<Reply> {
        if !self.authorized(user, "content") {
            return None;
        }
        if let Err(e) = self.sessions.claim(user.id, content).await {
            debug!("Content not expected: {}", e);
            return None;
        }

        // The preview is a copy of the exact message that will be broadcast
        if let Err(e) = self.delivery.copy_content(user.id, content).await {
            warn!("Preview for operator {} failed: {}", user.id, e);
            if !self.sessions.release(user.id, content).await {
                return None;
            }
            return Some(Reply::text(PREVIEW_FAILED));
        }

        match self.sessions.capture(user.id, content).await {
            Ok(_) => Some(Reply::Prompt {
                text: PREVIEW_PROMPT.to_string(),
                actions: CONFIRM_ACTIONS.to_vec(),
            }),
            Err(e) => {
                debug!("Draft not captured: {}", e);
                None
            }
        }
    }

    fn authorized(&self, user: &UserIdentity, surface: &str) -> bool {
        let allowed = self.operators.is_operator(user.id);
        if !allowed {
            debug!("Ignoring {} from non-operator {}", surface, user.id);
        }
        allowed
    }

    async fn panel_text(&self, user: &UserIdentity) -> String {
        let total = match self.directory.count().await {
            Ok(n) => n.to_string(),
            Err(e) => {
                error!("Failed to count recipients: {:#}", e);
                "unavailable".to_string()
            }
        };
        format!(
            "Admin Control Panel\n\nTotal Users: {}\nCurrent Admin: {}\nBot Status: Active",
            total, user.first_name
        )
    }

    async fn refresh(&self, user: &UserIdentity, panel: Option<MessageHandle>) -> Reply {
        let text = self.panel_text(user).await;
        let Some(handle) = panel else {
            return Reply::Panel {
                text,
                actions: PANEL_ACTIONS.to_vec(),
            };
        };
        match self.delivery.edit_text(handle, &text, &PANEL_ACTIONS).await {
            Ok(()) => Reply::ack("Stats refreshed"),
            Err(e) => {
                // Editing to identical text is rejected by the platform
                debug!("Panel refresh not rendered: {}", e);
                Reply::ack(ALREADY_UPDATED)
            }
        }
    }

    async fn export(&self, user: &UserIdentity) -> Reply {
        let ids = match self.directory.list().await {
            Ok(ids) => ids,
            Err(e) => {
                error!("Export failed, directory unavailable: {:#}", e);
                return Reply::text("Export failed: the recipient list could not be read.");
            }
        };

        let path = match export::write_listing(&self.export_dir, &ids).await {
            Ok(path) => path,
            Err(e) => {
                error!("Export failed, could not write listing: {:#}", e);
                return Reply::text("Export failed: could not write the file.");
            }
        };

        let delivered = self
            .delivery
            .send_document(user.id, &path, EXPORT_CAPTION)
            .await;

        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Could not remove export {}: {}", path.display(), e);
        }

        match delivered {
            Ok(()) => {
                info!("Exported {} recipient ids to operator {}", ids.len(), user.id);
                Reply::ack("Generating file...")
            }
            Err(e) => {
                warn!("Export delivery to operator {} failed: {}", user.id, e);
                Reply::text("Export failed: the file could not be delivered.")
            }
        }
    }

    async fn begin_broadcast(&self, user: &UserIdentity) -> Reply {
        if self.sessions.begin(user.id).await {
            info!("Operator {} restarted compose, pending draft discarded", user.id);
        }
        Reply::text(CONTENT_PROMPT)
    }

    async fn confirm(&self, user: &UserIdentity) -> Reply {
        if self.sessions.state(user.id).await != ComposeState::AwaitingConfirmation {
            return Reply::ack(NOTHING_PENDING);
        }

        let permit = match self.dispatcher.try_reserve() {
            Ok(permit) => permit,
            Err(DispatchError::Busy) => {
                info!("Operator {} confirmed while a broadcast is running", user.id);
                return Reply::text(BROADCAST_BUSY);
            }
        };

        match self.sessions.take_draft(user.id).await {
            Ok(draft) => {
                self.dispatcher.spawn(permit, draft);
                Reply::text(BROADCAST_STARTED)
            }
            Err(e) => {
                debug!("Confirm raced with cancel: {}", e);
                Reply::ack(NOTHING_PENDING)
            }
        }
    }

    async fn cancel(&self, user: &UserIdentity) -> Reply {
        match self.sessions.cancel(user.id).await {
            Ok(()) => {
                info!("Operator {} cancelled a broadcast", user.id);
                Reply::text(BROADCAST_CANCELLED)
            }
            Err(_) => Reply::ack(NOTHING_PENDING),
        }
    }
}

fn welcome_text(user: &UserIdentity) -> String {
    format!(
        "Assalamu alaikum, {}!\n\nWelcome to our official bot.\nStay with us for every update.",
        user.first_name
    )
}
