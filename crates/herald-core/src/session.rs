use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use herald_types::models::{ContentRef, Draft, UserId};

use crate::error::ComposeError;

/// Where an operator is in the compose/confirm workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeState {
    Idle,
    AwaitingContent,
    /// Content received, its preview not yet shown.
    Previewing,
    AwaitingConfirmation,
}

#[derive(Debug)]
struct ComposeSession {
    state: ComposeState,
    draft: Option<Draft>,
}

/// Per-operator compose sessions, held in memory only.
///
/// An operator with no entry is `Idle`. Entries are created by `begin` and
/// removed on cancel or confirm. Callers are responsible for authorization.
#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<UserId, ComposeSession>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn state(&self, operator: UserId) -> ComposeState {
        self.sessions
            .read()
            .await
            .get(&operator)
            .map_or(ComposeState::Idle, |s| s.state)
    }

    /// `* -> AwaitingContent`. Any pending draft is discarded (last write wins).
    /// Returns `true` if a draft was discarded.
    pub async fn begin(&self, operator: UserId) -> bool {
        let previous = self.sessions.write().await.insert(
            operator,
            ComposeSession {
                state: ComposeState::AwaitingContent,
                draft: None,
            },
        );
        previous.is_some_and(|s| s.draft.is_some())
    }

    /// `AwaitingContent -> Previewing`. The session is held for `content`
    /// while its preview is shown, so any other content is ignored until
    /// the preview resolves.
    pub async fn claim(&self, operator: UserId, content: ContentRef) -> Result<(), ComposeError> {
        let mut sessions = self.sessions.write().await;
        let actual = sessions.get(&operator).map(|s| s.state);
        let Some(session) = sessions
            .get_mut(&operator)
            .filter(|s| s.state == ComposeState::AwaitingContent)
        else {
            return Err(invalid_from(operator, ComposeState::AwaitingContent, actual));
        };

        session.state = ComposeState::Previewing;
        session.draft = Some(Draft {
            owner: operator,
            content,
            created_at: Utc::now(),
        });
        Ok(())
    }

    /// `Previewing -> AwaitingConfirmation` once the preview of `content`
    /// was shown. Fails if the session was restarted in the meantime.
    pub async fn capture(
        &self,
        operator: UserId,
        content: ContentRef,
    ) -> Result<Draft, ComposeError> {
        let mut sessions = self.sessions.write().await;
        let actual = sessions.get(&operator).map(|s| s.state);
        let Some(session) = sessions
            .get_mut(&operator)
            .filter(|s| previewing(s, content))
        else {
            return Err(invalid_from(operator, ComposeState::Previewing, actual));
        };

        session.state = ComposeState::AwaitingConfirmation;
        session
            .draft
            .clone()
            .ok_or_else(|| invalid_from(operator, ComposeState::Previewing, actual))
    }

    /// `Previewing -> AwaitingContent` after the preview of `content` failed.
    /// Returns `false` if the session had already moved on.
    pub async fn release(&self, operator: UserId, content: ContentRef) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&operator).filter(|s| previewing(s, content)) {
            Some(session) => {
                session.state = ComposeState::AwaitingContent;
                session.draft = None;
                true
            }
            None => false,
        }
    }

    /// The draft awaiting confirmation, left in place.
    pub async fn pending_draft(&self, operator: UserId) -> Option<Draft> {
        self.sessions
            .read()
            .await
            .get(&operator)
            .filter(|s| s.state == ComposeState::AwaitingConfirmation)
            .and_then(|s| s.draft.clone())
    }

    /// `AwaitingConfirmation -> Idle`, handing the draft to the caller.
    pub async fn take_draft(&self, operator: UserId) -> Result<Draft, ComposeError> {
        let mut sessions = self.sessions.write().await;
        let actual = sessions.get(&operator).map(|s| s.state);
        if actual != Some(ComposeState::AwaitingConfirmation) {
            return Err(invalid_from(operator, ComposeState::AwaitingConfirmation, actual));
        }
        sessions
            .remove(&operator)
            .and_then(|s| s.draft)
            .ok_or_else(|| invalid_from(operator, ComposeState::AwaitingConfirmation, actual))
    }

    /// `AwaitingConfirmation -> Idle`, discarding the draft.
    pub async fn cancel(&self, operator: UserId) -> Result<(), ComposeError> {
        self.take_draft(operator).await.map(|_| ())
    }
}

fn previewing(session: &ComposeSession, content: ContentRef) -> bool {
    session.state == ComposeState::Previewing
        && session.draft.as_ref().is_some_and(|d| d.content == content)
}

fn invalid_from(
    operator: UserId,
    expected: ComposeState,
    actual: Option<ComposeState>,
) -> ComposeError {
    ComposeError::InvalidState {
        operator,
        expected,
        actual: actual.unwrap_or(ComposeState::Idle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OP: UserId = 123456789;

    fn content(message_id: i64) -> ContentRef {
        ContentRef {
            chat_id: OP,
            message_id,
        }
    }

    async fn previewed(sessions: &SessionManager, message_id: i64) -> Draft {
        sessions.claim(OP, content(message_id)).await.unwrap();
        sessions.capture(OP, content(message_id)).await.unwrap()
    }

    #[tokio::test]
    async fn full_confirm_path() {
        let sessions = SessionManager::new();
        assert_eq!(sessions.state(OP).await, ComposeState::Idle);

        assert!(!sessions.begin(OP).await);
        assert_eq!(sessions.state(OP).await, ComposeState::AwaitingContent);

        sessions.claim(OP, content(7)).await.unwrap();
        assert_eq!(sessions.state(OP).await, ComposeState::Previewing);
        assert!(sessions.pending_draft(OP).await.is_none());

        let draft = sessions.capture(OP, content(7)).await.unwrap();
        assert_eq!(draft.owner, OP);
        assert_eq!(draft.content, content(7));
        assert_eq!(sessions.state(OP).await, ComposeState::AwaitingConfirmation);
        assert_eq!(sessions.pending_draft(OP).await, Some(draft.clone()));

        let taken = sessions.take_draft(OP).await.unwrap();
        assert_eq!(taken, draft);
        assert_eq!(sessions.state(OP).await, ComposeState::Idle);
    }

    #[tokio::test]
    async fn cancel_discards_draft() {
        let sessions = SessionManager::new();
        sessions.begin(OP).await;
        previewed(&sessions, 7).await;

        sessions.cancel(OP).await.unwrap();
        assert_eq!(sessions.state(OP).await, ComposeState::Idle);
        assert!(sessions.pending_draft(OP).await.is_none());
    }

    #[tokio::test]
    async fn restart_overwrites_pending_draft() {
        let sessions = SessionManager::new();
        sessions.begin(OP).await;
        previewed(&sessions, 1).await;

        assert!(sessions.begin(OP).await);
        assert_eq!(sessions.state(OP).await, ComposeState::AwaitingContent);
        previewed(&sessions, 2).await;

        let draft = sessions.take_draft(OP).await.unwrap();
        assert_eq!(draft.content.message_id, 2);
    }

    #[tokio::test]
    async fn only_one_content_is_previewed_at_a_time() {
        let sessions = SessionManager::new();
        sessions.begin(OP).await;

        sessions.claim(OP, content(1)).await.unwrap();
        assert!(sessions.claim(OP, content(2)).await.is_err());
        assert!(sessions.capture(OP, content(2)).await.is_err());
        assert!(!sessions.release(OP, content(2)).await);

        let draft = sessions.capture(OP, content(1)).await.unwrap();
        assert_eq!(draft.content, content(1));
    }

    #[tokio::test]
    async fn failed_preview_returns_to_awaiting_content() {
        let sessions = SessionManager::new();
        sessions.begin(OP).await;
        sessions.claim(OP, content(1)).await.unwrap();

        assert!(sessions.release(OP, content(1)).await);
        assert_eq!(sessions.state(OP).await, ComposeState::AwaitingContent);
        assert!(sessions.capture(OP, content(1)).await.is_err());

        previewed(&sessions, 2).await;
        assert_eq!(sessions.pending_draft(OP).await.unwrap().content, content(2));
    }

    #[tokio::test]
    async fn restart_during_preview_drops_the_stale_content() {
        let sessions = SessionManager::new();
        sessions.begin(OP).await;
        sessions.claim(OP, content(1)).await.unwrap();

        sessions.begin(OP).await;
        assert!(sessions.capture(OP, content(1)).await.is_err());
        assert!(!sessions.release(OP, content(1)).await);
        assert_eq!(sessions.state(OP).await, ComposeState::AwaitingContent);
    }

    #[tokio::test]
    async fn out_of_order_transitions_are_rejected() {
        let sessions = SessionManager::new();

        let err = sessions.claim(OP, content(1)).await.unwrap_err();
        assert_eq!(
            err,
            ComposeError::InvalidState {
                operator: OP,
                expected: ComposeState::AwaitingContent,
                actual: ComposeState::Idle,
            }
        );

        sessions.begin(OP).await;
        assert!(sessions.capture(OP, content(1)).await.is_err());
        assert!(sessions.take_draft(OP).await.is_err());
        assert!(sessions.cancel(OP).await.is_err());
        assert_eq!(sessions.state(OP).await, ComposeState::AwaitingContent);

        previewed(&sessions, 1).await;
        assert!(sessions.claim(OP, content(2)).await.is_err());
        assert_eq!(sessions.pending_draft(OP).await.unwrap().content.message_id, 1);
    }

    #[tokio::test]
    async fn operators_do_not_share_sessions() {
        let sessions = SessionManager::new();
        sessions.begin(1).await;
        assert_eq!(sessions.state(2).await, ComposeState::Idle);
        assert!(sessions.claim(2, content(1)).await.is_err());
        assert_eq!(sessions.state(1).await, ComposeState::AwaitingContent);
    }
}
