use std::path::Path;

use async_trait::async_trait;

use herald_types::api::OperatorAction;
use herald_types::delivery::DeliveryFailure;
use herald_types::models::{ContentRef, MessageHandle, UserId};

/// Outbound transport to the messaging platform.
///
/// Every call reports its outcome as a value; callers decide whether a
/// failure matters.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Copy the referenced message verbatim into `to`'s chat.
    async fn copy_content(&self, to: UserId, content: ContentRef) -> Result<(), DeliveryFailure>;

    async fn send_text(&self, to: UserId, text: &str) -> Result<MessageHandle, DeliveryFailure>;

    /// Replace the text of a message Herald sent earlier, keeping `actions`
    /// as its buttons.
    async fn edit_text(
        &self,
        handle: MessageHandle,
        text: &str,
        actions: &[OperatorAction],
    ) -> Result<(), DeliveryFailure>;

    async fn delete_message(&self, handle: MessageHandle) -> Result<(), DeliveryFailure>;

    async fn send_document(
        &self,
        to: UserId,
        path: &Path,
        caption: &str,
    ) -> Result<(), DeliveryFailure>;
}
