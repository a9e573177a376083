//! In-memory directory and recording delivery client.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;

use herald_types::api::OperatorAction;
use herald_types::delivery::DeliveryFailure;
use herald_types::models::{ContentRef, MessageHandle, Recipient, UserId};

use crate::delivery::DeliveryClient;
use crate::directory::RecipientDirectory;

#[derive(Default)]
pub struct MemoryDirectory {
    recipients: Mutex<BTreeMap<UserId, Recipient>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids(ids: impl IntoIterator<Item = UserId>) -> Self {
        let directory = Self::new();
        {
            let mut recipients = directory.recipients.lock().unwrap();
            for id in ids {
                recipients.insert(
                    id,
                    Recipient {
                        id,
                        display_name: format!("user {}", id),
                        handle: None,
                        joined_at: chrono::Utc::now(),
                    },
                );
            }
        }
        directory
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecipientDirectory for MemoryDirectory {
    async fn upsert(&self, recipient: &Recipient) -> Result<bool> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("disk I/O error");
        }
        let mut recipients = self.recipients.lock().unwrap();
        if recipients.contains_key(&recipient.id) {
            return Ok(false);
        }
        recipients.insert(recipient.id, recipient.clone());
        Ok(true)
    }

    async fn count(&self) -> Result<u64> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("database is locked");
        }
        Ok(self.recipients.lock().unwrap().len() as u64)
    }

    async fn list(&self) -> Result<Vec<UserId>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("database is locked");
        }
        Ok(self.recipients.lock().unwrap().keys().copied().collect())
    }
}

/// Everything the recording client successfully delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivered {
    Copy {
        to: UserId,
        content: ContentRef,
    },
    Text {
        to: UserId,
        text: String,
        handle: MessageHandle,
    },
    Edit {
        handle: MessageHandle,
        text: String,
    },
    Delete {
        handle: MessageHandle,
    },
    Document {
        to: UserId,
        caption: String,
        body: String,
    },
}

#[derive(Default)]
pub struct RecordingDelivery {
    log: Mutex<Vec<Delivered>>,
    copy_attempts: Mutex<Vec<UserId>>,
    copy_failures: Mutex<HashMap<UserId, DeliveryFailure>>,
    copy_delays: Mutex<HashMap<i64, Duration>>,
    fail_edits: AtomicBool,
    fail_documents: AtomicBool,
    next_message_id: AtomicI64,
}

impl RecordingDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every copy to `id` fails with `failure`.
    pub fn fail_for(&self, id: UserId, failure: DeliveryFailure) {
        self.copy_failures.lock().unwrap().insert(id, failure);
    }

    /// Copies of message `message_id` take `delay` to go through.
    pub fn slow_copy(&self, message_id: i64, delay: Duration) {
        self.copy_delays.lock().unwrap().insert(message_id, delay);
    }

    pub fn fail_edits(&self, fail: bool) {
        self.fail_edits.store(fail, Ordering::SeqCst);
    }

    pub fn fail_documents(&self, fail: bool) {
        self.fail_documents.store(fail, Ordering::SeqCst);
    }

    pub fn log(&self) -> Vec<Delivered> {
        self.log.lock().unwrap().clone()
    }

    pub fn copy_attempts(&self) -> Vec<UserId> {
        self.copy_attempts.lock().unwrap().clone()
    }

    /// Content successfully copied into `id`'s chat.
    pub fn copies_to(&self, id: UserId) -> Vec<ContentRef> {
        self.log()
            .into_iter()
            .filter_map(|d| match d {
                Delivered::Copy { to, content } if to == id => Some(content),
                _ => None,
            })
            .collect()
    }

    pub fn texts_to(&self, id: UserId) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|d| match d {
                Delivered::Text { to, text, .. } if to == id => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl DeliveryClient for RecordingDelivery {
    async fn copy_content(&self, to: UserId, content: ContentRef) -> Result<(), DeliveryFailure> {
        self.copy_attempts.lock().unwrap().push(to);
        let delay = self.copy_delays.lock().unwrap().get(&content.message_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = self.copy_failures.lock().unwrap().get(&to) {
            return Err(failure.clone());
        }
        self.log.lock().unwrap().push(Delivered::Copy { to, content });
        Ok(())
    }

    async fn send_text(&self, to: UserId, text: &str) -> Result<MessageHandle, DeliveryFailure> {
        let handle = MessageHandle {
            chat_id: to,
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1,
        };
        self.log.lock().unwrap().push(Delivered::Text {
            to,
            text: text.to_string(),
            handle,
        });
        Ok(handle)
    }

    async fn edit_text(
        &self,
        handle: MessageHandle,
        text: &str,
        _actions: &[OperatorAction],
    ) -> Result<(), DeliveryFailure> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(DeliveryFailure::transport("message is not modified"));
        }
        self.log.lock().unwrap().push(Delivered::Edit {
            handle,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, handle: MessageHandle) -> Result<(), DeliveryFailure> {
        self.log.lock().unwrap().push(Delivered::Delete { handle });
        Ok(())
    }

    async fn send_document(
        &self,
        to: UserId,
        path: &Path,
        caption: &str,
    ) -> Result<(), DeliveryFailure> {
        if self.fail_documents.load(Ordering::SeqCst) {
            return Err(DeliveryFailure::transport("upload failed"));
        }
        let body = std::fs::read_to_string(path)
            .map_err(|e| DeliveryFailure::transport(e.to_string()))?;
        self.log.lock().unwrap().push(Delivered::Document {
            to,
            caption: caption.to_string(),
            body,
        });
        Ok(())
    }
}
