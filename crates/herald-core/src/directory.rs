use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use herald_db::Database;
use herald_types::models::{Recipient, UserId};

/// Durable registry of everyone a broadcast can reach.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// Insert-or-ignore. Returns `true` if the recipient was new.
    async fn upsert(&self, recipient: &Recipient) -> Result<bool>;

    async fn count(&self) -> Result<u64>;

    /// Point-in-time list of every recipient id.
    async fn list(&self) -> Result<Vec<UserId>>;
}

/// Directory backed by the SQLite recipient table. Blocking DB calls run on
/// the blocking pool.
#[derive(Clone)]
pub struct SqliteDirectory {
    db: Arc<Database>,
}

impl SqliteDirectory {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecipientDirectory for SqliteDirectory {
    async fn upsert(&self, recipient: &Recipient) -> Result<bool> {
        let db = self.db.clone();
        let recipient = recipient.clone();
        tokio::task::spawn_blocking(move || {
            db.insert_recipient(
                recipient.id,
                &recipient.display_name,
                recipient.handle.as_deref(),
                recipient.joined_at,
            )
        })
        .await
        .map_err(|e| anyhow!("spawn_blocking join error: {}", e))?
    }

    async fn count(&self) -> Result<u64> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.count_recipients())
            .await
            .map_err(|e| anyhow!("spawn_blocking join error: {}", e))?
    }

    async fn list(&self) -> Result<Vec<UserId>> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.list_recipient_ids())
            .await
            .map_err(|e| anyhow!("spawn_blocking join error: {}", e))?
    }
}

/// Best-effort registration off the caller's path. Storage faults are logged
/// and swallowed.
pub fn register_in_background(
    directory: Arc<dyn RecipientDirectory>,
    recipient: Recipient,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match directory.upsert(&recipient).await {
            Ok(true) => debug!("Registered recipient {}", recipient.id),
            Ok(false) => {}
            Err(e) => error!("Failed to register recipient {}: {:#}", recipient.id, e),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryDirectory;
    use chrono::Utc;

    fn recipient(id: UserId) -> Recipient {
        Recipient {
            id,
            display_name: format!("user {}", id),
            handle: None,
            joined_at: Utc::now(),
        }
    }

    fn sqlite() -> (tempfile::TempDir, SqliteDirectory) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("herald.db")).unwrap();
        (dir, SqliteDirectory::new(Arc::new(db)))
    }

    #[tokio::test]
    async fn upsert_twice_counts_once() {
        let (_dir, directory) = sqlite();

        assert!(directory.upsert(&recipient(10)).await.unwrap());
        assert!(!directory.upsert(&recipient(10)).await.unwrap());
        assert_eq!(directory.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn snapshot_excludes_later_registrations() {
        let (_dir, directory) = sqlite();
        directory.upsert(&recipient(1)).await.unwrap();
        directory.upsert(&recipient(2)).await.unwrap();

        let snapshot = directory.list().await.unwrap();
        directory.upsert(&recipient(3)).await.unwrap();

        assert_eq!(snapshot, vec![1, 2]);
        assert_eq!(directory.list().await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn concurrent_upserts_keep_ids_unique() {
        let (_dir, directory) = sqlite();
        let directory = Arc::new(directory);

        let mut tasks = Vec::new();
        for id in 0..40 {
            let directory = directory.clone();
            // every id is registered twice from different tasks
            tasks.push(tokio::spawn(async move {
                directory.upsert(&recipient(id % 20)).await.unwrap();
            }));
        }
        let reader = directory.clone();
        let snapshot = tokio::spawn(async move { reader.list().await.unwrap() });
        for task in tasks {
            task.await.unwrap();
        }

        let mid_flight = snapshot.await.unwrap();
        let mut deduped = mid_flight.clone();
        deduped.dedup();
        assert_eq!(mid_flight, deduped);
        assert_eq!(directory.count().await.unwrap(), 20);
    }

    #[tokio::test]
    async fn background_registration_swallows_storage_faults() {
        let directory = Arc::new(MemoryDirectory::new());
        directory.fail_writes(true);

        register_in_background(directory.clone(), recipient(5))
            .await
            .unwrap();

        assert_eq!(directory.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn background_registration_inserts() {
        let directory = Arc::new(MemoryDirectory::new());
        register_in_background(directory.clone(), recipient(5))
            .await
            .unwrap();
        register_in_background(directory.clone(), recipient(5))
            .await
            .unwrap();
        assert_eq!(directory.list().await.unwrap(), vec![5]);
    }
}
