use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::CompactionConfig;
use crate::db::{Database, PullStore, PushStore};
use crate::error::Result;

/// A table holding tombstoned rows that can be claimed and removed in batches.
#[async_trait]
trait HiddenRows: Send + Sync {
    async fn hidden_batch(&self, after_id: i64, limit: usize) -> Result<Vec<i64>>;

    async fn delete_hidden(&self, ids: Vec<i64>) -> Result<usize>;
}

#[async_trait]
impl HiddenRows for PullStore {
    async fn hidden_batch(&self, after_id: i64, limit: usize) -> Result<Vec<i64>> {
        PullStore::hidden_batch(self, after_id, limit).await
    }

    async fn delete_hidden(&self, ids: Vec<i64>) -> Result<usize> {
        PullStore::delete_hidden(self, ids).await
    }
}

#[async_trait]
impl HiddenRows for PushStore {
    async fn hidden_batch(&self, after_id: i64, limit: usize) -> Result<Vec<i64>> {
        PushStore::hidden_batch(self, after_id, limit).await
    }

    async fn delete_hidden(&self, ids: Vec<i64>) -> Result<usize> {
        PushStore::delete_hidden(self, ids).await
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompactionReport {
    pub pull_deleted: usize,
    pub push_deleted: usize,
    pub batches: usize,
    pub errors: Vec<String>,
}

impl CompactionReport {
    pub fn deleted(&self) -> usize {
        self.pull_deleted + self.push_deleted
    }
}

/// Hard-deletes Hidden feed rows.
///
/// Each table is drained independently: claim up to a batch of hidden ids
/// above the last claimed id, delete them, and repeat until a claim comes
/// back empty. Runs are serialized by an in-process lease; a run that finds
/// the lease taken does nothing.
#[derive(Clone)]
pub struct Compactor {
    pulls: PullStore,
    pushes: PushStore,
    config: CompactionConfig,
    lease: Arc<Mutex<()>>,
}

impl Compactor {
    pub fn new(db: &Database, config: CompactionConfig) -> Self {
        Self {
            pulls: db.pull_store(),
            pushes: db.push_store(),
            config,
            lease: Arc::new(Mutex::new(())),
        }
    }

    /// Drain both tables once. Returns `None` when another run holds the lease.
    pub async fn run_once(&self) -> Option<CompactionReport> {
        let Ok(_lease) = self.lease.try_lock() else {
            debug!("feed compaction already running, skipping");
            return None;
        };

        let (pull, push) = tokio::join!(
            drain(&self.pulls, self.config.pull_batch),
            drain(&self.pushes, self.config.push_batch)
        );

        let mut report = CompactionReport::default();
        match pull {
            Ok((deleted, batches)) => {
                report.pull_deleted = deleted;
                report.batches += batches;
            }
            Err(e) => {
                error!("pull compaction failed: {e}");
                report.errors.push(format!("pull: {e}"));
            }
        }
        match push {
            Ok((deleted, batches)) => {
                report.push_deleted = deleted;
                report.batches += batches;
            }
            Err(e) => {
                error!("push compaction failed: {e}");
                report.errors.push(format!("push: {e}"));
            }
        }
        Some(report)
    }

    /// Start the periodic compaction loop. Cancel the returned token to stop it.
    pub fn start(self) -> CancellationToken {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let interval = self.config.interval();

        tokio::spawn(async move {
            info!("feed compaction started (interval={interval:?})");
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!("feed compaction stopped");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        match self.run_once().await {
                            Some(report) if report.deleted() > 0 => info!(
                                "feed compaction: removed {} pull / {} push rows in {} batches",
                                report.pull_deleted, report.push_deleted, report.batches
                            ),
                            Some(_) => debug!("feed compaction: nothing to remove"),
                            None => {}
                        }
                    }
                }
            }
        });

        cancel
    }
}

/// Returns `(rows deleted, non-empty batches)`.
async fn drain(table: &dyn HiddenRows, batch: usize) -> Result<(usize, usize)> {
    let mut watermark = 0;
    let mut deleted = 0;
    let mut batches = 0;

    loop {
        let ids = table.hidden_batch(watermark, batch).await?;
        let Some(last) = ids.last().copied() else {
            break;
        };
        watermark = last;
        deleted += table.delete_hidden(ids).await?;
        batches += 1;
    }

    Ok((deleted, batches))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeedStatus, ItemType, PullEntry};
    use chrono::Utc;
    use std::time::Duration;

    async fn seed_hidden(db: &Database, count: i64) {
        let pulls = db.pull_store();
        for id in 1..=count {
            let now = Utc::now();
            pulls
                .insert_or_get(PullEntry {
                    id,
                    author_id: 1,
                    item_type: ItemType::Post,
                    item_id: id,
                    content_summary: String::new(),
                    status: FeedStatus::Normal,
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap();
            db.withdraw(1, ItemType::Post, id).await.unwrap();
        }
    }

    fn small_batches() -> CompactionConfig {
        CompactionConfig {
            interval_secs: 1,
            pull_batch: 3,
            push_batch: 8,
        }
    }

    #[tokio::test]
    async fn drains_in_multiple_batches() {
        let db = Database::open_in_memory().await.unwrap();
        seed_hidden(&db, 7).await;

        let compactor = Compactor::new(&db, small_batches());
        let report = compactor.run_once().await.unwrap();
        assert_eq!(report.pull_deleted, 7);
        assert_eq!(report.push_deleted, 0);
        assert_eq!(report.batches, 3);
        assert!(report.errors.is_empty());

        let pulls = db.pull_store();
        assert_eq!(pulls.count_by_status(FeedStatus::Hidden).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_run_is_a_no_op() {
        let db = Database::open_in_memory().await.unwrap();
        let compactor = Compactor::new(&db, small_batches());
        assert_eq!(compactor.run_once().await.unwrap(), CompactionReport::default());
    }

    #[tokio::test]
    async fn held_lease_skips_the_run() {
        let db = Database::open_in_memory().await.unwrap();
        seed_hidden(&db, 2).await;
        let compactor = Compactor::new(&db, small_batches());

        let guard = compactor.lease.lock().await;
        assert!(compactor.run_once().await.is_none());
        drop(guard);

        assert_eq!(compactor.run_once().await.unwrap().pull_deleted, 2);
    }

    #[tokio::test]
    async fn scheduler_compacts_until_cancelled() {
        let db = Database::open_in_memory().await.unwrap();
        seed_hidden(&db, 4).await;

        let cancel = Compactor::new(&db, small_batches()).start();
        let pulls = db.pull_store();
        let mut remaining = 4;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            remaining = pulls.count_by_status(FeedStatus::Hidden).await.unwrap();
            if remaining == 0 {
                break;
            }
        }
        cancel.cancel();
        assert_eq!(remaining, 0);
    }
}
