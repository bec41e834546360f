use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join;
use tokio::task::JoinHandle;

use crate::config::FanoutConfig;
use crate::db::{Database, PullStore, PushStore};
use crate::error::{AppError, Result};
use crate::models::{
    Cursor, FanoutError, FanoutReport, FeedItem, FeedStatus, HideReport, ItemType, NewFeedItem,
    PublishOutcome, PullEntry, PushEntry,
};
use crate::services::{EngagementOracle, IdGenerator, SocialGraph};

use super::merge::merge_pages;
use super::plan::plan_recipients;
use super::summary::summarize;

/// Fan-out running on its own task after the pull row was written.
pub struct DetachedFanout {
    pub feed_id: i64,
    pub handle: JoinHandle<PublishOutcome>,
}

impl DetachedFanout {
    /// Wait for the background fan-out to finish.
    pub async fn join(self) -> Result<PublishOutcome> {
        Ok(self.handle.await?)
    }
}

/// Hybrid push/pull feed engine.
///
/// Writes land in the pull store first (the record of publication) and are
/// then pushed to active followers. Reads merge the viewer's push rows with
/// the pull rows of everyone they follow, so a follower that missed the push
/// still sees the item.
#[derive(Clone)]
pub struct FeedEngine {
    db: Database,
    pulls: PullStore,
    pushes: PushStore,
    graph: Arc<dyn SocialGraph>,
    engagement: Arc<dyn EngagementOracle>,
    ids: Arc<dyn IdGenerator>,
    config: FanoutConfig,
}

impl FeedEngine {
    pub fn new(
        db: &Database,
        graph: Arc<dyn SocialGraph>,
        engagement: Arc<dyn EngagementOracle>,
        ids: Arc<dyn IdGenerator>,
        config: FanoutConfig,
    ) -> Self {
        Self {
            db: db.clone(),
            pulls: db.pull_store(),
            pushes: db.push_store(),
            graph,
            engagement,
            ids,
            config,
        }
    }

    pub fn config(&self) -> &FanoutConfig {
        &self.config
    }

    /// Publish an item and fan it out inline.
    ///
    /// Only a failed pull write is an error. Anything that goes wrong after it
    /// is reported through [`PublishOutcome::PublishedWithDegradedFanout`].
    pub async fn create_feed(&self, item: NewFeedItem) -> Result<PublishOutcome> {
        let entry = self.publish_pull(item).await?;
        Ok(self.fan_out(&entry).await)
    }

    /// Publish an item and hand fan-out to a background task.
    ///
    /// The task is not tied to the caller: dropping the returned handle or
    /// the calling future does not stop delivery. Its failures are only logged.
    pub async fn create_feed_detached(&self, item: NewFeedItem) -> Result<DetachedFanout> {
        let entry = self.publish_pull(item).await?;
        let feed_id = entry.id;
        let engine = self.clone();

        let handle = tokio::spawn(async move { engine.fan_out(&entry).await });

        Ok(DetachedFanout { feed_id, handle })
    }

    /// Run fan-out again for an already published item. Recipients that
    /// already hold a copy are skipped.
    pub async fn redeliver(&self, feed_id: i64) -> Result<PublishOutcome> {
        let entry = self
            .pulls
            .get(feed_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("feed {feed_id}")))?;

        if entry.status == FeedStatus::Hidden {
            return Err(AppError::InvalidArgument(format!(
                "feed {feed_id} was withdrawn"
            )));
        }

        Ok(self.fan_out(&entry).await)
    }

    /// One page of `viewer_id`'s timeline. `(0, 0)` asks for the first page;
    /// otherwise pass the `(feed_id, created_at)` of the last item seen.
    pub async fn follow_feed_ink_list(
        &self,
        viewer_id: i64,
        max_id: i64,
        timestamp: i64,
        limit: usize,
    ) -> Result<Vec<FeedItem>> {
        self.timeline(viewer_id, Cursor::from_parts(max_id, timestamp), limit)
            .await
    }

    /// Merged push + pull timeline. Both sub-fetches must succeed; the first
    /// error cancels the other and is returned.
    pub async fn timeline(
        &self,
        viewer_id: i64,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> Result<Vec<FeedItem>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let push = async {
            let rows = self
                .pushes
                .list_for_recipient(viewer_id, cursor, limit)
                .await?;
            Ok::<_, AppError>(rows.into_iter().map(FeedItem::from).collect::<Vec<_>>())
        };

        let pull = async {
            let authors = self
                .graph
                .following_ids(viewer_id, 0, self.config.max_followings)
                .await?;
            let rows = self.pulls.list_for_authors(authors, cursor, limit).await?;
            Ok::<_, AppError>(rows.into_iter().map(FeedItem::from).collect::<Vec<_>>())
        };

        let (pushed, pulled) = try_join(push, pull).await.map_err(|e| {
            tracing::warn!(viewer_id, "Timeline read failed: {}", e);
            e
        })?;

        Ok(merge_pages(pushed, pulled, limit))
    }

    /// An author's own published items, straight from the pull store.
    pub async fn author_feed(
        &self,
        author_id: i64,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> Result<Vec<FeedItem>> {
        let rows = self
            .pulls
            .list_for_authors(vec![author_id], cursor, limit)
            .await?;
        Ok(rows.into_iter().map(FeedItem::from).collect())
    }

    /// Withdraw an item: its pull row and every pushed copy become Hidden
    /// together. Rows are physically removed later by compaction.
    pub async fn delete_feed(
        &self,
        author_id: i64,
        item_type: ItemType,
        item_id: i64,
    ) -> Result<HideReport> {
        let report = self
            .db
            .withdraw(author_id, item_type, item_id)
            .await
            .map_err(|e| {
                tracing::error!(author_id, item_id, "Failed to withdraw feed: {}", e);
                e
            })?;

        tracing::info!(
            author_id,
            %item_type,
            item_id,
            pull_hidden = report.pull_hidden,
            push_hidden = report.push_hidden,
            "Feed withdrawn"
        );
        Ok(report)
    }

    async fn publish_pull(&self, item: NewFeedItem) -> Result<PullEntry> {
        if item.author_id <= 0 || item.item_id <= 0 {
            return Err(AppError::InvalidArgument(format!(
                "author_id and item_id must be positive (got {}, {})",
                item.author_id, item.item_id
            )));
        }

        let entry = PullEntry {
            id: self.ids.next_id(),
            author_id: item.author_id,
            item_type: item.item_type,
            item_id: item.item_id,
            content_summary: summarize(&item.content, self.config.summary_max_chars),
            status: FeedStatus::Normal,
            created_at: item.created_at,
            updated_at: Utc::now(),
        };

        let (stored, inserted) = self.pulls.insert_or_get(entry).await.map_err(|e| {
            tracing::error!(
                author_id = item.author_id,
                item_id = item.item_id,
                "Failed to write pull row: {}",
                e
            );
            e
        })?;

        if stored.status == FeedStatus::Hidden {
            return Err(AppError::InvalidArgument(format!(
                "{} {} by author {} was withdrawn",
                stored.item_type, stored.item_id, stored.author_id
            )));
        }
        if !inserted {
            tracing::debug!(feed_id = stored.id, "Item already published, fanning out again");
        }
        Ok(stored)
    }

    async fn fan_out(&self, entry: &PullEntry) -> PublishOutcome {
        let mut report = FanoutReport {
            feed_id: entry.id,
            ..Default::default()
        };
        let mut errors = Vec::new();

        let cap = self.config.max_followers;
        let lookup = self
            .graph
            .follower_ids(entry.author_id, 0, cap.saturating_add(1))
            .await;
        let mut followers = match lookup {
            Ok(followers) => followers,
            Err(e) => {
                tracing::warn!(feed_id = entry.id, "Follower lookup failed: {}", e);
                errors.push(FanoutError::FollowerLookup(e.to_string()));
                return PublishOutcome::from_parts(report, errors);
            }
        };
        if followers.len() > cap {
            followers.truncate(cap);
            report.capped = true;
            tracing::info!(
                feed_id = entry.id,
                author_id = entry.author_id,
                cap,
                "Author exceeds push audience cap, remaining followers read via pull"
            );
        }
        report.followers = followers.len();

        if followers.is_empty() {
            return PublishOutcome::from_parts(report, errors);
        }

        let since = Utc::now() - self.config.active_window();
        let active = match self.engagement.find_active_users(&followers, since).await {
            Ok(active) => active,
            Err(e) => {
                tracing::warn!(feed_id = entry.id, "Activity lookup failed: {}", e);
                errors.push(FanoutError::ActivityLookup(e.to_string()));
                return PublishOutcome::from_parts(report, errors);
            }
        };

        let recipients = plan_recipients(entry.author_id, &followers, &active);
        report.recipients = recipients.len();

        for chunk in recipients.chunks(self.config.batch_size.max(1)) {
            let rows = chunk
                .iter()
                .map(|recipient_id| self.push_row(entry, *recipient_id))
                .collect();

            match self.pushes.insert_batch(rows).await {
                Ok(batch) => {
                    report.delivered += batch.inserted;
                    if batch.failed > 0 {
                        errors.push(FanoutError::Insert {
                            recipients: batch.failed,
                            reason: "row insert failed".to_string(),
                        });
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        feed_id = entry.id,
                        recipients = chunk.len(),
                        "Push batch failed: {}",
                        e
                    );
                    errors.push(FanoutError::Insert {
                        recipients: chunk.len(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let outcome = PublishOutcome::from_parts(report, errors);
        if outcome.is_degraded() {
            tracing::warn!(
                feed_id = entry.id,
                errors = outcome.errors().len(),
                "Fan-out degraded, item remains readable via pull"
            );
        } else {
            tracing::debug!(
                feed_id = entry.id,
                delivered = outcome.report().delivered,
                "Fan-out complete"
            );
        }
        outcome
    }

    fn push_row(&self, entry: &PullEntry, recipient_id: i64) -> PushEntry {
        PushEntry {
            id: self.ids.next_id(),
            feed_id: entry.id,
            recipient_id,
            author_id: entry.author_id,
            item_type: entry.item_type,
            item_id: entry.item_id,
            content_summary: entry.content_summary.clone(),
            status: FeedStatus::Normal,
            created_at: entry.created_at,
            updated_at: Utc::now(),
        }
    }
}
