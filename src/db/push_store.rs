use rusqlite::{params, params_from_iter, Row};

use crate::error::Result;
use crate::models::{Cursor, FeedStatus, PushEntry};

use super::{from_millis, placeholders, to_millis, Database};

const PUSH_COLUMNS: &str = "id, feed_id, recipient_id, author_id, item_type, item_id, content_summary, status, created_at, updated_at";

/// Outcome of one fan-out batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchInsert {
    pub inserted: usize,
    /// Already present, or the source pull row is missing or hidden.
    pub skipped: usize,
    pub failed: usize,
}

/// Per-recipient feed rows.
#[derive(Clone)]
pub struct PushStore {
    db: Database,
}

impl PushStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // Fan-out

    /// Insert a batch of push rows in one transaction.
    ///
    /// A row is only written while its source pull row exists and is Normal,
    /// and an existing `(recipient_id, item_type, item_id)` row is left alone.
    /// Failures on individual rows are logged and skipped.
    pub async fn insert_batch(&self, rows: Vec<PushEntry>) -> Result<BatchInsert> {
        if rows.is_empty() {
            return Ok(BatchInsert::default());
        }

        let result = self
            .db
            .conn()
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut result = BatchInsert::default();
                {
                    let mut stmt = tx.prepare(
                        r#"INSERT OR IGNORE INTO push_feeds
                               (id, feed_id, recipient_id, author_id, item_type, item_id, content_summary, status, created_at, updated_at)
                           SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10
                           WHERE EXISTS (SELECT 1 FROM pull_feeds WHERE id = ?2 AND status = ?11)"#,
                    )?;
                    for row in &rows {
                        let outcome = stmt.execute(params![
                            row.id,
                            row.feed_id,
                            row.recipient_id,
                            row.author_id,
                            row.item_type,
                            row.item_id,
                            row.content_summary,
                            row.status,
                            to_millis(row.created_at),
                            to_millis(row.updated_at),
                            FeedStatus::Normal,
                        ]);
                        match outcome {
                            Ok(1) => result.inserted += 1,
                            Ok(_) => result.skipped += 1,
                            Err(e) => {
                                tracing::warn!(
                                    feed_id = row.feed_id,
                                    recipient_id = row.recipient_id,
                                    "Failed to insert push row: {}",
                                    e
                                );
                                result.failed += 1;
                            }
                        }
                    }
                }
                tx.commit()?;
                Ok(result)
            })
            .await?;
        Ok(result)
    }

    // Read path

    /// Normal rows delivered to `recipient_id`, newest first, strictly below
    /// `cursor` when one is given.
    pub async fn list_for_recipient(
        &self,
        recipient_id: i64,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> Result<Vec<PushEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let entries = self
            .db
            .conn()
            .call(move |conn| {
                let mut sql = format!(
                    "SELECT {PUSH_COLUMNS} FROM push_feeds WHERE recipient_id = ? AND status = ?"
                );
                let mut args = vec![recipient_id, FeedStatus::Normal.as_i64()];
                if let Some(cursor) = cursor {
                    sql.push_str(" AND (created_at < ? OR (created_at = ? AND feed_id < ?))");
                    args.extend([cursor.timestamp, cursor.timestamp, cursor.max_id]);
                }
                sql.push_str(" ORDER BY created_at DESC, feed_id DESC LIMIT ?");
                args.push(limit as i64);

                let mut stmt = conn.prepare(&sql)?;
                let entries = stmt
                    .query_map(params_from_iter(args), push_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await?;
        Ok(entries)
    }

    pub async fn recipients_of(&self, feed_id: i64) -> Result<Vec<i64>> {
        let recipients = self
            .db
            .conn()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT recipient_id FROM push_feeds WHERE feed_id = ?1 ORDER BY recipient_id",
                )?;
                let recipients = stmt
                    .query_map(params![feed_id], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<i64>, _>>()?;
                Ok(recipients)
            })
            .await?;
        Ok(recipients)
    }

    // Compaction

    pub async fn hidden_batch(&self, after_id: i64, limit: usize) -> Result<Vec<i64>> {
        let ids = self
            .db
            .conn()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id FROM push_feeds WHERE status = ?1 AND id > ?2 ORDER BY id LIMIT ?3",
                )?;
                let ids = stmt
                    .query_map(params![FeedStatus::Hidden, after_id, limit as i64], |row| {
                        row.get(0)
                    })?
                    .collect::<std::result::Result<Vec<i64>, _>>()?;
                Ok(ids)
            })
            .await?;
        Ok(ids)
    }

    /// Rows that are no longer hidden are left in place.
    pub async fn delete_hidden(&self, ids: Vec<i64>) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let deleted = self
            .db
            .conn()
            .call(move |conn| {
                let sql = format!(
                    "DELETE FROM push_feeds WHERE id IN ({}) AND status = ?",
                    placeholders(ids.len())
                );
                let mut args = ids;
                args.push(FeedStatus::Hidden.as_i64());
                let deleted = conn.execute(&sql, params_from_iter(args))?;
                Ok(deleted)
            })
            .await?;
        Ok(deleted)
    }

    pub async fn count_by_status(&self, status: FeedStatus) -> Result<i64> {
        let count = self
            .db
            .conn()
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM push_feeds WHERE status = ?1",
                    params![status],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }
}

fn push_from_row(row: &Row) -> rusqlite::Result<PushEntry> {
    Ok(PushEntry {
        id: row.get(0)?,
        feed_id: row.get(1)?,
        recipient_id: row.get(2)?,
        author_id: row.get(3)?,
        item_type: row.get(4)?,
        item_id: row.get(5)?,
        content_summary: row.get(6)?,
        status: row.get(7)?,
        created_at: from_millis(row.get(8)?),
        updated_at: from_millis(row.get(9)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::PullStore;
    use crate::models::{ItemType, PullEntry};

    fn pull(id: i64, author_id: i64, item_id: i64, created_ms: i64) -> PullEntry {
        PullEntry {
            id,
            author_id,
            item_type: ItemType::Post,
            item_id,
            content_summary: String::new(),
            status: FeedStatus::Normal,
            created_at: from_millis(created_ms),
            updated_at: from_millis(created_ms),
        }
    }

    fn push(id: i64, source: &PullEntry, recipient_id: i64) -> PushEntry {
        PushEntry {
            id,
            feed_id: source.id,
            recipient_id,
            author_id: source.author_id,
            item_type: source.item_type,
            item_id: source.item_id,
            content_summary: source.content_summary.clone(),
            status: FeedStatus::Normal,
            created_at: source.created_at,
            updated_at: source.updated_at,
        }
    }

    async fn stores() -> (PullStore, PushStore) {
        let db = Database::open_in_memory().await.unwrap();
        (db.pull_store(), db.push_store())
    }

    #[tokio::test]
    async fn batch_is_idempotent_per_recipient() {
        let (pulls, pushes) = stores().await;
        let source = pull(1, 1, 100, 1_000);
        pulls.insert_or_get(source.clone()).await.unwrap();

        let first = pushes
            .insert_batch(vec![push(10, &source, 2), push(11, &source, 3)])
            .await
            .unwrap();
        assert_eq!(first.inserted, 2);

        // Re-delivery with fresh row ids lands on the unique key and is skipped.
        let second = pushes
            .insert_batch(vec![push(12, &source, 2), push(13, &source, 3)])
            .await
            .unwrap();
        assert_eq!(second, BatchInsert { inserted: 0, skipped: 2, failed: 0 });
        assert_eq!(pushes.recipients_of(1).await.unwrap(), vec![2, 3]);
    }

    #[tokio::test]
    async fn push_requires_visible_pull_row() {
        let (pulls, pushes) = stores().await;
        let orphan = pull(1, 1, 100, 1_000);
        let result = pushes.insert_batch(vec![push(10, &orphan, 2)]).await.unwrap();
        assert_eq!(result.skipped, 1);

        pulls.insert_or_get(orphan.clone()).await.unwrap();
        pushes.db.withdraw(1, ItemType::Post, 100).await.unwrap();
        let result = pushes.insert_batch(vec![push(11, &orphan, 2)]).await.unwrap();
        assert_eq!(result.inserted, 0);
        assert!(pushes.recipients_of(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recipient_listing_respects_status_and_cursor() {
        let (pulls, pushes) = stores().await;
        let a = pull(1, 1, 100, 1_000);
        let b = pull(2, 1, 101, 2_000);
        let c = pull(3, 5, 500, 3_000);
        for source in [&a, &b, &c] {
            pulls.insert_or_get(source.clone()).await.unwrap();
        }
        pushes
            .insert_batch(vec![push(10, &a, 2), push(11, &b, 2), push(12, &c, 2), push(13, &c, 3)])
            .await
            .unwrap();

        let page = pushes.list_for_recipient(2, None, 2).await.unwrap();
        let feeds: Vec<i64> = page.iter().map(|e| e.feed_id).collect();
        assert_eq!(feeds, vec![3, 2]);

        let cursor = Cursor { max_id: 2, timestamp: 2_000 };
        let page = pushes.list_for_recipient(2, Some(cursor), 2).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].feed_id, 1);

        assert_eq!(pushes.db.withdraw(5, ItemType::Post, 500).await.unwrap().push_hidden, 2);
        let page = pushes.list_for_recipient(3, None, 10).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(pushes.count_by_status(FeedStatus::Hidden).await.unwrap(), 2);

        let hidden = pushes.hidden_batch(0, 1).await.unwrap();
        assert_eq!(hidden, vec![12]);
        assert_eq!(pushes.delete_hidden(vec![12, 13]).await.unwrap(), 2);
        assert_eq!(pushes.count_by_status(FeedStatus::Hidden).await.unwrap(), 0);
    }
}
