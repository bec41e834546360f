use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use crate::error::Result;
use crate::models::{Cursor, FeedStatus, PullEntry};

use super::{from_millis, placeholders, to_millis, Database};

const PULL_COLUMNS: &str =
    "id, author_id, item_type, item_id, content_summary, status, created_at, updated_at";

/// Authors per `IN (...)` list, well under SQLite's bound-parameter limit.
const AUTHOR_CHUNK: usize = 500;

/// Per-author feed rows.
#[derive(Clone)]
pub struct PullStore {
    db: Database,
}

impl PullStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // Write path

    /// Insert `entry`, or return the row already stored for the same
    /// `(author_id, item_type, item_id)`. The flag is `true` when a new row
    /// was written.
    pub async fn insert_or_get(&self, entry: PullEntry) -> Result<(PullEntry, bool)> {
        let stored = self
            .db
            .conn()
            .call(move |conn| {
                let inserted = conn.execute(
                    r#"INSERT INTO pull_feeds (id, author_id, item_type, item_id, content_summary, status, created_at, updated_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                       ON CONFLICT(author_id, item_type, item_id) DO NOTHING"#,
                    params![
                        entry.id,
                        entry.author_id,
                        entry.item_type,
                        entry.item_id,
                        entry.content_summary,
                        entry.status,
                        to_millis(entry.created_at),
                        to_millis(entry.updated_at),
                    ],
                )?;
                if inserted == 1 {
                    return Ok((entry, true));
                }
                let existing = conn.query_row(
                    &format!(
                        "SELECT {PULL_COLUMNS} FROM pull_feeds WHERE author_id = ?1 AND item_type = ?2 AND item_id = ?3"
                    ),
                    params![entry.author_id, entry.item_type, entry.item_id],
                    pull_from_row,
                )?;
                Ok((existing, false))
            })
            .await?;
        Ok(stored)
    }

    pub async fn get(&self, id: i64) -> Result<Option<PullEntry>> {
        let entry = self
            .db
            .conn()
            .call(move |conn| {
                let entry = conn
                    .query_row(
                        &format!("SELECT {PULL_COLUMNS} FROM pull_feeds WHERE id = ?1"),
                        params![id],
                        pull_from_row,
                    )
                    .optional()?;
                Ok(entry)
            })
            .await?;
        Ok(entry)
    }

    // Read path

    /// Normal rows authored by any of `authors`, newest first, strictly below
    /// `cursor` when one is given. Large author sets are queried in chunks
    /// and the per-chunk pages merged.
    pub async fn list_for_authors(
        &self,
        authors: Vec<i64>,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> Result<Vec<PullEntry>> {
        if authors.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let entries = self
            .db
            .conn()
            .call(move |conn| {
                let mut entries = Vec::new();
                for chunk in authors.chunks(AUTHOR_CHUNK) {
                    let mut sql = format!(
                        "SELECT {PULL_COLUMNS} FROM pull_feeds WHERE author_id IN ({}) AND status = ?",
                        placeholders(chunk.len())
                    );
                    let mut args = chunk.to_vec();
                    args.push(FeedStatus::Normal.as_i64());
                    if let Some(cursor) = cursor {
                        sql.push_str(" AND (created_at < ? OR (created_at = ? AND id < ?))");
                        args.extend([cursor.timestamp, cursor.timestamp, cursor.max_id]);
                    }
                    sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?");
                    args.push(limit as i64);

                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt
                        .query_map(params_from_iter(args), pull_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    entries.extend(rows);
                }
                if authors.len() > AUTHOR_CHUNK {
                    entries.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
                    entries.truncate(limit);
                }
                Ok(entries)
            })
            .await?;
        Ok(entries)
    }

    // Compaction

    pub async fn hidden_batch(&self, after_id: i64, limit: usize) -> Result<Vec<i64>> {
        let ids = self
            .db
            .conn()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id FROM pull_feeds WHERE status = ?1 AND id > ?2 ORDER BY id LIMIT ?3",
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

    pub async fn delete_hidden(&self, ids: Vec<i64>) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let deleted = self
            .db
            .conn()
            .call(move |conn| {
                let sql = format!(
                    "DELETE FROM pull_feeds WHERE id IN ({}) AND status = ?",
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
                    "SELECT COUNT(*) FROM pull_feeds WHERE status = ?1",
                    params![status],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }
}

fn pull_from_row(row: &Row) -> rusqlite::Result<PullEntry> {
    Ok(PullEntry {
        id: row.get(0)?,
        author_id: row.get(1)?,
        item_type: row.get(2)?,
        item_id: row.get(3)?,
        content_summary: row.get(4)?,
        status: row.get(5)?,
        created_at: from_millis(row.get(6)?),
        updated_at: from_millis(row.get(7)?),
    })
}
