mod pull_store;
mod push_store;
mod schema;

pub use pull_store::PullStore;
pub use push_store::{BatchInsert, PushStore};

use chrono::{DateTime, Utc};
use rusqlite::params;
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{FeedStatus, HideReport, ItemType};

use schema::SCHEMA;

/// Shared handle to the feed database. Cloning is cheap; all clones talk to
/// the same background SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    pub async fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        tracing::debug!("Opened feed database at {}", db_path);
        Ok(Self { conn })
    }

    /// Fresh private database, used by tests and dry runs.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn pull_store(&self) -> PullStore {
        PullStore::new(self.clone())
    }

    pub fn push_store(&self) -> PushStore {
        PushStore::new(self.clone())
    }

    /// Tombstone an item's pull row and every pushed copy in one transaction.
    /// Either both tables change or neither does.
    pub async fn withdraw(
        &self,
        author_id: i64,
        item_type: ItemType,
        item_id: i64,
    ) -> Result<HideReport> {
        let now = to_millis(Utc::now());
        let report = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let pull_hidden = tx.execute(
                    "UPDATE pull_feeds SET status = ?1, updated_at = ?2 WHERE author_id = ?3 AND item_type = ?4 AND item_id = ?5 AND status = ?6",
                    params![FeedStatus::Hidden, now, author_id, item_type, item_id, FeedStatus::Normal],
                )?;
                let push_hidden = tx.execute(
                    "UPDATE push_feeds SET status = ?1, updated_at = ?2 WHERE author_id = ?3 AND item_type = ?4 AND item_id = ?5 AND status = ?6",
                    params![FeedStatus::Hidden, now, author_id, item_type, item_id, FeedStatus::Normal],
                )?;
                tx.commit()?;
                Ok(HideReport {
                    pull_hidden,
                    push_hidden,
                })
            })
            .await?;
        Ok(report)
    }
}

pub(crate) fn to_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Comma-separated `?` placeholders for an `IN (...)` list.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}
