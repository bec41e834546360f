use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::{ItemType, PullEntry, PushEntry};

/// An authored item handed to the engine for distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFeedItem {
    pub author_id: i64,
    pub item_type: ItemType,
    pub item_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// One entry of a rendered timeline page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Pull-row id; shared by every push copy of the same item.
    pub feed_id: i64,
    pub id: i64,
    pub author_id: i64,
    pub item_type: ItemType,
    pub content_summary: String,
    pub created_at: DateTime<Utc>,
}

impl FeedItem {
    pub fn sort_key(&self) -> (i64, i64) {
        (self.created_at.timestamp_millis(), self.feed_id)
    }
}

impl From<PullEntry> for FeedItem {
    fn from(entry: PullEntry) -> Self {
        Self {
            feed_id: entry.id,
            id: entry.item_id,
            author_id: entry.author_id,
            item_type: entry.item_type,
            content_summary: entry.content_summary,
            created_at: entry.created_at,
        }
    }
}

impl From<PushEntry> for FeedItem {
    fn from(entry: PushEntry) -> Self {
        Self {
            feed_id: entry.feed_id,
            id: entry.item_id,
            author_id: entry.author_id,
            item_type: entry.item_type,
            content_summary: entry.content_summary,
            created_at: entry.created_at,
        }
    }
}

/// Composite pagination cursor. Treat both halves as one opaque token.
///
/// A page continues strictly below `(timestamp, max_id)` in
/// `(created_at, feed_id)` order, so items sharing a timestamp are neither
/// skipped nor repeated across pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub max_id: i64,
    /// Unix milliseconds.
    pub timestamp: i64,
}

impl Cursor {
    /// `(0, 0)` is the first-page sentinel and yields `None`.
    pub fn from_parts(max_id: i64, timestamp: i64) -> Option<Self> {
        if max_id == 0 && timestamp == 0 {
            None
        } else {
            Some(Self { max_id, timestamp })
        }
    }

    /// Cursor continuing after `item`.
    pub fn after(item: &FeedItem) -> Self {
        let (timestamp, max_id) = item.sort_key();
        Self { max_id, timestamp }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_cursor_is_first_page() {
        assert_eq!(Cursor::from_parts(0, 0), None);
        assert!(Cursor::from_parts(5, 0).is_some());
    }
}
