use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Visibility of a stored feed row. `Hidden` is a tombstone awaiting compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    #[default]
    Normal,
    Hidden,
}

impl FeedStatus {
    pub fn as_i64(self) -> i64 {
        match self {
            FeedStatus::Normal => 0,
            FeedStatus::Hidden => 1,
        }
    }
}

impl ToSql for FeedStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_i64()))
    }
}

impl FromSql for FeedStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_i64()? {
            0 => Ok(FeedStatus::Normal),
            1 => Ok(FeedStatus::Hidden),
            other => Err(FromSqlError::OutOfRange(other)),
        }
    }
}

/// Kind of authored item being distributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Post,
    Article,
    Video,
    Link,
}

impl ItemType {
    pub fn as_i64(self) -> i64 {
        match self {
            ItemType::Post => 1,
            ItemType::Article => 2,
            ItemType::Video => 3,
            ItemType::Link => 4,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(ItemType::Post),
            2 => Some(ItemType::Article),
            3 => Some(ItemType::Video),
            4 => Some(ItemType::Link),
            _ => None,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemType::Post => "post",
            ItemType::Article => "article",
            ItemType::Video => "video",
            ItemType::Link => "link",
        };
        f.write_str(name)
    }
}

impl FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "post" => Ok(ItemType::Post),
            "article" => Ok(ItemType::Article),
            "video" => Ok(ItemType::Video),
            "link" => Ok(ItemType::Link),
            other => Err(format!("unknown item type: {other}")),
        }
    }
}

impl ToSql for ItemType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_i64()))
    }
}

impl FromSql for ItemType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_i64()?;
        ItemType::from_i64(raw).ok_or(FromSqlError::OutOfRange(raw))
    }
}

/// "This item exists in author X's timeline."
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullEntry {
    pub id: i64,
    pub author_id: i64,
    pub item_type: ItemType,
    pub item_id: i64,
    pub content_summary: String,
    pub status: FeedStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// "This item was fanned out to user X." `feed_id` is the id of the
/// originating [`PullEntry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushEntry {
    pub id: i64,
    pub feed_id: i64,
    pub recipient_id: i64,
    pub author_id: i64,
    pub item_type: ItemType,
    pub item_id: i64,
    pub content_summary: String,
    pub status: FeedStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_type_parses_case_insensitively() {
        assert_eq!("Video".parse::<ItemType>().unwrap(), ItemType::Video);
        assert!("podcast".parse::<ItemType>().is_err());
    }

    #[test]
    fn item_type_storage_codes_are_stable() {
        for ty in [ItemType::Post, ItemType::Article, ItemType::Video, ItemType::Link] {
            assert_eq!(ItemType::from_i64(ty.as_i64()), Some(ty));
        }
        assert_eq!(ItemType::from_i64(0), None);
    }
}
