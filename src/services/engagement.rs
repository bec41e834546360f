use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter};
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::Result;

/// Keeps `IN (...)` lists well below SQLite's bound-parameter limit.
const LOOKUP_CHUNK: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveUser {
    pub id: i64,
    pub last_active_at: DateTime<Utc>,
}

/// Answers "which of these users acted since `since`?". Users missing from
/// the answer are treated as inactive.
#[async_trait]
pub trait EngagementOracle: Send + Sync {
    async fn find_active_users(&self, ids: &[i64], since: DateTime<Utc>) -> Result<Vec<ActiveUser>>;
}

/// Activity watermarks kept in the `user_activity` table.
#[derive(Clone)]
pub struct SqliteEngagement {
    db: Database,
}

impl SqliteEngagement {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // Older timestamps never move the watermark back.
    pub async fn record_activity(&self, user_id: i64, at: DateTime<Utc>) -> Result<()> {
        let at = at.timestamp_millis();
        self.db
            .conn()
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO user_activity (user_id, last_active_at) VALUES (?1, ?2)
                       ON CONFLICT(user_id) DO UPDATE SET
                           last_active_at = MAX(last_active_at, excluded.last_active_at)"#,
                    params![user_id, at],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EngagementOracle for SqliteEngagement {
    async fn find_active_users(&self, ids: &[i64], since: DateTime<Utc>) -> Result<Vec<ActiveUser>> {
        let since = since.timestamp_millis();
        let mut active = Vec::new();

        for chunk in ids.chunks(LOOKUP_CHUNK) {
            let mut args = chunk.to_vec();
            let rows = self
                .db
                .conn()
                .call(move |conn| {
                    let sql = format!(
                        "SELECT user_id, last_active_at FROM user_activity WHERE user_id IN ({}) AND last_active_at >= ?",
                        crate::db::placeholders(args.len())
                    );
                    args.push(since);
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt
                        .query_map(params_from_iter(args), |row| {
                            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
                        })?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    Ok(rows)
                })
                .await?;

            active.extend(rows.into_iter().map(|(id, ms)| ActiveUser {
                id,
                last_active_at: DateTime::from_timestamp_millis(ms).unwrap_or_default(),
            }));
        }

        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn only_recent_users_are_active() {
        let oracle = SqliteEngagement::new(Database::open_in_memory().await.unwrap());
        let now = Utc::now();
        oracle.record_activity(2, now).await.unwrap();
        oracle.record_activity(3, now - Duration::days(5)).await.unwrap();
        oracle.record_activity(4, now - Duration::days(45)).await.unwrap();

        let mut active: Vec<i64> = oracle
            .find_active_users(&[2, 3, 4, 5], now - Duration::days(30))
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        active.sort();
        assert_eq!(active, vec![2, 3]);
    }

    #[tokio::test]
    async fn watermark_never_moves_backwards() {
        let oracle = SqliteEngagement::new(Database::open_in_memory().await.unwrap());
        let now = Utc::now();
        oracle.record_activity(2, now).await.unwrap();
        oracle.record_activity(2, now - Duration::days(90)).await.unwrap();

        let active = oracle
            .find_active_users(&[2], now - Duration::days(1))
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn large_candidate_sets_are_chunked() {
        let oracle = SqliteEngagement::new(Database::open_in_memory().await.unwrap());
        let now = Utc::now();
        let ids: Vec<i64> = (1..=1_200).collect();
        for id in ids.iter().filter(|id| *id % 2 == 0) {
            oracle.record_activity(*id, now).await.unwrap();
        }

        let active = oracle
            .find_active_users(&ids, now - Duration::days(1))
            .await
            .unwrap();
        assert_eq!(active.len(), 600);
    }
}
