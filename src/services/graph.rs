use async_trait::async_trait;
use chrono::Utc;
use rusqlite::params;

use crate::db::Database;
use crate::error::Result;

/// Read-only view of who follows whom. Pages are ordered newest edge first.
#[async_trait]
pub trait SocialGraph: Send + Sync {
    async fn follower_ids(&self, user_id: i64, offset: usize, limit: usize) -> Result<Vec<i64>>;

    async fn following_ids(&self, user_id: i64, offset: usize, limit: usize) -> Result<Vec<i64>>;
}

/// Social graph kept in the `follows` table of the feed database.
#[derive(Clone)]
pub struct SqliteSocialGraph {
    db: Database,
}

impl SqliteSocialGraph {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record that `follower_id` follows `followee_id`. Re-following refreshes
    /// the edge's recency.
    pub async fn follow(&self, follower_id: i64, followee_id: i64) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        self.db
            .conn()
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO follows (follower_id, followee_id, created_at) VALUES (?1, ?2, ?3)
                       ON CONFLICT(follower_id, followee_id) DO UPDATE SET created_at = excluded.created_at"#,
                    params![follower_id, followee_id, now],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn unfollow(&self, follower_id: i64, followee_id: i64) -> Result<bool> {
        let removed = self
            .db
            .conn()
            .call(move |conn| {
                let removed = conn.execute(
                    "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
                    params![follower_id, followee_id],
                )?;
                Ok(removed > 0)
            })
            .await?;
        Ok(removed)
    }

    async fn page(&self, sql: &'static str, user_id: i64, offset: usize, limit: usize) -> Result<Vec<i64>> {
        let ids = self
            .db
            .conn()
            .call(move |conn| {
                let mut stmt = conn.prepare(sql)?;
                let ids = stmt
                    .query_map(params![user_id, limit as i64, offset as i64], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<i64>, _>>()?;
                Ok(ids)
            })
            .await?;
        Ok(ids)
    }
}

#[async_trait]
impl SocialGraph for SqliteSocialGraph {
    async fn follower_ids(&self, user_id: i64, offset: usize, limit: usize) -> Result<Vec<i64>> {
        self.page(
            "SELECT follower_id FROM follows WHERE followee_id = ?1 ORDER BY created_at DESC, follower_id DESC LIMIT ?2 OFFSET ?3",
            user_id,
            offset,
            limit,
        )
        .await
    }

    async fn following_ids(&self, user_id: i64, offset: usize, limit: usize) -> Result<Vec<i64>> {
        self.page(
            "SELECT followee_id FROM follows WHERE follower_id = ?1 ORDER BY created_at DESC, followee_id DESC LIMIT ?2 OFFSET ?3",
            user_id,
            offset,
            limit,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn graph() -> SqliteSocialGraph {
        SqliteSocialGraph::new(Database::open_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn followers_and_followings_page() {
        let graph = graph().await;
        for follower in [2, 3, 4] {
            graph.follow(follower, 1).await.unwrap();
        }
        graph.follow(2, 7).await.unwrap();

        let mut followers = graph.follower_ids(1, 0, 10).await.unwrap();
        followers.sort();
        assert_eq!(followers, vec![2, 3, 4]);

        assert_eq!(graph.follower_ids(1, 0, 2).await.unwrap().len(), 2);
        assert_eq!(graph.follower_ids(1, 2, 2).await.unwrap().len(), 1);

        let mut following = graph.following_ids(2, 0, 10).await.unwrap();
        following.sort();
        assert_eq!(following, vec![1, 7]);
    }

    #[tokio::test]
    async fn follow_is_idempotent_and_unfollow_removes_edge() {
        let graph = graph().await;
        graph.follow(2, 1).await.unwrap();
        graph.follow(2, 1).await.unwrap();
        assert_eq!(graph.follower_ids(1, 0, 10).await.unwrap(), vec![2]);

        assert!(graph.unfollow(2, 1).await.unwrap());
        assert!(!graph.unfollow(2, 1).await.unwrap());
        assert!(graph.follower_ids(1, 0, 10).await.unwrap().is_empty());
    }
}
