#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use fanout_feed::config::FanoutConfig;
use fanout_feed::db::Database;
use fanout_feed::feed::FeedEngine;
use fanout_feed::models::{ItemType, NewFeedItem};
use fanout_feed::services::{
    ActiveUser, EngagementOracle, SnowflakeGenerator, SocialGraph, SqliteEngagement,
    SqliteSocialGraph,
};
use fanout_feed::{AppError, Result};

/// Engine wired to SQLite-backed collaborators sharing one in-memory database.
pub struct Harness {
    pub db: Database,
    pub graph: Arc<SqliteSocialGraph>,
    pub engagement: Arc<SqliteEngagement>,
    pub engine: FeedEngine,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(FanoutConfig::default()).await
    }

    pub async fn with_config(config: FanoutConfig) -> Self {
        let db = Database::open_in_memory().await.unwrap();
        let graph = Arc::new(SqliteSocialGraph::new(db.clone()));
        let engagement = Arc::new(SqliteEngagement::new(db.clone()));
        let engine = FeedEngine::new(
            &db,
            graph.clone(),
            engagement.clone(),
            Arc::new(SnowflakeGenerator::new(1)),
            config,
        );
        Self {
            db,
            graph,
            engagement,
            engine,
        }
    }

    pub async fn follow(&self, follower: i64, followee: i64) {
        self.graph.follow(follower, followee).await.unwrap();
    }

    pub async fn active(&self, user: i64) {
        self.engagement.record_activity(user, Utc::now()).await.unwrap();
    }

    pub async fn inactive(&self, user: i64) {
        self.engagement
            .record_activity(user, Utc::now() - Duration::days(45))
            .await
            .unwrap();
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub fn post(author_id: i64, item_id: i64, created_at: DateTime<Utc>) -> NewFeedItem {
    NewFeedItem {
        author_id,
        item_type: ItemType::Post,
        item_id,
        content: format!("post {item_id} by {author_id}"),
        created_at,
    }
}

/// Graph with fixed edges whose lookups can be made to fail.
#[derive(Default)]
pub struct ScriptedGraph {
    pub followers: HashMap<i64, Vec<i64>>,
    pub following: HashMap<i64, Vec<i64>>,
    pub fail_followers: AtomicBool,
    pub fail_following: AtomicBool,
}

impl ScriptedGraph {
    pub fn edge(mut self, follower: i64, followee: i64) -> Self {
        self.followers.entry(followee).or_default().push(follower);
        self.following.entry(follower).or_default().push(followee);
        self
    }
}

fn page(ids: Option<&Vec<i64>>, offset: usize, limit: usize) -> Vec<i64> {
    ids.map(|ids| ids.iter().skip(offset).take(limit).copied().collect())
        .unwrap_or_default()
}

#[async_trait]
impl SocialGraph for ScriptedGraph {
    async fn follower_ids(&self, user_id: i64, offset: usize, limit: usize) -> Result<Vec<i64>> {
        if self.fail_followers.load(Ordering::SeqCst) {
            return Err(AppError::Graph("follower service unavailable".into()));
        }
        Ok(page(self.followers.get(&user_id), offset, limit))
    }

    async fn following_ids(&self, user_id: i64, offset: usize, limit: usize) -> Result<Vec<i64>> {
        if self.fail_following.load(Ordering::SeqCst) {
            return Err(AppError::Graph("following service unavailable".into()));
        }
        Ok(page(self.following.get(&user_id), offset, limit))
    }
}

/// Oracle that treats everyone as active, or fails every lookup.
pub struct StaticOracle {
    pub fail: bool,
}

#[async_trait]
impl EngagementOracle for StaticOracle {
    async fn find_active_users(&self, ids: &[i64], _since: DateTime<Utc>) -> Result<Vec<ActiveUser>> {
        if self.fail {
            return Err(AppError::Engagement("activity store timed out".into()));
        }
        Ok(ids
            .iter()
            .map(|id| ActiveUser {
                id: *id,
                last_active_at: Utc::now(),
            })
            .collect())
    }
}

pub async fn scripted_engine(
    graph: Arc<ScriptedGraph>,
    oracle: StaticOracle,
) -> (Database, FeedEngine) {
    let db = Database::open_in_memory().await.unwrap();
    let engine = FeedEngine::new(
        &db,
        graph,
        Arc::new(oracle),
        Arc::new(SnowflakeGenerator::new(2)),
        FanoutConfig::default(),
    );
    (db, engine)
}
