use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};

use fanout_feed::config::Config;
use fanout_feed::db::Database;
use fanout_feed::feed::{next_cursor, Compactor, FeedEngine};
use fanout_feed::models::{ItemType, NewFeedItem};
use fanout_feed::services::{SnowflakeGenerator, SqliteEngagement, SqliteSocialGraph};

#[derive(Parser)]
#[command(name = "feedd", version, about = "Hybrid push/pull feed delivery")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Node number mixed into generated ids
    #[arg(long, global = true, default_value_t = 0)]
    node: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record that FOLLOWER follows FOLLOWEE
    Follow { follower: i64, followee: i64 },
    /// Remove a follow edge
    Unfollow { follower: i64, followee: i64 },
    /// Mark a user as active now
    Touch { user: i64 },
    /// Publish an item and fan it out
    Publish {
        #[arg(long)]
        author: i64,
        #[arg(long, default_value = "post")]
        item_type: ItemType,
        #[arg(long)]
        item_id: i64,
        #[arg(long, default_value = "")]
        content: String,
        /// Fan out on a background task and wait for it
        #[arg(long)]
        detach: bool,
    },
    /// Print one timeline page as JSON
    Timeline {
        #[arg(long)]
        viewer: i64,
        #[arg(long, default_value_t = 0)]
        max_id: i64,
        #[arg(long, default_value_t = 0)]
        timestamp: i64,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Withdraw an item
    Delete {
        #[arg(long)]
        author: i64,
        #[arg(long, default_value = "post")]
        item_type: ItemType,
        #[arg(long)]
        item_id: i64,
    },
    /// Re-run fan-out for a published item
    Redeliver { feed_id: i64 },
    /// Remove hidden rows once and exit
    Compact,
    /// Run the compaction scheduler until interrupted
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let db = Database::open(&config.db_path)
        .await
        .with_context(|| format!("Failed to open feed database at {}", config.db_path))?;
    let graph = Arc::new(SqliteSocialGraph::new(db.clone()));
    let engagement = Arc::new(SqliteEngagement::new(db.clone()));

    let engine = FeedEngine::new(
        &db,
        graph.clone(),
        engagement.clone(),
        Arc::new(SnowflakeGenerator::new(cli.node)),
        config.fanout.clone(),
    );

    match cli.command {
        Command::Follow { follower, followee } => {
            graph.follow(follower, followee).await?;
            println!("{} now follows {}", follower, followee);
        }
        Command::Unfollow { follower, followee } => {
            if graph.unfollow(follower, followee).await? {
                println!("{} no longer follows {}", follower, followee);
            } else {
                println!("{} did not follow {}", follower, followee);
            }
        }
        Command::Touch { user } => {
            engagement.record_activity(user, Utc::now()).await?;
        }
        Command::Publish {
            author,
            item_type,
            item_id,
            content,
            detach,
        } => {
            let item = NewFeedItem {
                author_id: author,
                item_type,
                item_id,
                content,
                created_at: Utc::now(),
            };
            let outcome = if detach {
                engine.create_feed_detached(item).await?.join().await?
            } else {
                engine.create_feed(item).await?
            };
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Timeline {
            viewer,
            max_id,
            timestamp,
            limit,
        } => {
            let items = engine
                .follow_feed_ink_list(viewer, max_id, timestamp, limit)
                .await?;
            let page = serde_json::json!({
                "items": items,
                "next": next_cursor(&items),
            });
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        Command::Delete {
            author,
            item_type,
            item_id,
        } => {
            let report = engine.delete_feed(author, item_type, item_id).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Redeliver { feed_id } => {
            let outcome = engine.redeliver(feed_id).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Compact => {
            let compactor = Compactor::new(&db, config.compaction.clone());
            if let Some(report) = compactor.run_once().await {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
        Command::Serve => {
            let cancel = Compactor::new(&db, config.compaction.clone()).start();
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for shutdown signal")?;
            cancel.cancel();
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}
