pub const SCHEMA: &str = r#"
-- pull_feeds: one row per authored item, read at timeline time
CREATE TABLE IF NOT EXISTS pull_feeds (
    id INTEGER PRIMARY KEY,
    author_id INTEGER NOT NULL,
    item_type INTEGER NOT NULL,
    item_id INTEGER NOT NULL,
    content_summary TEXT NOT NULL DEFAULT '',
    status INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE(author_id, item_type, item_id)
);

CREATE INDEX IF NOT EXISTS idx_pull_author_status_id ON pull_feeds(author_id, status, id);
CREATE INDEX IF NOT EXISTS idx_pull_author_status_created ON pull_feeds(author_id, status, created_at DESC, id DESC);
CREATE INDEX IF NOT EXISTS idx_pull_status_id ON pull_feeds(status, id);

-- push_feeds: one row per (recipient, item) written at fan-out time
CREATE TABLE IF NOT EXISTS push_feeds (
    id INTEGER PRIMARY KEY,
    feed_id INTEGER NOT NULL,
    recipient_id INTEGER NOT NULL,
    author_id INTEGER NOT NULL,
    item_type INTEGER NOT NULL,
    item_id INTEGER NOT NULL,
    content_summary TEXT NOT NULL DEFAULT '',
    status INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE(recipient_id, item_type, item_id)
);

CREATE INDEX IF NOT EXISTS idx_push_recipient_status_id ON push_feeds(recipient_id, status, id);
CREATE INDEX IF NOT EXISTS idx_push_recipient_status_created ON push_feeds(recipient_id, status, created_at DESC, feed_id DESC);
CREATE INDEX IF NOT EXISTS idx_push_item ON push_feeds(author_id, item_type, item_id);
CREATE INDEX IF NOT EXISTS idx_push_feed_id ON push_feeds(feed_id);
CREATE INDEX IF NOT EXISTS idx_push_status_id ON push_feeds(status, id);

-- follows: social graph edges, newest first when paging
CREATE TABLE IF NOT EXISTS follows (
    follower_id INTEGER NOT NULL,
    followee_id INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    PRIMARY KEY(follower_id, followee_id)
);

CREATE INDEX IF NOT EXISTS idx_follows_followee_created ON follows(followee_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_follows_follower_created ON follows(follower_id, created_at DESC);

-- user_activity: last time each user acted, consulted before fan-out
CREATE TABLE IF NOT EXISTS user_activity (
    user_id INTEGER PRIMARY KEY,
    last_active_at INTEGER NOT NULL
);
"#;
