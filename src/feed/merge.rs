use crate::models::{Cursor, FeedItem};

/// Merge one page from each store into a single page.
///
/// Both inputs are already capped at `limit`, so a sort over their union is
/// enough. An item the viewer got both pushed and through a followed author
/// shares its `feed_id` across the two copies and is kept once.
pub fn merge_pages(push: Vec<FeedItem>, pull: Vec<FeedItem>, limit: usize) -> Vec<FeedItem> {
    let mut merged = push;
    merged.extend(pull);
    merged.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
    merged.dedup_by_key(|item| item.feed_id);
    merged.truncate(limit);
    merged
}

/// Cursor for the page after `page`, or `None` when the page is empty.
pub fn next_cursor(page: &[FeedItem]) -> Option<Cursor> {
    page.last().map(Cursor::after)
}
