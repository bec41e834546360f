mod entry;
mod item;
mod outcome;

pub use entry::{FeedStatus, ItemType, PullEntry, PushEntry};
pub use item::{Cursor, FeedItem, NewFeedItem};
pub use outcome::{FanoutError, FanoutReport, HideReport, PublishOutcome};
