mod compaction;
mod engine;
mod merge;
mod plan;
mod summary;

pub use compaction::{CompactionReport, Compactor};
pub use engine::{DetachedFanout, FeedEngine};
pub use merge::{merge_pages, next_cursor};
pub use plan::plan_recipients;
pub use summary::summarize;
