use serde::Serialize;
use thiserror::Error;

/// What fan-out managed to do for one item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FanoutReport {
    pub feed_id: i64,
    /// Followers resolved from the social graph (after the cap).
    pub followers: usize,
    /// Followers that passed the activity filter.
    pub recipients: usize,
    /// Push rows newly written. Rows that already existed are not counted.
    pub delivered: usize,
    /// The author has more followers than `max_followers`; the excess is
    /// served by the pull path only.
    pub capped: bool,
}

/// A non-fatal fan-out failure. The item stays readable through the pull path.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum FanoutError {
    #[error("follower lookup failed: {0}")]
    FollowerLookup(String),

    #[error("activity lookup failed: {0}")]
    ActivityLookup(String),

    #[error("push insert failed for {recipients} recipients: {reason}")]
    Insert { recipients: usize, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PublishOutcome {
    Published(FanoutReport),
    PublishedWithDegradedFanout {
        report: FanoutReport,
        errors: Vec<FanoutError>,
    },
}

impl PublishOutcome {
    pub fn from_parts(report: FanoutReport, errors: Vec<FanoutError>) -> Self {
        if errors.is_empty() {
            PublishOutcome::Published(report)
        } else {
            PublishOutcome::PublishedWithDegradedFanout { report, errors }
        }
    }

    pub fn report(&self) -> &FanoutReport {
        match self {
            PublishOutcome::Published(report) => report,
            PublishOutcome::PublishedWithDegradedFanout { report, .. } => report,
        }
    }

    pub fn feed_id(&self) -> i64 {
        self.report().feed_id
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, PublishOutcome::PublishedWithDegradedFanout { .. })
    }

    pub fn errors(&self) -> &[FanoutError] {
        match self {
            PublishOutcome::Published(_) => &[],
            PublishOutcome::PublishedWithDegradedFanout { errors, .. } => errors,
        }
    }
}

/// Rows moved to `Hidden` by a delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HideReport {
    pub pull_hidden: usize,
    pub push_hidden: usize,
}
