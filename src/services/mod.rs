mod engagement;
mod graph;
mod id_gen;

pub use engagement::{ActiveUser, EngagementOracle, SqliteEngagement};
pub use graph::{SocialGraph, SqliteSocialGraph};
pub use id_gen::{IdGenerator, SnowflakeGenerator};
