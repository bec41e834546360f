//! Hybrid push/pull feed delivery.
//!
//! Authored items are written once to the author's pull timeline and then
//! fanned out to the push timelines of recently active followers. Timeline
//! reads merge a viewer's push rows with the pull rows of the authors they
//! follow, so anyone skipped at fan-out time still sees every item. Deletes
//! tombstone rows immediately and [`feed::Compactor`] removes them later.

pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
