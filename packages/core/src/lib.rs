//! Core domain types for the crawl frontier.
//!
//! This crate contains shared types used across all packages:
//! - QueueEntry and EnqueueOutcome for pending work
//! - ResultRecord for processed work
//! - Stats snapshots for monitoring

mod entry;
mod record;
mod stats;

pub use entry::{EnqueueOutcome, QueueEntry};
pub use record::ResultRecord;
pub use stats::{FrontierStats, QueueStats, ResultStats};
