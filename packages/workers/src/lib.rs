//! Actor-based crawl workers for the frontier queue.
//!
//! This crate is the host side of the queue protocol: ractor actors that
//! claim entries through a [`db::QueueCoordinator`], hand them to a
//! [`UrlHandler`] and record the outcome.
//!
//! # Architecture
//!
//! - `Supervisor` - Spawns the workers, tallies outcomes, logs stats
//! - `WorkerActor` - Claims one entry per poll and settles it
//!
//! # Usage
//!
//! ```ignore
//! use workers::{FnHandler, HandlerRegistry, Outcome, WorkerConfig, start_workers};
//!
//! let handlers = HandlerRegistry::new(FnHandler::new(|entry| {
//!     let key = entry.key.clone();
//!     Box::pin(async move { Ok(Outcome::Processed(ResultRecord::new(key))) })
//! }));
//! let pool = start_workers(coordinator, handlers, WorkerConfig::default()).await?;
//! ```

mod config;
mod error;
mod handler;
mod messages;
mod supervisor;
mod worker_actor;

pub use config::WorkerConfig;
pub use error::WorkerError;
pub use handler::{FnHandler, HandlerFuture, HandlerRegistry, HandlerResult, Outcome, UrlHandler};
pub use messages::{ClaimOutcome, SupervisorMessage, WorkerMessage, WorkerTally};
pub use supervisor::{Supervisor, SupervisorArgs, WorkerPool, start_workers};
pub use worker_actor::{WorkerActor, WorkerArgs};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort, concurrency};
