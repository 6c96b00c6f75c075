//! Queue entry types for units of pending work.

use serde::{Deserialize, Serialize};

/// A unit of pending, claimed or rejected work in the queue collection.
///
/// `key` is the business key (usually a URL). It is not the storage
/// record id, and its uniqueness is only guarded by the enqueue dedupe
/// checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Business key of the unit.
    pub key: String,
    /// True while a worker holds the claim.
    #[serde(default)]
    pub busy: bool,
    /// Soft-exclusion marker: the unit failed acceptance criteria.
    #[serde(default)]
    pub rejected: bool,
    /// Opaque classification, never interpreted by the coordinator.
    #[serde(default)]
    pub routing_key: String,
}

impl QueueEntry {
    pub const KEY: &'static str = "key";
    pub const BUSY: &'static str = "busy";
    pub const REJECTED: &'static str = "rejected";
    pub const ROUTING_KEY: &'static str = "routing_key";

    /// Create a new entry that is available for claiming.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            busy: false,
            rejected: false,
            routing_key: String::new(),
        }
    }

    /// Set the routing key for this entry.
    pub fn with_routing_key(mut self, routing_key: impl Into<String>) -> Self {
        self.routing_key = routing_key.into();
        self
    }

    /// Check if a claim could pick this entry up.
    pub fn is_claimable(&self) -> bool {
        !self.busy && !self.rejected
    }
}

/// Result of an enqueue attempt.
///
/// The two refusals are normal control flow for repeated producer
/// submissions, not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueOutcome {
    /// A new entry was inserted.
    Enqueued,
    /// A result record already exists for the key.
    AlreadyProcessed,
    /// An entry already exists for the key (queued, claimed or rejected).
    AlreadyQueued,
}

impl EnqueueOutcome {
    /// Check if the submission was refused as a duplicate.
    pub fn is_duplicate(&self) -> bool {
        !matches!(self, EnqueueOutcome::Enqueued)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnqueueOutcome::Enqueued => "enqueued",
            EnqueueOutcome::AlreadyProcessed => "already_processed",
            EnqueueOutcome::AlreadyQueued => "already_queued",
        }
    }
}

impl std::fmt::Display for EnqueueOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
