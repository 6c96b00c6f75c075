//! Statistics snapshots for the queue and result collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counts of entries in the queue collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueStats {
    /// Entries waiting to be claimed.
    pub pending: u64,
    /// Entries currently claimed by a worker.
    pub busy: u64,
    /// Entries kept for audit after failing acceptance criteria.
    pub rejected: u64,
}

impl QueueStats {
    /// Entries that still hold a row in the queue collection.
    pub fn total(&self) -> u64 {
        self.pending + self.busy + self.rejected
    }

    /// Entries not yet excluded (pending + busy).
    pub fn active(&self) -> u64 {
        self.pending + self.busy
    }
}

/// Counts of records in the result collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultStats {
    pub processed: u64,
    pub uploaded: u64,
}

impl ResultStats {
    /// Records still waiting for the secondary step.
    pub fn awaiting_upload(&self) -> u64 {
        self.processed.saturating_sub(self.uploaded)
    }
}

/// Combined snapshot of both collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierStats {
    pub queue: QueueStats,
    pub results: ResultStats,
    /// When the counts were read.
    pub sampled_at: DateTime<Utc>,
}

impl FrontierStats {
    pub fn new(queue: QueueStats, results: ResultStats) -> Self {
        Self {
            queue,
            results,
            sampled_at: Utc::now(),
        }
    }

    /// Check if nothing is left to claim or finish.
    pub fn is_drained(&self) -> bool {
        self.queue.active() == 0
    }
}
