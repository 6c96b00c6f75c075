//! Message types for actor communication.

use db::DbError;
use frontier_core::FrontierStats;
use ractor::RpcReplyPort;
use serde::Serialize;

/// How a worker's poll ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Result recorded and entry removed.
    Completed,
    /// Entry marked rejected.
    Rejected,
    /// Handler aborted; entry released.
    Released,
    /// Handler failed or timed out; entry released.
    HandlerFailed,
    /// A store call failed. A claimed entry is released when the store
    /// allows it; otherwise it stays busy until an operator resets claims.
    StoreError,
}

/// Running totals of worker outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerTally {
    pub completed: u64,
    pub rejected: u64,
    pub released: u64,
    pub handler_failures: u64,
    pub store_errors: u64,
}

impl WorkerTally {
    pub fn record(&mut self, outcome: ClaimOutcome) {
        match outcome {
            ClaimOutcome::Completed => self.completed += 1,
            ClaimOutcome::Rejected => self.rejected += 1,
            ClaimOutcome::Released => self.released += 1,
            ClaimOutcome::HandlerFailed => self.handler_failures += 1,
            ClaimOutcome::StoreError => self.store_errors += 1,
        }
    }

    /// Entries that reached a terminal state (completed or rejected).
    pub fn settled(&self) -> u64 {
        self.completed + self.rejected
    }
}

/// Messages for the WorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Claim and settle at most one entry.
    Poll,

    /// Shutdown the worker.
    Shutdown,
}

/// Messages for the Supervisor.
#[derive(Debug)]
pub enum SupervisorMessage {
    /// A worker finished a poll that claimed an entry or hit an error.
    Report {
        worker_id: String,
        outcome: ClaimOutcome,
    },

    /// Get the running outcome totals.
    GetTally { reply: RpcReplyPort<WorkerTally> },

    /// Read fresh frontier stats from the store.
    GetStats {
        reply: RpcReplyPort<Result<FrontierStats, DbError>>,
    },

    /// Shutdown all workers.
    Shutdown,

    /// Periodic tick for stats logging.
    Tick,
}
