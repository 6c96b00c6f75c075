//! Worker actor that claims and settles queue entries.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use db::{DbError, DocumentStore, QueueCoordinator};
use frontier_core::{QueueEntry, ResultRecord};
use ractor::{Actor, ActorProcessingErr, ActorRef};

use crate::config::WorkerConfig;
use crate::handler::{HandlerRegistry, Outcome};
use crate::messages::{ClaimOutcome, SupervisorMessage, WorkerMessage};

/// State for the worker actor.
pub struct WorkerActorState<S> {
    /// Unique worker ID.
    pub worker_id: String,
    /// Entry currently being processed.
    pub current: Option<String>,
    coordinator: QueueCoordinator<S>,
    handlers: Arc<HandlerRegistry>,
    config: WorkerConfig,
    supervisor: Option<ActorRef<SupervisorMessage>>,
    /// Whether the worker should continue polling.
    running: bool,
}

impl<S: DocumentStore> WorkerActorState<S> {
    /// Check if the worker is idle.
    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    /// Claim one entry and settle it. `None` when nothing was claimable.
    async fn poll_once(&mut self) -> Option<ClaimOutcome> {
        let entry = match self.coordinator.claim_next().await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) if e.is_retryable() => {
                tracing::warn!("Worker {} failed to claim, will retry: {}", self.worker_id, e);
                return Some(ClaimOutcome::StoreError);
            }
            Err(e) => {
                tracing::error!("Worker {} failed to claim: {}", self.worker_id, e);
                return Some(ClaimOutcome::StoreError);
            }
        };

        self.current = Some(entry.key.clone());
        let started_at = Utc::now();
        let settled = self.settle(&entry).await;
        self.current = None;

        match settled {
            Ok(outcome) => {
                let duration_ms = (Utc::now() - started_at).num_milliseconds();
                tracing::debug!(
                    "Worker {} settled {} as {:?} in {}ms",
                    self.worker_id,
                    entry.key,
                    outcome,
                    duration_ms
                );
                Some(outcome)
            }
            Err(e) => {
                tracing::error!(
                    "Worker {} could not settle {}, entry stays claimed: {}",
                    self.worker_id,
                    entry.key,
                    e
                );
                Some(ClaimOutcome::StoreError)
            }
        }
    }

    async fn settle(&self, entry: &QueueEntry) -> Result<ClaimOutcome, DbError> {
        let handler = self.handlers.resolve(&entry.routing_key);

        let result = match self.config.handler_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, handler.handle(entry)).await {
                Ok(result) => result,
                Err(_) => Err("Handler timed out".to_string()),
            },
            None => handler.handle(entry).await,
        };

        let (action, outcome) = match result {
            Ok(Outcome::Processed(mut record)) => {
                if record.key != entry.key {
                    tracing::warn!(
                        "Handler returned record key {} for entry {}; using the entry key",
                        record.key,
                        entry.key
                    );
                    record.key = entry.key.clone();
                }
                (Settle::Complete(record), ClaimOutcome::Completed)
            }
            Ok(Outcome::Rejected) => (Settle::Reject, ClaimOutcome::Rejected),
            Ok(Outcome::Aborted) => (Settle::Release, ClaimOutcome::Released),
            Err(error) => {
                tracing::warn!(
                    "Worker {} handler failed for {}: {}",
                    self.worker_id,
                    entry.key,
                    error
                );
                (Settle::Release, ClaimOutcome::HandlerFailed)
            }
        };

        match self.apply_with_retry(&entry.key, &action).await {
            Ok(()) => Ok(outcome),
            Err(e) if matches!(action, Settle::Release) => Err(e),
            Err(e) => {
                // Give the claim back rather than leave it busy.
                tracing::warn!(
                    "Worker {} could not settle {}, releasing it: {}",
                    self.worker_id,
                    entry.key,
                    e
                );
                self.apply_with_retry(&entry.key, &Settle::Release).await?;
                Ok(ClaimOutcome::StoreError)
            }
        }
    }

    /// Apply a settle action, retrying retryable store errors up to
    /// `settle_retries` extra times with `idle_backoff` between attempts.
    async fn apply_with_retry(&self, key: &str, action: &Settle) -> Result<(), DbError> {
        let mut attempt = 0;
        loop {
            let applied = match action {
                Settle::Complete(record) => self.coordinator.complete_with(record).await,
                Settle::Reject => self.coordinator.reject(key).await.map(|_| ()),
                Settle::Release => self.coordinator.release(key).await,
            };

            match applied {
                Err(e) if e.is_retryable() && attempt < self.config.settle_retries => {
                    attempt += 1;
                    tracing::debug!(
                        "Worker {} retrying settle of {} (attempt {}): {}",
                        self.worker_id,
                        key,
                        attempt,
                        e
                    );
                    tokio::time::sleep(self.config.idle_backoff).await;
                }
                result => return result,
            }
        }
    }
}

/// Store action that ends a claim.
enum Settle {
    Complete(ResultRecord),
    Reject,
    Release,
}

/// Worker actor arguments.
pub struct WorkerArgs<S> {
    pub worker_id: String,
    pub coordinator: QueueCoordinator<S>,
    pub handlers: Arc<HandlerRegistry>,
    pub config: WorkerConfig,
    pub supervisor: Option<ActorRef<SupervisorMessage>>,
}

/// Worker actor that executes claimed entries.
pub struct WorkerActor<S> {
    _store: PhantomData<fn() -> S>,
}

impl<S> WorkerActor<S> {
    pub fn new() -> Self {
        Self {
            _store: PhantomData,
        }
    }
}

impl<S> Default for WorkerActor<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Send `Poll` to the worker after `delay`. Dropped if the worker stopped.
fn schedule_poll(myself: &ActorRef<WorkerMessage>, delay: Duration) {
    let myself = myself.clone();
    tokio::spawn(async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let _ = myself.send_message(WorkerMessage::Poll);
    });
}

impl<S: DocumentStore> Actor for WorkerActor<S> {
    type Msg = WorkerMessage;
    type State = WorkerActorState<S>;
    type Arguments = WorkerArgs<S>;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting worker: {}", args.worker_id);

        schedule_poll(&myself, Duration::ZERO);

        Ok(WorkerActorState {
            worker_id: args.worker_id,
            current: None,
            coordinator: args.coordinator,
            handlers: args.handlers,
            config: args.config,
            supervisor: args.supervisor,
            running: true,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Poll => {
                if !state.running {
                    return Ok(());
                }

                let outcome = state.poll_once().await;

                let delay = match outcome {
                    None | Some(ClaimOutcome::StoreError) => state.config.idle_backoff,
                    Some(_) => state.config.poll_interval,
                };

                if let (Some(outcome), Some(supervisor)) = (outcome, &state.supervisor) {
                    let _ = supervisor.send_message(SupervisorMessage::Report {
                        worker_id: state.worker_id.clone(),
                        outcome,
                    });
                }

                schedule_poll(&myself, delay);
            }

            WorkerMessage::Shutdown => {
                tracing::info!("Shutting down worker: {}", state.worker_id);
                state.running = false;
                myself.stop(None);
            }
        }

        Ok(())
    }
}
