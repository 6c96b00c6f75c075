//! Supervisor actor for the worker pool.

use std::marker::PhantomData;
use std::sync::Arc;

use db::{DocumentStore, QueueCoordinator};
use frontier_core::FrontierStats;
use ractor::{Actor, ActorProcessingErr, ActorRef, SupervisionEvent};
use tokio::task::JoinHandle;

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::handler::HandlerRegistry;
use crate::messages::{SupervisorMessage, WorkerMessage, WorkerTally};
use crate::worker_actor::{WorkerActor, WorkerArgs};

/// Supervisor arguments.
pub struct SupervisorArgs<S> {
    pub coordinator: QueueCoordinator<S>,
    pub handlers: HandlerRegistry,
    pub config: WorkerConfig,
}

/// State for the supervisor actor.
pub struct SupervisorState<S> {
    /// Worker actors, in spawn order.
    pub workers: Vec<ActorRef<WorkerMessage>>,
    /// Outcome totals reported by the workers.
    pub tally: WorkerTally,
    coordinator: QueueCoordinator<S>,
}

/// Supervisor actor that owns the workers.
pub struct Supervisor<S> {
    _store: PhantomData<fn() -> S>,
}

impl<S> Supervisor<S> {
    pub fn new() -> Self {
        Self {
            _store: PhantomData,
        }
    }
}

impl<S> Default for Supervisor<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: DocumentStore> Actor for Supervisor<S> {
    type Msg = SupervisorMessage;
    type State = SupervisorState<S>;
    type Arguments = SupervisorArgs<S>;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            "Starting frontier supervisor with {} worker(s)",
            args.config.concurrency
        );

        let handlers = Arc::new(args.handlers);
        let mut workers = Vec::with_capacity(args.config.concurrency);

        for i in 0..args.config.concurrency {
            let worker_args = WorkerArgs {
                worker_id: format!("worker-{}", i + 1),
                coordinator: args.coordinator.clone(),
                handlers: handlers.clone(),
                config: args.config.clone(),
                supervisor: Some(myself.clone()),
            };

            let (worker, _handle) =
                Actor::spawn_linked(None, WorkerActor::<S>::new(), worker_args, myself.get_cell())
                    .await
                    .map_err(|e| ActorProcessingErr::from(format!("Failed to spawn worker: {}", e)))?;
            workers.push(worker);
        }

        // Start periodic tick
        let myself_clone = myself.clone();
        let stats_interval = args.config.stats_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(stats_interval);
            interval.tick().await;
            loop {
                interval.tick().await;
                if myself_clone.send_message(SupervisorMessage::Tick).is_err() {
                    break;
                }
            }
        });

        Ok(SupervisorState {
            workers,
            tally: WorkerTally::default(),
            coordinator: args.coordinator,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisorMessage::Report { worker_id, outcome } => {
                tracing::trace!("Worker {} reported {:?}", worker_id, outcome);
                state.tally.record(outcome);
            }

            SupervisorMessage::GetTally { reply } => {
                let _ = reply.send(state.tally.clone());
            }

            SupervisorMessage::GetStats { reply } => {
                let _ = reply.send(state.coordinator.stats().await);
            }

            SupervisorMessage::Tick => match state.coordinator.stats().await {
                Ok(stats) => tracing::info!(
                    "Frontier: {} pending, {} busy, {} rejected, {} processed ({} awaiting upload)",
                    stats.queue.pending,
                    stats.queue.busy,
                    stats.queue.rejected,
                    stats.results.processed,
                    stats.results.awaiting_upload()
                ),
                Err(e) => tracing::warn!("Failed to read frontier stats: {}", e),
            },

            SupervisorMessage::Shutdown => {
                tracing::info!("Shutting down frontier supervisor");
                for worker in &state.workers {
                    let _ = worker.send_message(WorkerMessage::Shutdown);
                }
                myself.stop(None);
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisionEvent::ActorTerminated(cell, _, reason) => {
                state.workers.retain(|w| w.get_id() != cell.get_id());
                tracing::debug!("Worker {} terminated: {:?}", cell.get_id(), reason);
            }
            SupervisionEvent::ActorFailed(cell, error) => {
                state.workers.retain(|w| w.get_id() != cell.get_id());
                tracing::warn!("Worker {} failed: {}", cell.get_id(), error);
            }
            _ => {}
        }
        Ok(())
    }
}

/// Handle to a running worker pool.
pub struct WorkerPool {
    supervisor: ActorRef<SupervisorMessage>,
    handle: JoinHandle<()>,
}

impl WorkerPool {
    pub fn supervisor(&self) -> &ActorRef<SupervisorMessage> {
        &self.supervisor
    }

    /// Outcome totals reported so far.
    pub async fn tally(&self) -> Result<WorkerTally, WorkerError> {
        let (tx, rx) = ractor::concurrency::oneshot();
        self.supervisor
            .send_message(SupervisorMessage::GetTally { reply: tx.into() })
            .map_err(|e| WorkerError::Messaging(e.to_string()))?;
        rx.await.map_err(|e| WorkerError::Messaging(e.to_string()))
    }

    /// Fresh frontier stats read by the supervisor.
    pub async fn stats(&self) -> Result<FrontierStats, WorkerError> {
        let (tx, rx) = ractor::concurrency::oneshot();
        self.supervisor
            .send_message(SupervisorMessage::GetStats { reply: tx.into() })
            .map_err(|e| WorkerError::Messaging(e.to_string()))?;
        let stats = rx
            .await
            .map_err(|e| WorkerError::Messaging(e.to_string()))??;
        Ok(stats)
    }

    /// Stop every worker and wait for the supervisor to exit.
    ///
    /// A worker in the middle of a handler call finishes that entry first.
    pub async fn shutdown(self) -> Result<(), WorkerError> {
        self.supervisor
            .send_message(SupervisorMessage::Shutdown)
            .map_err(|e| WorkerError::Messaging(e.to_string()))?;
        self.handle
            .await
            .map_err(|e| WorkerError::Messaging(e.to_string()))
    }
}

/// Start the supervisor and its workers.
pub async fn start_workers<S: DocumentStore>(
    coordinator: QueueCoordinator<S>,
    handlers: HandlerRegistry,
    config: WorkerConfig,
) -> Result<WorkerPool, WorkerError> {
    config.validate()?;

    let args = SupervisorArgs {
        coordinator,
        handlers,
        config,
    };
    let (supervisor, handle) = Actor::spawn(None, Supervisor::<S>::new(), args).await?;

    Ok(WorkerPool { supervisor, handle })
}
