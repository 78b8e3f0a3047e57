//! Pipeline dispatcher - runs pipeline jobs out-of-band on a worker pool
//!
//! Triggers reserve a slot with [`PipelineDispatcher::claim`] and hand the job
//! over with [`RunClaim::submit`]. Workers take jobs from a bounded queue and
//! run each one in its own task. If that task panics, or the run fails in a
//! way it could not write to the session itself, the worker marks the
//! session failed so the outcome always ends up in the store.

use std::{collections::HashSet, fmt, sync::Arc};

use domain::{SessionId, SessionUpdate, UserId};
use parking_lot::Mutex;
use tokio::{
    sync::{
        Mutex as AsyncMutex,
        mpsc::{self, OwnedPermit, error::TrySendError},
    },
    task::JoinSet,
};
use tracing::{debug, error, info, instrument, warn};

use super::pipeline_service::PipelineRunner;
use crate::{error::ApplicationError, ports::SessionStore};

/// Worker pool sizing
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Number of runs executing concurrently
    pub workers: usize,
    /// Jobs that may wait for a free worker
    pub queue_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 64,
        }
    }
}

/// A queued pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineJob {
    /// Session to process
    pub session_id: SessionId,
    /// Owner verified by the trigger
    pub owner_id: UserId,
}

type InFlight = Arc<Mutex<HashSet<SessionId>>>;

/// Entry point for submitting pipeline runs
pub struct PipelineDispatcher {
    sender: Arc<Mutex<Option<mpsc::Sender<PipelineJob>>>>,
    in_flight: InFlight,
}

impl fmt::Debug for PipelineDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineDispatcher")
            .field("in_flight", &self.in_flight.lock().len())
            .finish_non_exhaustive()
    }
}

/// Owns the worker tasks; used to shut the pool down
pub struct DispatcherHandle {
    sender: Arc<Mutex<Option<mpsc::Sender<PipelineJob>>>>,
    workers: JoinSet<()>,
}

impl fmt::Debug for DispatcherHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherHandle")
            .field("workers", &self.workers.len())
            .finish()
    }
}

/// A reserved queue slot for one session
///
/// Dropping the claim without submitting releases the slot.
#[must_use = "a claim does nothing until it is submitted"]
pub struct RunClaim {
    session_id: SessionId,
    permit: Option<OwnedPermit<PipelineJob>>,
    in_flight: InFlight,
}

impl fmt::Debug for RunClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunClaim")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl RunClaim {
    /// Enqueue the run; never blocks since the slot is already reserved
    pub fn submit(mut self, owner_id: UserId) {
        if let Some(permit) = self.permit.take() {
            permit.send(PipelineJob {
                session_id: self.session_id,
                owner_id,
            });
        }
    }
}

impl Drop for RunClaim {
    fn drop(&mut self) {
        if self.permit.is_some() {
            self.in_flight.lock().remove(&self.session_id);
        }
    }
}

impl PipelineDispatcher {
    /// Spawn the worker pool
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        runner: Arc<dyn PipelineRunner>,
        store: Arc<dyn SessionStore>,
        config: &DispatcherConfig,
    ) -> (Self, DispatcherHandle) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(AsyncMutex::new(rx));
        let sender = Arc::new(Mutex::new(Some(tx)));
        let in_flight: InFlight = Arc::default();

        let mut workers = JoinSet::new();
        for worker_id in 0..config.workers.max(1) {
            workers.spawn(worker_loop(
                worker_id,
                receiver.clone(),
                runner.clone(),
                store.clone(),
                in_flight.clone(),
            ));
        }

        info!(
            workers = config.workers.max(1),
            queue_capacity = config.queue_capacity.max(1),
            "Pipeline dispatcher started"
        );

        (
            Self {
                sender: sender.clone(),
                in_flight,
            },
            DispatcherHandle { sender, workers },
        )
    }

    /// Reserve a queue slot for `session_id`
    ///
    /// # Errors
    ///
    /// - `ApplicationError::Conflict` if a run for the session is queued or running
    /// - `ApplicationError::Busy` if the queue is full or shutting down
    pub fn claim(&self, session_id: SessionId) -> Result<RunClaim, ApplicationError> {
        let sender = self
            .sender
            .lock()
            .clone()
            .ok_or_else(|| ApplicationError::Busy("dispatcher is shutting down".to_string()))?;

        let mut in_flight = self.in_flight.lock();
        if in_flight.contains(&session_id) {
            return Err(ApplicationError::Conflict(format!(
                "session {session_id} is already being processed"
            )));
        }

        let permit = sender.try_reserve_owned().map_err(|e| match e {
            TrySendError::Full(_) => ApplicationError::Busy("processing queue is full".to_string()),
            TrySendError::Closed(_) => {
                ApplicationError::Busy("dispatcher is shutting down".to_string())
            },
        })?;
        in_flight.insert(session_id);

        Ok(RunClaim {
            session_id,
            permit: Some(permit),
            in_flight: self.in_flight.clone(),
        })
    }

    /// Whether a run for `session_id` is queued or executing
    #[must_use]
    pub fn is_running(&self, session_id: &SessionId) -> bool {
        self.in_flight.lock().contains(session_id)
    }

    /// Number of queued or executing runs
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }
}

impl DispatcherHandle {
    /// Stop accepting work and wait for queued runs to finish
    pub async fn shutdown(mut self) {
        // Closing the last sender lets workers drain the queue and exit
        self.sender.lock().take();
        while let Some(result) = self.workers.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Pipeline worker ended abnormally");
            }
        }
        info!("Pipeline dispatcher stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    receiver: Arc<AsyncMutex<mpsc::Receiver<PipelineJob>>>,
    runner: Arc<dyn PipelineRunner>,
    store: Arc<dyn SessionStore>,
    in_flight: InFlight,
) {
    loop {
        let job = receiver.lock().await.recv().await;
        let Some(job) = job else {
            debug!(worker_id, "Pipeline queue closed, worker exiting");
            break;
        };
        supervise(job, runner.clone(), store.as_ref()).await;
        in_flight.lock().remove(&job.session_id);
    }
}

#[instrument(skip(runner, store), fields(session_id = %job.session_id))]
async fn supervise(job: PipelineJob, runner: Arc<dyn PipelineRunner>, store: &dyn SessionStore) {
    let run = tokio::spawn(async move { runner.run(job.session_id, job.owner_id).await });

    let failure = match run.await {
        Ok(Ok(summary)) => {
            debug!(audio_generated = summary.audio_generated, "Run finished");
            None
        },
        Ok(Err(e)) if e.needs_recording() => Some(e.to_string()),
        Ok(Err(e)) => {
            debug!(error = %e, "Run ended with a recorded failure");
            None
        },
        Err(e) => {
            error!(error = %e, "Pipeline run aborted");
            Some("Processing aborted unexpectedly".to_string())
        },
    };

    if let Some(message) = failure {
        if let Err(e) = store
            .update(&job.session_id, SessionUpdate::failed(message))
            .await
        {
            warn!(error = %e, "Could not record pipeline failure");
        }
    }
}
