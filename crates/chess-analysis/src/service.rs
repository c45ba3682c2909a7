use crate::aggregator::Aggregator;
use crate::config::ServiceConfig;
use crate::event::AnalysisEvent;
use crate::orchestrator::{Orchestrator, TaskMessage};
use crate::repository::{
    EvaluationRepository, InMemoryEvaluationRepository, InMemoryInfoRepository,
    InMemoryTaskRepository, InfoRepository, TaskRepository,
};
use crate::task::{AnalysisTask, JobStatus, TaskDetails, TaskId};
use crate::AnalysisError;
use chess_engine::Position;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uci_client::EngineLauncher;

const EVENT_CAPACITY: usize = 1024;

/// Entry point for callers: accepts tasks, runs them one at a time on the
/// engine slot and publishes what comes out.
#[derive(Clone)]
pub struct AnalysisService {
    orchestrator: Orchestrator,
    tasks: Arc<dyn TaskRepository>,
    evaluations: Arc<dyn EvaluationRepository>,
    infos: Arc<dyn InfoRepository>,
    events: broadcast::Sender<AnalysisEvent>,
    hostname: String,
    /// Ids of synchronous tasks accepted but not yet finished.
    in_flight: Arc<Mutex<HashSet<TaskId>>>,
}

/// Holds a task id in the in-flight set until dropped.
struct Reservation {
    in_flight: Arc<Mutex<HashSet<TaskId>>>,
    id: TaskId,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

impl AnalysisService {
    /// Service backed by in-memory repositories.
    pub fn new(launcher: Arc<dyn EngineLauncher>, config: &ServiceConfig) -> Self {
        Self::with_repositories(
            launcher,
            config,
            Arc::new(InMemoryTaskRepository::new()),
            Arc::new(InMemoryEvaluationRepository::new()),
            Arc::new(InMemoryInfoRepository::new()),
        )
    }

    pub fn with_repositories(
        launcher: Arc<dyn EngineLauncher>,
        config: &ServiceConfig,
        tasks: Arc<dyn TaskRepository>,
        evaluations: Arc<dyn EvaluationRepository>,
        infos: Arc<dyn InfoRepository>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        AnalysisService {
            orchestrator: Orchestrator::new(launcher, config),
            tasks,
            evaluations,
            infos,
            events,
            hostname: config.hostname.clone(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.events.subscribe()
    }

    /// Starts `task` if the engine slot is free. Returns `None` when it is
    /// busy. Invalid tasks are rejected before the slot is touched.
    pub async fn start_async(&self, task: AnalysisTask) -> Result<Option<TaskId>, AnalysisError> {
        let root = task.validate()?;
        if !self.orchestrator.try_acquire_lock() {
            info!(task = %task.id, "engine busy, task not started");
            return Ok(None);
        }
        let id = task.id;
        self.launch(task, root).await?;
        Ok(Some(id))
    }

    /// Waits for the engine slot, runs `task` and returns once it has
    /// completed. A task id that was already accepted is ignored.
    pub async fn start_sync(&self, task: AnalysisTask) -> Result<Option<TaskId>, AnalysisError> {
        let root = task.validate()?;
        let Some(_reservation) = self.reserve(task.id) else {
            info!(task = %task.id, "duplicate task ignored");
            return Ok(None);
        };
        self.orchestrator.acquire_lock().await;
        let id = task.id;
        let pipeline = self.launch(task, root).await?;
        if let Err(e) = pipeline.await {
            warn!(task = %id, "analysis pipeline failed: {e}");
        }
        Ok(Some(id))
    }

    /// Claims `id` unless it already ran or is running. A task that failed
    /// to start gives its id back, so a redelivery can retry it.
    fn reserve(&self, id: TaskId) -> Option<Reservation> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if self.tasks.exists(id) || !in_flight.insert(id) {
            return None;
        }
        Some(Reservation {
            in_flight: self.in_flight.clone(),
            id,
        })
    }

    async fn launch(&self, task: AnalysisTask, root: Position) -> Result<JoinHandle<()>, AnalysisError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let name = self.orchestrator.start_analysis(&task, tx).await?;
        let task = task.with_engine_display_name(name);
        self.tasks.save(&task);
        info!(task = %task.id, host = %self.hostname, engine = %task.engine, "task accepted");

        let aggregator = Aggregator::new(task, root, self.infos.clone(), self.evaluations.clone());
        Ok(tokio::spawn(run_pipeline(
            aggregator,
            rx,
            self.events.clone(),
            self.orchestrator.clone(),
        )))
    }

    /// Stops the running task. Returns whether the engine slot is now free.
    pub async fn stop(&self) -> bool {
        self.orchestrator.stop().await
    }

    pub async fn kill(&self) -> bool {
        self.orchestrator.kill().await
    }

    pub fn job_status(&self, id: TaskId) -> JobStatus {
        if self.orchestrator.is_searching_task(id) {
            JobStatus::Active
        } else {
            JobStatus::NotActive
        }
    }

    pub fn task_details(&self, id: TaskId) -> Result<TaskDetails, AnalysisError> {
        let task = self
            .tasks
            .find_by_id(id)
            .ok_or(AnalysisError::TaskNotFound(id))?;
        Ok(TaskDetails {
            task,
            status: self.job_status(id),
            remaining_ms: self.orchestrator.remaining_time(id).as_millis() as u64,
            evaluation: self.evaluations.find_latest(id),
        })
    }

    /// Static evaluation of `fen`, waiting for the engine slot.
    pub async fn static_evaluation(&self, fen: &str) -> Result<String, AnalysisError> {
        Position::from_fen(fen)?;
        self.orchestrator.acquire_lock().await;
        let result = self.orchestrator.retrieve_static_evaluation(fen).await;
        self.orchestrator.release_lock();
        result
    }
}

/// Owns the task's board and evaluation state until the completion marker.
async fn run_pipeline(
    mut aggregator: Aggregator,
    mut rx: mpsc::UnboundedReceiver<TaskMessage>,
    events: broadcast::Sender<AnalysisEvent>,
    orchestrator: Orchestrator,
) {
    let task_id = aggregator.task_id();
    while let Some(message) = rx.recv().await {
        let batch = match message {
            TaskMessage::Info(batch) => batch,
            TaskMessage::Completed => break,
        };
        let outcome = aggregator.on_batch(&batch);
        for event in outcome.events {
            // No subscribers is fine.
            let _ = events.send(event);
        }
        let Some(lines) = outcome.shrink_to else {
            continue;
        };
        match orchestrator.shrink_lines(task_id, lines).await {
            Ok(true) => {
                for event in aggregator.confirm_shrink(lines) {
                    let _ = events.send(event);
                }
            }
            Ok(false) => warn!(task = %task_id, lines, "engine did not take the narrower search"),
            Err(e) => warn!(task = %task_id, lines, "could not narrow search: {e}"),
        }
    }
    let evaluation = aggregator.finish();
    info!(task = %task_id, final_depth = ?evaluation.as_ref().map(|e| e.depth), "task completed");
    let _ = events.send(AnalysisEvent::Completed {
        task_id,
        evaluation,
    });
}
