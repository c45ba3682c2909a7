//! Serialises access to the single engine slot and drives one search at a
//! time.
//!
//! The slot is a one-permit semaphore. Whoever holds it may start an
//! analysis; a watchdog then polls the session and, once the search is over,
//! runs the finish sequence: completion marker to the task's pipeline, stop,
//! disconnect, release. `stop` and `kill` run the same sequence. An atomic
//! flag on the running search makes sure it runs once. `kill` terminates the
//! session's probe first, so it never queues behind a narrowing or a
//! graceful finish that waits on the engine.

use crate::config::ServiceConfig;
use crate::task::{engine_position, AnalysisTask, TaskId};
use crate::AnalysisError;
use chess_engine::Position;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uci::EngineInfo;
use uci_client::{ClientError, EngineLauncher, EngineSession, SearchListener, SearchProbe, SessionTimeouts};

/// What flows from the engine to a task's processing loop.
#[derive(Debug)]
pub enum TaskMessage {
    Info(Vec<EngineInfo>),
    /// Sent once, after which nothing more arrives for the task.
    Completed,
}

struct TaskListener(mpsc::UnboundedSender<TaskMessage>);

impl SearchListener for TaskListener {
    fn on_info(&self, batch: Vec<EngineInfo>) {
        let _ = self.0.send(TaskMessage::Info(batch));
    }
}

struct ActiveSearch {
    task_id: TaskId,
    started: Instant,
    budget: Option<Duration>,
    probe: SearchProbe,
    sink: mpsc::UnboundedSender<TaskMessage>,
    finished: AtomicBool,
    watchdog: Mutex<Option<AbortHandle>>,
}

impl ActiveSearch {
    fn is_running(&self) -> bool {
        self.probe.is_alive() && (self.probe.is_searching() || self.probe.is_suspended())
    }
}

struct Inner {
    launcher: Arc<dyn EngineLauncher>,
    timeouts: SessionTimeouts,
    watchdog_interval: Duration,
    evaluation_engine: Option<String>,
    slot: Arc<Semaphore>,
    permit: Mutex<Option<OwnedSemaphorePermit>>,
    session: tokio::sync::Mutex<Option<EngineSession>>,
    active: Mutex<Option<Arc<ActiveSearch>>>,
    /// Probe of the search being finished, from its claim until the slot is
    /// released.
    closing: watch::Sender<Option<(TaskId, SearchProbe)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(launcher: Arc<dyn EngineLauncher>, config: &ServiceConfig) -> Self {
        Orchestrator {
            inner: Arc::new(Inner {
                launcher,
                timeouts: config.session_timeouts(),
                watchdog_interval: config.watchdog_interval(),
                evaluation_engine: config.evaluation_engine.clone(),
                slot: Arc::new(Semaphore::new(1)),
                permit: Mutex::new(None),
                session: tokio::sync::Mutex::new(None),
                active: Mutex::new(None),
                closing: watch::channel(None).0,
            }),
        }
    }

    /// Waits until the slot is free and takes it.
    pub async fn acquire_lock(&self) {
        match self.inner.slot.clone().acquire_owned().await {
            Ok(permit) => *lock(&self.inner.permit) = Some(permit),
            Err(e) => warn!("engine slot unavailable: {e}"),
        }
    }

    /// Takes the slot if it is free.
    pub fn try_acquire_lock(&self) -> bool {
        match self.inner.slot.clone().try_acquire_owned() {
            Ok(permit) => {
                *lock(&self.inner.permit) = Some(permit);
                true
            }
            Err(_) => false,
        }
    }

    pub fn release_lock(&self) {
        match lock(&self.inner.permit).take() {
            Some(permit) => {
                drop(permit);
                debug!("engine slot released");
            }
            None => warn!("engine slot released while not held"),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.inner.slot.available_permits() == 0
    }

    /// Starts the search for `task`, forwarding its output to `sink`.
    /// Returns the engine's display name.
    ///
    /// The slot must be held. On failure it is released before the error is
    /// returned.
    pub async fn start_analysis(
        &self,
        task: &AnalysisTask,
        sink: mpsc::UnboundedSender<TaskMessage>,
    ) -> Result<String, AnalysisError> {
        if !self.is_locked() {
            return Err(AnalysisError::NotLocked);
        }
        match self.launch(task, sink).await {
            Ok(name) => Ok(name),
            Err(e) => {
                warn!(task = %task.id, "analysis failed to start: {e}");
                let session = self.inner.session.lock().await.take();
                if let Some(mut session) = session {
                    session.kill().await;
                }
                self.release_lock();
                Err(match e {
                    AnalysisError::Client(source) => AnalysisError::TransientTaskFailure(source),
                    other => other,
                })
            }
        }
    }

    async fn launch(
        &self,
        task: &AnalysisTask,
        sink: mpsc::UnboundedSender<TaskMessage>,
    ) -> Result<String, AnalysisError> {
        let root: Position = task.root_position()?;
        let (fen, moves) = engine_position(&root);

        let mut guard = self.inner.session.lock().await;
        let reusable = match guard.as_mut() {
            Some(session) => {
                session.engine() == task.engine && session.is_alive() && !session.is_searching()
            }
            None => false,
        };
        if reusable {
            if let Some(session) = guard.as_mut() {
                debug!(engine = %task.engine, "reusing engine session");
                session.set_option("MultiPV", &task.lines.to_string()).await?;
                for (name, value) in &task.options {
                    session.set_option(name, value).await?;
                }
            }
        } else {
            if let Some(mut stale) = guard.take() {
                stale.disconnect().await;
            }
            let session = EngineSession::connect(
                self.inner.launcher.as_ref(),
                &task.engine,
                Some(task.lines),
                &task.options,
                self.inner.timeouts,
            )
            .await?;
            *guard = Some(session);
        }
        let session = guard
            .as_mut()
            .ok_or(AnalysisError::Client(ClientError::NotConnected))?;

        session.new_game().await?;
        session.set_position(&fen, &moves).await?;
        let listener: Arc<dyn SearchListener> = Arc::new(TaskListener(sink.clone()));
        if !session.go(task.go_options(), listener).await? {
            return Err(AnalysisError::Client(ClientError::Busy));
        }
        let probe = session.probe();
        let name = session.name().to_string();
        drop(guard);

        let search = Arc::new(ActiveSearch {
            task_id: task.id,
            started: Instant::now(),
            budget: task.movetime_ms.map(Duration::from_millis),
            probe,
            sink,
            finished: AtomicBool::new(false),
            watchdog: Mutex::new(None),
        });
        *lock(&self.inner.active) = Some(search.clone());
        let watchdog = tokio::spawn(self.clone().watch(search.clone()));
        *lock(&search.watchdog) = Some(watchdog.abort_handle());

        info!(task = %task.id, engine = %name, "analysis started");
        Ok(name)
    }

    async fn watch(self, search: Arc<ActiveSearch>) {
        let mut ticker = tokio::time::interval(self.inner.watchdog_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if !search.is_running() {
                break;
            }
        }
        debug!(task = %search.task_id, "search over");
        self.finish(Some(search.task_id), false, true).await;
    }

    /// Claims the running search for finishing. Only the first caller gets it.
    fn claim(&self, task_id: Option<TaskId>) -> Option<Arc<ActiveSearch>> {
        let mut active = lock(&self.inner.active);
        let search = active
            .as_ref()
            .filter(|s| task_id.map_or(true, |id| id == s.task_id))?
            .clone();
        search
            .finished
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        *active = None;
        self.inner
            .closing
            .send_replace(Some((search.task_id, search.probe.clone())));
        Some(search)
    }

    async fn finish(&self, task_id: Option<TaskId>, forcible: bool, from_watchdog: bool) -> bool {
        let Some(search) = self.claim(task_id) else {
            return false;
        };
        if !from_watchdog {
            if let Some(watchdog) = lock(&search.watchdog).take() {
                watchdog.abort();
            }
        }
        info!(task = %search.task_id, forcible, "finishing analysis");
        if forcible {
            search.probe.terminate();
        }

        let _ = search.sink.send(TaskMessage::Completed);
        let session = self.inner.session.lock().await.take();
        if let Some(mut session) = session {
            if forcible {
                session.kill().await;
            } else {
                if let Err(e) = session.stop().await {
                    warn!(task = %search.task_id, "stop failed: {e}");
                }
                session.disconnect().await;
            }
        }
        self.release_lock();
        self.inner.closing.send_if_modified(|closing| {
            let ours = closing.as_ref().is_some_and(|(id, _)| *id == search.task_id);
            if ours {
                *closing = None;
            }
            ours
        });
        true
    }

    /// Stops the running search cooperatively. Returns whether the slot is
    /// now free.
    pub async fn stop(&self) -> bool {
        self.finish(None, false, false).await;
        !self.is_locked()
    }

    /// Kills the engine. Returns whether the slot is now free.
    pub async fn kill(&self) -> bool {
        if !self.finish(None, true, false).await {
            let mut closing = self.inner.closing.subscribe();
            let probe = closing.borrow_and_update().clone();
            match probe {
                Some((_, probe)) => {
                    probe.terminate();
                    let _ = closing.wait_for(Option::is_none).await;
                }
                None => {
                    let session = self.inner.session.lock().await.take();
                    if let Some(mut session) = session {
                        session.kill().await;
                    }
                }
            }
        }
        !self.is_locked()
    }

    pub fn active_task(&self) -> Option<TaskId> {
        lock(&self.inner.active).as_ref().map(|s| s.task_id)
    }

    pub fn is_searching_task(&self, task_id: TaskId) -> bool {
        lock(&self.inner.active)
            .as_ref()
            .is_some_and(|s| s.task_id == task_id && s.is_running())
    }

    /// Time left of a movetime budget; zero when there is none or the task
    /// is not being searched.
    pub fn remaining_time(&self, task_id: TaskId) -> Duration {
        let active = lock(&self.inner.active);
        match active.as_ref() {
            Some(s) if s.task_id == task_id && s.is_running() => s
                .budget
                .map(|budget| (s.started + budget).saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::ZERO),
            _ => Duration::ZERO,
        }
    }

    /// Restarts the running search of `task_id` with `lines` principal
    /// variations. Returns `false` when that task is no longer searching.
    pub async fn shrink_lines(&self, task_id: TaskId, lines: u32) -> Result<bool, AnalysisError> {
        if !self.is_searching_task(task_id) {
            return Ok(false);
        }
        let mut guard = self.inner.session.lock().await;
        match guard.as_mut() {
            Some(session) if self.is_searching_task(task_id) => Ok(session
                .stop_set_option_go("MultiPV", &lines.to_string())
                .await?),
            _ => Ok(false),
        }
    }

    /// Static evaluation of `fen` by the configured evaluation engine, in
    /// the engine's own text format. The slot must be held.
    pub async fn retrieve_static_evaluation(&self, fen: &str) -> Result<String, AnalysisError> {
        if !self.is_locked() {
            return Err(AnalysisError::NotLocked);
        }
        let engine = self
            .inner
            .evaluation_engine
            .clone()
            .ok_or_else(|| AnalysisError::EngineUnavailable("no evaluation engine configured".into()))?;
        Position::from_fen(fen)?;

        let mut session = EngineSession::connect(
            self.inner.launcher.as_ref(),
            &engine,
            None,
            &[],
            self.inner.timeouts,
        )
        .await?;
        let text = session.eval(fen).await;
        session.disconnect().await;
        Ok(text?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeoutConfig;
    use uci_client::fake::FakeEngine;

    fn config() -> ServiceConfig {
        ServiceConfig {
            evaluation_engine: Some("fake".into()),
            watchdog_interval_ms: 10,
            timeouts: TimeoutConfig {
                handshake_ms: 300,
                ready_ms: 300,
                stop_ms: 300,
                quit_ms: 300,
                eval_quiet_ms: 50,
            },
            ..ServiceConfig::default()
        }
    }

    fn orchestrator(engine: &FakeEngine) -> Orchestrator {
        Orchestrator::new(Arc::new(engine.clone()), &config())
    }

    async fn drain(rx: &mut mpsc::UnboundedReceiver<TaskMessage>) -> (usize, bool) {
        let mut infos = 0;
        while let Some(message) = rx.recv().await {
            match message {
                TaskMessage::Info(_) => infos += 1,
                TaskMessage::Completed => return (infos, true),
            }
        }
        (infos, false)
    }

    #[tokio::test]
    async fn lock_is_exclusive_and_release_is_idempotent() {
        let o = orchestrator(&FakeEngine::new("fake"));
        assert!(o.try_acquire_lock());
        assert!(!o.try_acquire_lock());
        assert!(o.is_locked());
        o.release_lock();
        o.release_lock();
        assert!(!o.is_locked());
        o.acquire_lock().await;
        assert!(o.is_locked());
        o.release_lock();
    }

    #[tokio::test]
    async fn concurrent_try_acquire_has_one_winner() {
        let o = orchestrator(&FakeEngine::new("fake"));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let o = o.clone();
                tokio::spawn(async move { o.try_acquire_lock() })
            })
            .collect();
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn acquire_waits_for_release() {
        let o = orchestrator(&FakeEngine::new("fake"));
        o.acquire_lock().await;
        let waiter = {
            let o = o.clone();
            tokio::spawn(async move { o.acquire_lock().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        o.release_lock();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(o.is_locked());
    }

    #[tokio::test]
    async fn start_requires_lock() {
        let o = orchestrator(&FakeEngine::new("fake"));
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = o
            .start_analysis(&AnalysisTask::new("fake").with_depth(1), tx)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::NotLocked));
    }

    #[tokio::test]
    async fn failures_release_the_slot() {
        let engine = FakeEngine::new("fake").silent_ready();
        let o = orchestrator(&engine);

        assert!(o.try_acquire_lock());
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = o
            .start_analysis(&AnalysisTask::new("nope"), tx.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::EngineUnavailable(_)));
        assert!(!o.is_locked());

        assert!(o.try_acquire_lock());
        let err = o
            .start_analysis(&AnalysisTask::new("fake"), tx)
            .await
            .unwrap_err();
        assert!(err.is_transient(), "{err:?}");
        assert!(!o.is_locked());
    }

    #[tokio::test]
    async fn depth_search_completes_by_itself() {
        let engine = FakeEngine::new("fake");
        let o = orchestrator(&engine);
        let task = AnalysisTask::new("fake").with_pgn("1. e4 e5 *").with_depth(1);
        assert!(o.try_acquire_lock());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let name = o.start_analysis(&task, tx).await.unwrap();
        assert_eq!(name, "Fake Engine 1.0");

        let (infos, completed) = tokio::time::timeout(Duration::from_secs(2), drain(&mut rx))
            .await
            .unwrap();
        assert_eq!(infos, 1);
        assert!(completed);

        // The release happens right after the completion marker.
        tokio::time::timeout(Duration::from_secs(1), async {
            while o.is_locked() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert!(o.active_task().is_none());
        let commands = engine.commands();
        assert!(commands.contains(&format!(
            "position fen {} moves e2e4 e7e5",
            chess_core::FenRecord::STARTPOS
        )));
        assert!(commands.contains(&"go depth 1".to_string()));
        tokio::time::timeout(Duration::from_secs(1), async {
            while !engine.commands().contains(&"quit".to_string()) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn stop_and_kill_finish_once() {
        let engine = FakeEngine::new("fake");
        let o = orchestrator(&engine);
        let task = AnalysisTask::new("fake");
        assert!(o.try_acquire_lock());
        let (tx, mut rx) = mpsc::unbounded_channel();
        o.start_analysis(&task, tx).await.unwrap();
        assert!(o.is_searching_task(task.id));
        assert!(!o.is_searching_task(TaskId::new()));

        let (stopped, killed) = tokio::join!(o.stop(), o.kill());
        assert!(stopped || killed);
        assert!(!o.is_locked());
        assert!(!o.is_searching_task(task.id));
        let (_, completed) = drain(&mut rx).await;
        assert!(completed);
        assert!(o.stop().await);
    }

    #[tokio::test]
    async fn kill_preempts_a_narrowing_waiting_on_a_hung_engine() {
        let engine = FakeEngine::new("fake").ignore_stop();
        let mut config = config();
        config.timeouts.stop_ms = 5_000;
        let o = Orchestrator::new(Arc::new(engine.clone()), &config);
        let task = AnalysisTask::new("fake").with_lines(3);
        assert!(o.try_acquire_lock());
        let (tx, mut rx) = mpsc::unbounded_channel();
        o.start_analysis(&task, tx).await.unwrap();

        let id = task.id;
        let shrink = {
            let o = o.clone();
            tokio::spawn(async move { o.shrink_lines(id, 1).await })
        };
        tokio::time::timeout(Duration::from_secs(1), async {
            while !engine.commands().iter().any(|c| c == "stop") {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let freed = tokio::time::timeout(Duration::from_secs(1), o.kill())
            .await
            .unwrap();
        assert!(freed);
        let shrunk = tokio::time::timeout(Duration::from_secs(1), shrink)
            .await
            .unwrap()
            .unwrap();
        assert!(shrunk.is_err());
        let (_, completed) = drain(&mut rx).await;
        assert!(completed);
        assert!(!o.is_searching_task(id));
    }

    #[tokio::test]
    async fn kill_preempts_a_graceful_finish() {
        let engine = FakeEngine::new("fake").ignore_stop();
        let mut config = config();
        config.timeouts.stop_ms = 5_000;
        let o = Orchestrator::new(Arc::new(engine.clone()), &config);
        assert!(o.try_acquire_lock());
        let (tx, _rx) = mpsc::unbounded_channel();
        o.start_analysis(&AnalysisTask::new("fake"), tx).await.unwrap();

        let stop = {
            let o = o.clone();
            tokio::spawn(async move { o.stop().await })
        };
        tokio::time::timeout(Duration::from_secs(1), async {
            while !engine.commands().iter().any(|c| c == "stop") {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert!(tokio::time::timeout(Duration::from_secs(1), o.kill())
            .await
            .unwrap());
        assert!(tokio::time::timeout(Duration::from_secs(1), stop)
            .await
            .unwrap()
            .unwrap());
    }

    #[tokio::test]
    async fn remaining_time_follows_movetime_budget() {
        let engine = FakeEngine::new("fake");
        let o = orchestrator(&engine);
        let task = AnalysisTask::new("fake").with_movetime(5_000);
        assert!(o.try_acquire_lock());
        let (tx, _rx) = mpsc::unbounded_channel();
        o.start_analysis(&task, tx).await.unwrap();

        let left = o.remaining_time(task.id);
        assert!(left > Duration::from_secs(4) && left <= Duration::from_secs(5), "{left:?}");
        assert_eq!(o.remaining_time(TaskId::new()), Duration::ZERO);
        assert!(o.kill().await);
        assert_eq!(o.remaining_time(task.id), Duration::ZERO);
    }

    #[tokio::test]
    async fn shrinking_keeps_the_task_running() {
        let engine = FakeEngine::new("fake");
        let o = orchestrator(&engine);
        let task = AnalysisTask::new("fake").with_lines(3);
        assert!(o.try_acquire_lock());
        let (tx, _rx) = mpsc::unbounded_channel();
        o.start_analysis(&task, tx).await.unwrap();

        assert!(o.shrink_lines(task.id, 2).await.unwrap());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(o.is_searching_task(task.id));
        assert!(engine
            .commands()
            .contains(&"setoption name MultiPV value 2".to_string()));
        assert!(!o.shrink_lines(TaskId::new(), 1).await.unwrap());
        assert!(o.stop().await);
        assert!(!o.shrink_lines(task.id, 1).await.unwrap());
    }

    #[tokio::test]
    async fn static_evaluation_needs_the_slot() {
        let engine = FakeEngine::new("fake").with_eval(&["Final evaluation +0.25 (white side)"]);
        let o = orchestrator(&engine);
        let fen = chess_core::FenRecord::STARTPOS;
        assert!(matches!(
            o.retrieve_static_evaluation(fen).await,
            Err(AnalysisError::NotLocked)
        ));
        assert!(o.try_acquire_lock());
        let text = o.retrieve_static_evaluation(fen).await.unwrap();
        assert!(text.contains("+0.25"), "{text}");
        assert!(matches!(
            o.retrieve_static_evaluation("garbage").await,
            Err(AnalysisError::Position(_))
        ));
        o.release_lock();
        assert!(engine.commands().contains(&"eval".to_string()));
    }
}
