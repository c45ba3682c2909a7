use crate::listener::SearchListener;
use crate::transport::{BoxReader, BoxWriter};
use crate::{ClientError, EngineLauncher};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use uci::{EngineCommand, EngineInfo, EngineMessage, GoOptions, OptionKind, OptionSpec};

/// Bounds on every blocking exchange with the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    /// `uci` until `uciok`.
    pub handshake: Duration,
    /// `isready` until `readyok`.
    pub ready: Duration,
    /// `stop` until `bestmove`.
    pub stop: Duration,
    /// `quit` until the process exits.
    pub quit: Duration,
    /// Silence that ends `eval` output.
    pub eval_quiet: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        SessionTimeouts {
            handshake: Duration::from_secs(10),
            ready: Duration::from_secs(5),
            stop: Duration::from_secs(5),
            quit: Duration::from_secs(2),
            eval_quiet: Duration::from_millis(500),
        }
    }
}

/// State shared between a session and its reader task.
struct Shared {
    searching: watch::Sender<bool>,
    /// Set by [`SearchProbe::terminate`]; never cleared.
    terminated: watch::Sender<bool>,
    suspended: AtomicBool,
    alive: AtomicBool,
    listener: Mutex<Option<Arc<dyn SearchListener>>>,
    best_move: Mutex<Option<String>>,
}

impl Shared {
    fn new() -> Self {
        let (searching, _) = watch::channel(false);
        let (terminated, _) = watch::channel(false);
        Shared {
            searching,
            terminated,
            suspended: AtomicBool::new(false),
            alive: AtomicBool::new(true),
            listener: Mutex::new(None),
            best_move: Mutex::new(None),
        }
    }

    fn is_searching(&self) -> bool {
        *self.searching.borrow()
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && !self.is_terminated()
    }

    fn is_terminated(&self) -> bool {
        *self.terminated.borrow()
    }

    async fn wait_terminated(&self) {
        let mut rx = self.terminated.subscribe();
        let _ = rx.wait_for(|terminated| *terminated).await;
    }

    /// Runs `exchange` unless the session is terminated first.
    async fn unless_terminated<T>(
        &self,
        exchange: impl std::future::Future<Output = Result<T, ClientError>>,
    ) -> Result<T, ClientError> {
        tokio::select! {
            result = exchange => result,
            _ = self.wait_terminated() => Err(ClientError::NotConnected),
        }
    }

    fn set_listener(&self, listener: Option<Arc<dyn SearchListener>>) {
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = listener;
    }

    fn best_move(&self) -> Option<String> {
        self.best_move
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn deliver(&self, batch: Vec<EngineInfo>) {
        if batch.is_empty() || self.suspended.load(Ordering::SeqCst) {
            return;
        }
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(listener) = listener {
            listener.on_info(batch);
        }
    }

    fn finish_search(&self, best: Option<String>) {
        *self.best_move.lock().unwrap_or_else(PoisonError::into_inner) = best.clone();
        self.searching.send_replace(false);
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if self.suspended.load(Ordering::SeqCst) {
            return;
        }
        if let Some(listener) = listener {
            listener.on_best_move(best.as_deref());
        }
    }
}

/// Decodes engine output until EOF. Search output goes to the listener,
/// everything else to `control`.
async fn read_loop(
    reader: BoxReader,
    shared: Arc<Shared>,
    control: mpsc::UnboundedSender<EngineMessage>,
) {
    let mut lines = BufReader::new(reader).lines();
    let mut batch = Vec::new();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("reading engine output failed: {e}");
                break;
            }
        };
        trace!("engine >> {line}");

        match EngineMessage::parse(&line) {
            EngineMessage::Info(info) => {
                if shared.is_searching() {
                    batch.push(info);
                }
                // Flush once no further complete line is already buffered.
                if !lines.get_ref().buffer().contains(&b'\n') {
                    shared.deliver(std::mem::take(&mut batch));
                }
            }
            EngineMessage::BestMove { mv, .. } => {
                shared.deliver(std::mem::take(&mut batch));
                debug!(best = ?mv, "search finished");
                shared.finish_search(mv);
            }
            other => {
                shared.deliver(std::mem::take(&mut batch));
                let _ = control.send(other);
            }
        }
    }
    shared.deliver(batch);
    shared.alive.store(false, Ordering::SeqCst);
    shared.searching.send_replace(false);
    debug!("engine output closed");
}

/// Cheap handle for polling a session's search state without holding the
/// session itself.
#[derive(Clone)]
pub struct SearchProbe(Arc<Shared>);

impl SearchProbe {
    pub fn is_searching(&self) -> bool {
        self.0.is_searching()
    }

    pub fn is_alive(&self) -> bool {
        self.0.is_alive()
    }

    /// True while a search is being restarted by
    /// [`EngineSession::stop_set_option_go`].
    pub fn is_suspended(&self) -> bool {
        self.0.suspended.load(Ordering::SeqCst)
    }

    /// Makes the session unusable from any task, even while another task
    /// is in the middle of an exchange with it. Pending waits fail with
    /// [`ClientError::NotConnected`] and the process is killed by the
    /// session's next `disconnect` or `kill`.
    pub fn terminate(&self) {
        if !self.0.terminated.send_replace(true) {
            debug!("engine session terminated");
        }
    }

    /// Resolves once no search is running.
    pub async fn wait_idle(&self) {
        let mut rx = self.0.searching.subscribe();
        let _ = rx.wait_for(|searching| !*searching).await;
    }
}

/// A connected engine process.
///
/// Created by [`EngineSession::connect`], which performs the `uci`
/// handshake, applies options and completes an `isready` round trip. A
/// background task reads engine output for the whole life of the session.
pub struct EngineSession {
    engine: String,
    id_name: Option<String>,
    author: Option<String>,
    options: BTreeMap<String, OptionSpec>,
    writer: BoxWriter,
    child: Option<Child>,
    control: mpsc::UnboundedReceiver<EngineMessage>,
    shared: Arc<Shared>,
    reader: JoinHandle<()>,
    timeouts: SessionTimeouts,
    needs_ready: bool,
    last_go: Option<GoOptions>,
    last_listener: Option<Arc<dyn SearchListener>>,
    closed: bool,
}

impl EngineSession {
    /// Launches `engine` and brings it to the ready state.
    ///
    /// `lines` is applied through `MultiPV` when the engine declares it.
    /// Launcher defaults are applied before `options`; options the engine
    /// does not declare are skipped with a warning.
    pub async fn connect(
        launcher: &dyn EngineLauncher,
        engine: &str,
        lines: Option<u32>,
        options: &[(String, String)],
        timeouts: SessionTimeouts,
    ) -> Result<Self, ClientError> {
        let transport = launcher.launch(engine)?;
        let shared = Arc::new(Shared::new());
        let (control_tx, control) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_loop(transport.reader, shared.clone(), control_tx));

        let mut session = EngineSession {
            engine: engine.to_string(),
            id_name: None,
            author: None,
            options: BTreeMap::new(),
            writer: transport.writer,
            child: transport.child,
            control,
            shared,
            reader,
            timeouts,
            needs_ready: true,
            last_go: None,
            last_listener: None,
            closed: false,
        };

        let mut settings = launcher.default_options(engine);
        settings.extend(options.iter().cloned());
        if let Err(e) = session.initialise(lines, &settings).await {
            session.kill().await;
            return Err(match e {
                ClientError::ProtocolTimeout { .. } | ClientError::NotConnected => {
                    ClientError::ConnectionFailed(e.to_string())
                }
                other => other,
            });
        }

        info!(
            engine,
            name = session.name(),
            options = session.options.len(),
            "engine connected"
        );
        Ok(session)
    }

    async fn initialise(
        &mut self,
        lines: Option<u32>,
        settings: &[(String, String)],
    ) -> Result<(), ClientError> {
        self.handshake().await?;
        for (name, value) in settings {
            self.set_option(name, value).await?;
        }
        if let Some(lines) = lines {
            if self.has_option("MultiPV") {
                self.set_option("MultiPV", &lines.to_string()).await?;
            } else if lines > 1 {
                warn!(engine = %self.engine, lines, "engine has no MultiPV option");
            }
        }
        self.is_ready().await
    }

    async fn handshake(&mut self) -> Result<(), ClientError> {
        self.send(&EngineCommand::Uci).await?;
        let timeout = self.timeouts.handshake;
        let shared = self.shared.clone();
        let exchange = async {
            while let Some(message) = self.control.recv().await {
                match message {
                    EngineMessage::IdName(name) => self.id_name = Some(name),
                    EngineMessage::IdAuthor(author) => self.author = Some(author),
                    EngineMessage::Option(spec) => {
                        self.options.insert(spec.name.to_ascii_lowercase(), spec);
                    }
                    EngineMessage::UciOk => return Ok(()),
                    other => debug!("ignored during handshake: {other}"),
                }
            }
            Err(ClientError::NotConnected)
        };
        shared
            .unless_terminated(async {
                tokio::time::timeout(timeout, exchange)
                    .await
                    .unwrap_or(Err(ClientError::ProtocolTimeout {
                        command: "uci",
                        timeout,
                    }))
            })
            .await
    }

    async fn send(&mut self, command: &EngineCommand) -> Result<(), ClientError> {
        if self.closed || !self.shared.is_alive() {
            return Err(ClientError::NotConnected);
        }
        debug!(engine = %self.engine, "engine << {command}");
        let line = format!("{command}\n");
        let written = async {
            self.writer.write_all(line.as_bytes()).await?;
            self.writer.flush().await
        }
        .await;
        written.map_err(|e| {
            warn!(engine = %self.engine, "write to engine failed: {e}");
            self.shared.alive.store(false, Ordering::SeqCst);
            ClientError::NotConnected
        })
    }

    fn drain_control(&mut self) {
        while self.control.try_recv().is_ok() {}
    }

    /// Registry name the session was launched under.
    pub fn engine(&self) -> &str {
        &self.engine
    }

    /// Name from `id name`, or the registry name if the engine sent none.
    pub fn name(&self) -> &str {
        self.id_name.as_deref().unwrap_or(&self.engine)
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Declared options, keyed by lower-cased name.
    pub fn options(&self) -> &BTreeMap<String, OptionSpec> {
        &self.options
    }

    /// Option names are case-insensitive.
    pub fn option(&self, name: &str) -> Option<&OptionSpec> {
        self.options.get(&name.to_ascii_lowercase())
    }

    pub fn has_option(&self, name: &str) -> bool {
        self.option(name).is_some()
    }

    pub fn timeouts(&self) -> SessionTimeouts {
        self.timeouts
    }

    pub fn last_go(&self) -> Option<&GoOptions> {
        self.last_go.as_ref()
    }

    pub fn last_best_move(&self) -> Option<String> {
        self.shared.best_move()
    }

    pub fn is_searching(&self) -> bool {
        self.shared.is_searching()
    }

    pub fn is_suspended(&self) -> bool {
        self.shared.suspended.load(Ordering::SeqCst)
    }

    pub fn probe(&self) -> SearchProbe {
        SearchProbe(self.shared.clone())
    }

    /// False once the process has exited or the session was closed.
    pub fn is_alive(&mut self) -> bool {
        if self.closed || !self.shared.is_alive() {
            return false;
        }
        if let Some(child) = self.child.as_mut() {
            if !matches!(child.try_wait(), Ok(None)) {
                self.shared.alive.store(false, Ordering::SeqCst);
                return false;
            }
        }
        true
    }

    /// `isready` / `readyok` round trip.
    pub async fn is_ready(&mut self) -> Result<(), ClientError> {
        self.drain_control();
        self.send(&EngineCommand::IsReady).await?;
        let timeout = self.timeouts.ready;
        let control = &mut self.control;
        let exchange = async {
            while let Some(message) = control.recv().await {
                if message == EngineMessage::ReadyOk {
                    return Ok(());
                }
            }
            Err(ClientError::NotConnected)
        };
        self.shared
            .unless_terminated(async {
                tokio::time::timeout(timeout, exchange)
                    .await
                    .unwrap_or(Err(ClientError::ProtocolTimeout {
                        command: "isready",
                        timeout,
                    }))
            })
            .await?;
        self.needs_ready = false;
        Ok(())
    }

    /// Sends `setoption` if the engine declares `name`. Returns whether it
    /// was sent. The next search is preceded by a ready check.
    pub async fn set_option(&mut self, name: &str, value: &str) -> Result<bool, ClientError> {
        let Some(spec) = self.option(name) else {
            warn!(engine = %self.engine, option = name, "undeclared option skipped");
            return Ok(false);
        };
        if !spec.accepts(value) {
            warn!(engine = %self.engine, option = name, value, "value outside declared range");
        }
        let command = match spec.kind {
            OptionKind::Button => EngineCommand::SetOption {
                name: spec.name.clone(),
                value: None,
            },
            _ => EngineCommand::set_option(spec.name.clone(), value),
        };
        self.send(&command).await?;
        self.needs_ready = true;
        Ok(true)
    }

    pub async fn new_game(&mut self) -> Result<(), ClientError> {
        self.send(&EngineCommand::UciNewGame).await?;
        self.needs_ready = true;
        Ok(())
    }

    pub async fn set_position(&mut self, fen: &str, moves: &[String]) -> Result<(), ClientError> {
        self.send(&EngineCommand::position_fen(fen, moves.to_vec()))
            .await
    }

    /// Starts a search. Returns `false` without doing anything when one is
    /// already running.
    pub async fn go(
        &mut self,
        options: GoOptions,
        listener: Arc<dyn SearchListener>,
    ) -> Result<bool, ClientError> {
        self.start_search(options, listener, false).await
    }

    /// `resume` lifts the suspension once the new search counts as running,
    /// so probes never observe a gap between the two searches.
    async fn start_search(
        &mut self,
        options: GoOptions,
        listener: Arc<dyn SearchListener>,
        resume: bool,
    ) -> Result<bool, ClientError> {
        if self.is_searching() {
            warn!(engine = %self.engine, "go ignored, a search is already running");
            return Ok(false);
        }
        if self.needs_ready {
            self.is_ready().await?;
        }

        *self
            .shared
            .best_move
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.shared.set_listener(Some(listener.clone()));
        self.shared.searching.send_replace(true);
        if resume {
            self.shared.suspended.store(false, Ordering::SeqCst);
        }
        if let Err(e) = self.send(&EngineCommand::Go(options.clone())).await {
            self.shared.searching.send_replace(false);
            self.shared.set_listener(None);
            return Err(e);
        }

        info!(engine = %self.engine, go = %options, "search started");
        self.last_go = Some(options);
        self.last_listener = Some(listener);
        Ok(true)
    }

    /// Sends `stop` and waits for `bestmove`, at most the stop timeout.
    /// Returns the last best move, if any.
    pub async fn stop(&mut self) -> Result<Option<String>, ClientError> {
        if self.is_searching() {
            self.send(&EngineCommand::Stop).await?;
            let mut rx = self.shared.searching.subscribe();
            let finished = self
                .shared
                .unless_terminated(async {
                    Ok(tokio::time::timeout(self.timeouts.stop, rx.wait_for(|s| !*s))
                        .await
                        .is_ok())
                })
                .await?;
            if !finished {
                warn!(engine = %self.engine, timeout = ?self.timeouts.stop, "no bestmove after stop");
            }
        }
        Ok(self.last_best_move())
    }

    /// Changes an option in the middle of a search: the running search is
    /// stopped with its output suppressed, the option set, and the search
    /// restarted with the same go options and listener. Returns `true` only
    /// when the option was applied and the search runs again.
    pub async fn stop_set_option_go(&mut self, name: &str, value: &str) -> Result<bool, ClientError> {
        let (Some(go), Some(listener)) = (self.last_go.clone(), self.last_listener.clone()) else {
            warn!(engine = %self.engine, "no previous search to resume");
            return Ok(false);
        };

        self.shared.suspended.store(true, Ordering::SeqCst);
        let changed = async {
            self.stop().await?;
            self.is_ready().await?;
            let applied = self.set_option(name, value).await?;
            self.is_ready().await?;
            Ok::<bool, ClientError>(applied)
        }
        .await;
        let applied = match changed {
            Ok(applied) => applied,
            Err(e) => {
                self.shared.suspended.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        info!(engine = %self.engine, option = name, value, applied, "search restarted");
        let restarted = self.start_search(go, listener, true).await;
        self.shared.suspended.store(false, Ordering::SeqCst);
        Ok(restarted? && applied)
    }

    /// Static evaluation text for `fen`. Output is collected until the
    /// engine has been quiet for the eval timeout and returned unparsed.
    pub async fn eval(&mut self, fen: &str) -> Result<String, ClientError> {
        if self.is_searching() {
            return Err(ClientError::Busy);
        }
        self.drain_control();
        self.set_position(fen, &[]).await?;
        self.send(&EngineCommand::Eval).await?;

        let mut output = Vec::new();
        while let Ok(Some(message)) =
            tokio::time::timeout(self.timeouts.eval_quiet, self.control.recv()).await
        {
            output.push(message.to_string());
        }
        Ok(output.join("\n"))
    }

    /// `quit`, then waits for the process to exit and kills it if it does
    /// not. Safe to call more than once.
    pub async fn disconnect(&mut self) {
        if self.closed {
            return;
        }
        if self.shared.is_terminated() {
            return self.kill().await;
        }
        if self.shared.is_alive() {
            let _ = self.send(&EngineCommand::Quit).await;
        }
        let _ = self.writer.shutdown().await;
        let quit = self.timeouts.quit;
        let shared = self.shared.clone();
        if let Some(child) = self.child.as_mut() {
            let exited = shared
                .unless_terminated(async {
                    match tokio::time::timeout(quit, child.wait()).await {
                        Ok(Ok(status)) => Ok(status),
                        _ => Err(ClientError::NotConnected),
                    }
                })
                .await;
            match exited {
                Ok(status) => debug!(engine = %self.engine, %status, "engine exited"),
                Err(_) => {
                    warn!(engine = %self.engine, "engine did not quit, killing");
                    let _ = child.kill().await;
                }
            }
        }
        self.close();
    }

    /// Kills the process without ceremony. Safe to call more than once.
    pub async fn kill(&mut self) {
        if self.closed {
            return;
        }
        if let Some(child) = self.child.as_mut() {
            if let Err(e) = child.kill().await {
                warn!(engine = %self.engine, "kill failed: {e}");
            }
        }
        let _ = self.writer.shutdown().await;
        self.close();
    }

    fn close(&mut self) {
        self.closed = true;
        self.reader.abort();
        self.shared.alive.store(false, Ordering::SeqCst);
        self.shared.searching.send_replace(false);
        self.shared.set_listener(None);
        self.last_listener = None;
        info!(engine = %self.engine, "engine disconnected");
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
