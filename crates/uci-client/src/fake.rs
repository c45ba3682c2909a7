//! A scripted engine that runs in-process over a duplex pipe.
//!
//! It answers the handshake with a configurable option list, records every
//! command it receives and produces search output from a closure. Depth and
//! node limited searches finish at once, `movetime` searches finish when the
//! time runs out, infinite searches on `stop`.

use crate::{ClientError, EngineLauncher, EngineTransport};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::time::Instant;
use uci::{EngineCommand, EngineInfo, GoOptions};

type SearchScript = dyn Fn(&FakeState) -> Vec<String> + Send + Sync;

/// What the fake engine has been told so far.
#[derive(Debug, Clone, Default)]
pub struct FakeState {
    pub options: HashMap<String, String>,
    /// FEN from the last `position fen`, `None` for `startpos`.
    pub fen: Option<String>,
    pub moves: Vec<String>,
    pub go: GoOptions,
    /// Number of `go` commands received.
    pub searches: u32,
}

impl FakeState {
    pub fn multipv(&self) -> u32 {
        self.options
            .get("MultiPV")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1)
    }
}

#[derive(Clone)]
pub struct FakeEngine {
    name: String,
    id_name: String,
    options: Vec<String>,
    search: Arc<SearchScript>,
    eval_output: Vec<String>,
    answer_uci: bool,
    answer_isready: bool,
    answer_stop: bool,
    log: Arc<Mutex<Vec<String>>>,
    launches: Arc<AtomicUsize>,
}

impl FakeEngine {
    /// Registered as `name`, declaring `MultiPV`, `Hash`, `Threads` and
    /// `Clear Hash`, and answering every search with one depth-1 line.
    pub fn new(name: impl Into<String>) -> Self {
        FakeEngine {
            name: name.into(),
            id_name: "Fake Engine 1.0".to_string(),
            options: vec![
                "option name Hash type spin default 16 min 1 max 1024".to_string(),
                "option name Threads type spin default 1 min 1 max 64".to_string(),
                "option name MultiPV type spin default 1 min 1 max 256".to_string(),
                "option name Clear Hash type button".to_string(),
            ],
            search: Arc::new(|_| vec!["info depth 1 multipv 1 score cp 0 pv e2e4".to_string()]),
            eval_output: vec!["Final evaluation       +0.08 (white side)".to_string()],
            answer_uci: true,
            answer_isready: true,
            answer_stop: true,
            log: Arc::new(Mutex::new(Vec::new())),
            launches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_id_name(mut self, id_name: impl Into<String>) -> Self {
        self.id_name = id_name.into();
        self
    }

    /// Replaces the declared `option` lines.
    pub fn with_options(mut self, lines: &[&str]) -> Self {
        self.options = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    /// Lines written in answer to each `go`.
    pub fn with_search<F>(mut self, script: F) -> Self
    where
        F: Fn(&FakeState) -> Vec<String> + Send + Sync + 'static,
    {
        self.search = Arc::new(script);
        self
    }

    pub fn with_eval(mut self, lines: &[&str]) -> Self {
        self.eval_output = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    /// Never answers `uci`.
    pub fn silent_handshake(mut self) -> Self {
        self.answer_uci = false;
        self
    }

    /// Never answers `isready`.
    pub fn silent_ready(mut self) -> Self {
        self.answer_isready = false;
        self
    }

    /// Keeps searching after `stop`, like a hung engine.
    pub fn ignore_stop(mut self) -> Self {
        self.answer_stop = false;
        self
    }

    /// Every command received, across all launches.
    pub fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    async fn run(self, io: DuplexStream) {
        let (read, mut write) = tokio::io::split(io);
        let mut lines = BufReader::new(read).lines();
        let mut state = FakeState::default();
        let mut pending: Option<String> = None;
        let mut deadline: Option<Instant> = None;

        loop {
            let line = tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => line,
                    _ => return,
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    if let Some(best) = pending.take() {
                        if write.write_all(format!("bestmove {best}\n").as_bytes()).await.is_err() {
                            return;
                        }
                    }
                    continue;
                }
            };
            self.log
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(line.clone());

            let mut out: Vec<String> = Vec::new();
            match EngineCommand::parse(&line) {
                Ok(EngineCommand::Uci) if self.answer_uci => {
                    out.push(format!("id name {}", self.id_name));
                    out.push("id author Test Suite".to_string());
                    out.extend(self.options.iter().cloned());
                    out.push("uciok".to_string());
                }
                Ok(EngineCommand::IsReady) if self.answer_isready => out.push("readyok".to_string()),
                Ok(EngineCommand::SetOption { name, value }) => {
                    state.options.insert(name, value.unwrap_or_default());
                }
                Ok(EngineCommand::Position { fen, moves }) => {
                    state.fen = fen;
                    state.moves = moves;
                }
                Ok(EngineCommand::Go(go)) => {
                    state.go = go.clone();
                    state.searches += 1;
                    let output = (self.search)(&state);
                    let best = best_move(&output);
                    out.extend(output);
                    match go.movetime {
                        Some(ms) if go.depth.is_none() => {
                            pending = Some(best);
                            deadline = Some(Instant::now() + Duration::from_millis(ms));
                        }
                        _ if go.is_infinite() => pending = Some(best),
                        _ => out.push(format!("bestmove {best}")),
                    }
                }
                Ok(EngineCommand::Stop) if self.answer_stop => {
                    deadline = None;
                    if let Some(best) = pending.take() {
                        out.push(format!("bestmove {best}"));
                    }
                }
                Ok(EngineCommand::Eval) => out.extend(self.eval_output.iter().cloned()),
                Ok(EngineCommand::Quit) => return,
                _ => {}
            }

            if out.is_empty() {
                continue;
            }
            let mut text = out.join("\n");
            text.push('\n');
            if write.write_all(text.as_bytes()).await.is_err() || write.flush().await.is_err() {
                return;
            }
        }
    }
}

/// First move of line 1 in the last info that has one.
fn best_move(output: &[String]) -> String {
    output
        .iter()
        .rev()
        .filter_map(|line| EngineInfo::parse(line))
        .find(|info| info.line_id() == 1 && !info.pv.is_empty())
        .map(|info| info.pv[0].clone())
        .unwrap_or_else(|| "(none)".to_string())
}

impl EngineLauncher for FakeEngine {
    fn launch(&self, name: &str) -> Result<EngineTransport, ClientError> {
        if name != self.name {
            return Err(ClientError::EngineNotFound(name.to_string()));
        }
        self.launches.fetch_add(1, Ordering::SeqCst);
        let (client, engine) = tokio::io::duplex(64 * 1024);
        tokio::spawn(self.clone().run(engine));
        let (read, write) = tokio::io::split(client);
        Ok(EngineTransport::from_streams(read, write))
    }
}
