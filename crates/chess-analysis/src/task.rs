//! Analysis requests.

use crate::evaluation::Evaluation;
use crate::AnalysisError;
use chess_engine::{Game, Position};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uci::GoOptions;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        TaskId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TaskId {
    fn from(id: Uuid) -> Self {
        TaskId(id)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Narrows the number of reported lines once the search is deep enough and
/// only a few moves remain competitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicPvPolicy {
    /// Depth from which narrowing is considered.
    pub required_depth: u32,
    /// Never shrink below this many lines.
    pub min_lines: u32,
    /// Lines scoring within this many centipawns of the best stay live.
    pub cutoff_cp: i32,
}

/// One request for analysis of a position.
///
/// The root position comes from `pgn` when present (replayed from `fen` if
/// the game carries no `FEN` header), otherwise from `fen`, otherwise the
/// standard start. Without a depth or movetime budget the search runs until
/// stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisTask {
    pub id: TaskId,
    pub fen: Option<String>,
    pub pgn: Option<String>,
    pub engine: String,
    pub depth: Option<u32>,
    pub movetime_ms: Option<u64>,
    pub lines: u32,
    /// Engine option overrides, applied after the configured defaults.
    pub options: Vec<(String, String)>,
    pub created_at: DateTime<Utc>,
    pub dynamic_pv: Option<DynamicPvPolicy>,
    /// The engine's `id name`, filled in once the search has started.
    pub engine_display_name: Option<String>,
}

impl AnalysisTask {
    pub fn new(engine: impl Into<String>) -> Self {
        AnalysisTask {
            id: TaskId::new(),
            fen: None,
            pgn: None,
            engine: engine.into(),
            depth: None,
            movetime_ms: None,
            lines: 1,
            options: Vec::new(),
            created_at: Utc::now(),
            dynamic_pv: None,
            engine_display_name: None,
        }
    }

    pub fn with_fen(mut self, fen: impl Into<String>) -> Self {
        self.fen = Some(fen.into());
        self
    }

    pub fn with_pgn(mut self, pgn: impl Into<String>) -> Self {
        self.pgn = Some(pgn.into());
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_movetime(mut self, ms: u64) -> Self {
        self.movetime_ms = Some(ms);
        self
    }

    pub fn with_lines(mut self, lines: u32) -> Self {
        self.lines = lines;
        self
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((name.into(), value.into()));
        self
    }

    pub fn with_dynamic_pv(mut self, policy: DynamicPvPolicy) -> Self {
        self.dynamic_pv = Some(policy);
        self
    }

    /// Copy of this task carrying the engine's reported name.
    pub fn with_engine_display_name(&self, name: impl Into<String>) -> Self {
        AnalysisTask {
            engine_display_name: Some(name.into()),
            ..self.clone()
        }
    }

    /// Checks everything that can be checked without an engine and returns
    /// the root position.
    pub fn validate(&self) -> Result<Position, AnalysisError> {
        if self.engine.trim().is_empty() {
            return Err(AnalysisError::InvalidTask("no engine given".into()));
        }
        if self.lines == 0 {
            return Err(AnalysisError::InvalidTask("at least one line is required".into()));
        }
        if self.depth == Some(0) || self.movetime_ms == Some(0) {
            return Err(AnalysisError::InvalidTask("search budget must be positive".into()));
        }
        if let Some(policy) = &self.dynamic_pv {
            if policy.min_lines == 0 || policy.cutoff_cp < 0 {
                return Err(AnalysisError::InvalidTask(format!(
                    "bad line policy: {policy:?}"
                )));
            }
        }
        self.root_position()
    }

    pub fn root_position(&self) -> Result<Position, AnalysisError> {
        match (&self.pgn, &self.fen) {
            (Some(pgn), fen) => Ok(Game::from_pgn_with_setup(pgn, fen.as_deref())?.into_position()),
            (None, Some(fen)) => Ok(Position::from_fen(fen)?),
            (None, None) => Ok(Position::startpos()),
        }
    }

    pub fn go_options(&self) -> GoOptions {
        GoOptions {
            depth: self.depth,
            movetime: self.movetime_ms,
            ..GoOptions::default()
        }
    }
}

/// The `position fen … moves …` arguments that reproduce `root`, history
/// included so the engine sees repetitions.
pub fn engine_position(root: &Position) -> (String, Vec<String>) {
    let moves = root.history().iter().map(|m| m.to_uci()).collect();
    (root.start_fen().to_string(), moves)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Active,
    NotActive,
}

/// What is known about a task right now.
#[derive(Debug, Clone, Serialize)]
pub struct TaskDetails {
    pub task: AnalysisTask,
    pub status: JobStatus,
    pub remaining_ms: u64,
    pub evaluation: Option<Evaluation>,
}
