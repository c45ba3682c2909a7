use crate::evaluation::Evaluation;
use crate::task::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uci::Score;

/// An info line after replay on the task's root position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineInfoEvent {
    pub task_id: TaskId,
    pub line_id: u32,
    pub depth: u32,
    pub seldepth: Option<u32>,
    /// White's point of view.
    pub score: Score,
    pub display_score: String,
    pub uci_line: Vec<String>,
    pub san_line: String,
    pub fen: String,
    pub pgn: String,
    pub time_ms: Option<u64>,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
    pub tbhits: Option<u64>,
    /// Arrival order within the task.
    pub sequence: u64,
    pub received_at: DateTime<Utc>,
}

/// What subscribers of the service see.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisEvent {
    InformationReceived(EngineInfoEvent),
    EvaluationPublished(Evaluation),
    DepthReached { task_id: TaskId, depth: u32 },
    LinesShrunk { task_id: TaskId, lines: u32 },
    Completed {
        task_id: TaskId,
        evaluation: Option<Evaluation>,
    },
}

impl AnalysisEvent {
    pub fn task_id(&self) -> TaskId {
        match self {
            AnalysisEvent::InformationReceived(e) => e.task_id,
            AnalysisEvent::EvaluationPublished(e) => e.task_id,
            AnalysisEvent::DepthReached { task_id, .. }
            | AnalysisEvent::LinesShrunk { task_id, .. }
            | AnalysisEvent::Completed { task_id, .. } => *task_id,
        }
    }
}
