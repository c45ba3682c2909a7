use crate::event::EngineInfoEvent;
use crate::task::TaskId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uci::Score;
use uuid::Uuid;

/// One ranked line of play.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variation {
    pub line_id: u32,
    /// Numbered SAN, e.g. `1. e4 e5 2. Nf3`.
    pub san_line: String,
    pub uci_line: Vec<String>,
    /// White's point of view.
    pub score: Score,
    pub display_score: String,
    pub depth: u32,
    pub time_ms: Option<u64>,
    /// Position at the end of the line.
    pub fen: String,
    pub pgn: String,
}

impl From<&EngineInfoEvent> for Variation {
    fn from(event: &EngineInfoEvent) -> Self {
        Variation {
            line_id: event.line_id,
            san_line: event.san_line.clone(),
            uci_line: event.uci_line.clone(),
            score: event.score,
            display_score: event.display_score.clone(),
            depth: event.depth,
            time_ms: event.time_ms,
            fen: event.fen.clone(),
            pgn: event.pgn.clone(),
        }
    }
}

/// Search counters as of the latest info line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchSnapshot {
    pub depth: u32,
    pub time_ms: u64,
    pub nodes: u64,
    pub nps: u64,
    pub tbhits: u64,
}

impl SearchSnapshot {
    pub fn update(&mut self, info: &uci::EngineInfo) {
        if let Some(depth) = info.depth {
            self.depth = self.depth.max(depth);
        }
        if let Some(time) = info.time {
            self.time_ms = time;
        }
        if let Some(nodes) = info.nodes {
            self.nodes = nodes;
        }
        if let Some(nps) = info.nps {
            self.nps = nps;
        }
        if let Some(tbhits) = info.tbhits {
            self.tbhits = tbhits;
        }
    }
}

/// Every live line at one common depth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub id: Uuid,
    pub task_id: TaskId,
    /// Ordered by line id.
    pub variations: Vec<Variation>,
    pub depth: u32,
    pub time_ms: u64,
    pub nodes: u64,
    pub nps: u64,
    pub tbhits: u64,
    pub created_at: DateTime<Utc>,
    /// Set on the evaluation stored when the task completes.
    pub is_final: bool,
}

impl Evaluation {
    /// Builds an evaluation from one event per line. Returns `None` unless
    /// there is at least one line and all lines share a depth.
    pub fn publishable(
        task_id: TaskId,
        events: &[EngineInfoEvent],
        snapshot: &SearchSnapshot,
    ) -> Option<Evaluation> {
        let depth = events.first()?.depth;
        if events.iter().any(|e| e.depth != depth) {
            return None;
        }
        let mut variations: Vec<Variation> = events.iter().map(Variation::from).collect();
        variations.sort_by_key(|v| v.line_id);
        Some(Evaluation {
            id: Uuid::new_v4(),
            task_id,
            variations,
            depth,
            time_ms: snapshot.time_ms,
            nodes: snapshot.nodes,
            nps: snapshot.nps,
            tbhits: snapshot.tbhits,
            created_at: Utc::now(),
            is_final: false,
        })
    }

    pub fn best(&self) -> Option<&Variation> {
        self.variations.first()
    }
}
