//! Turns raw engine output into board-checked events and depth-converged
//! evaluations.
//!
//! Each pv is replayed on a clone of the task's root position, so only legal
//! moves make it into a line and every line comes with SAN, FEN and PGN.
//! Scores are converted to White's point of view. An evaluation is published
//! only when every live line has been reported at the same depth; the first
//! time a depth is reached the task's line policy may narrow the search.

use crate::evaluation::{Evaluation, SearchSnapshot};
use crate::event::{AnalysisEvent, EngineInfoEvent};
use crate::repository::{EvaluationRepository, InfoRepository};
use crate::score;
use crate::task::{AnalysisTask, TaskId};
use chess_core::Color;
use chess_engine::pgn::format_move_line;
use chess_engine::Position;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use uci::EngineInfo;

/// Lines shorter than this are often cut off by the engine at a hash hit.
const SHORT_LINE_PLIES: usize = 3;

/// Result of processing one info batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub events: Vec<AnalysisEvent>,
    /// New line count the running search should be narrowed to.
    pub shrink_to: Option<u32>,
}

pub struct Aggregator {
    task: AnalysisTask,
    root: Position,
    infos: Arc<dyn InfoRepository>,
    evaluations: Arc<dyn EvaluationRepository>,
    snapshot: SearchSnapshot,
    live_lines: u32,
    sequence: u64,
    last_depth: Option<u32>,
    last_published: Option<Evaluation>,
}

impl Aggregator {
    pub fn new(
        task: AnalysisTask,
        mut root: Position,
        infos: Arc<dyn InfoRepository>,
        evaluations: Arc<dyn EvaluationRepository>,
    ) -> Self {
        // Warms the SAN cache of the game moves; clones inherit it.
        root.history_sans();
        let live_lines = task.lines.max(1);
        Aggregator {
            task,
            root,
            infos,
            evaluations,
            snapshot: SearchSnapshot::default(),
            live_lines,
            sequence: 0,
            last_depth: None,
            last_published: None,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task.id
    }

    pub fn live_lines(&self) -> u32 {
        self.live_lines
    }

    pub fn snapshot(&self) -> &SearchSnapshot {
        &self.snapshot
    }

    pub fn last_published(&self) -> Option<&Evaluation> {
        self.last_published.as_ref()
    }

    pub fn on_batch(&mut self, batch: &[EngineInfo]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for info in batch {
            self.snapshot.update(info);
            if let Some(event) = self.replay(info) {
                self.infos.save(&event);
                outcome.events.push(AnalysisEvent::InformationReceived(event));
            }
        }
        if outcome.events.is_empty() {
            return outcome;
        }

        let Some(evaluation) = self.current_evaluation() else {
            return outcome;
        };
        if self.last_depth != Some(evaluation.depth) {
            self.last_depth = Some(evaluation.depth);
            debug!(task = %self.task.id, depth = evaluation.depth, "depth reached");
            outcome.events.push(AnalysisEvent::DepthReached {
                task_id: self.task.id,
                depth: evaluation.depth,
            });
            outcome.shrink_to = self.narrowed_lines(&evaluation);
            self.evaluations.save(&evaluation);
        }
        self.last_published = Some(evaluation.clone());
        outcome.events.push(AnalysisEvent::EvaluationPublished(evaluation));
        outcome
    }

    /// Applies a narrowing the engine has accepted: lines above `lines` are
    /// dropped from now on and the current evaluation is republished
    /// without them.
    pub fn confirm_shrink(&mut self, lines: u32) -> Vec<AnalysisEvent> {
        if lines == 0 || lines >= self.live_lines {
            return Vec::new();
        }
        info!(task = %self.task.id, from = self.live_lines, to = lines, "search narrowed");
        self.live_lines = lines;
        let mut events = vec![AnalysisEvent::LinesShrunk {
            task_id: self.task.id,
            lines,
        }];
        if let Some(evaluation) = self.last_published.as_mut() {
            evaluation.variations.retain(|v| v.line_id <= lines);
            self.evaluations.save(evaluation);
            events.push(AnalysisEvent::EvaluationPublished(evaluation.clone()));
        }
        events
    }

    /// Stores the last published evaluation as final and returns it.
    pub fn finish(&mut self) -> Option<Evaluation> {
        let mut last = self.last_published.take()?;
        last.is_final = true;
        self.evaluations.save(&last);
        info!(task = %self.task.id, depth = last.depth, "final evaluation stored");
        Some(last)
    }

    fn replay(&mut self, info: &EngineInfo) -> Option<EngineInfoEvent> {
        let score = info.score?;
        if info.pv.is_empty() || info.bound.is_some() {
            return None;
        }
        let line_id = info.line_id();
        if line_id > self.live_lines {
            return None;
        }

        let mut line = self.play(&info.pv);
        if line.uci.is_empty() {
            debug!(task = %self.task.id, pv = ?info.pv, "pv does not start with a legal move");
            return None;
        }
        if line.uci.len() < SHORT_LINE_PLIES {
            if let Some(longer) = self.stored_continuation(line_id, &line.uci) {
                line = self.play(&longer);
            }
        }

        let score = score::white_relative(score, self.root.side_to_move());
        self.sequence += 1;
        Some(EngineInfoEvent {
            task_id: self.task.id,
            line_id,
            depth: info.depth.unwrap_or(0),
            seldepth: info.seldepth,
            score,
            display_score: score::display(score),
            san_line: format_move_line(self.root.ply(), &line.san),
            uci_line: line.uci,
            fen: line.position.to_fen(),
            pgn: line.position.to_pgn(),
            time_ms: info.time,
            nodes: info.nodes,
            nps: info.nps,
            tbhits: info.tbhits,
            sequence: self.sequence,
            received_at: Utc::now(),
        })
    }

    /// Plays the legal prefix of `pv` on a copy of the root.
    fn play(&self, pv: &[String]) -> PlayedLine {
        let mut position = self.root.clone();
        let mut uci = Vec::with_capacity(pv.len());
        let mut san = Vec::with_capacity(pv.len());
        for text in pv {
            let legal = position
                .generate_legal_moves()
                .into_iter()
                .find(|m| m.to_uci() == *text);
            let Some(m) = legal else {
                debug!(task = %self.task.id, mv = %text, "illegal move in pv, line cut");
                break;
            };
            san.push(position.san_of(&m));
            position.force_move(m);
            uci.push(text.clone());
        }
        PlayedLine { position, uci, san }
    }

    /// Latest stored line of at least three plies extending `prefix`.
    fn stored_continuation(&self, line_id: u32, prefix: &[String]) -> Option<Vec<String>> {
        self.infos
            .find_by_prefix(self.task.id, line_id, prefix)
            .into_iter()
            .filter(|e| e.uci_line.len() >= SHORT_LINE_PLIES)
            .max_by_key(|e| e.sequence)
            .map(|e| e.uci_line)
    }

    fn current_evaluation(&self) -> Option<Evaluation> {
        let live: Vec<EngineInfoEvent> = self
            .infos
            .find_grouped_by_line_max_depth(self.task.id)
            .into_iter()
            .filter(|e| e.line_id <= self.live_lines)
            .collect();
        Evaluation::publishable(self.task.id, &live, &self.snapshot)
    }

    fn narrowed_lines(&self, evaluation: &Evaluation) -> Option<u32> {
        let policy = self.task.dynamic_pv?;
        if self.live_lines <= policy.min_lines || evaluation.depth < policy.required_depth {
            return None;
        }
        let scores: Vec<i32> = evaluation
            .variations
            .iter()
            .map(|v| score::to_centipawns(v.score))
            .collect();
        let competitive = match self.root.side_to_move() {
            Color::White => {
                let best = scores.iter().copied().max()?;
                scores.iter().filter(|&&s| s >= best - policy.cutoff_cp).count()
            }
            Color::Black => {
                let best = scores.iter().copied().min()?;
                scores.iter().filter(|&&s| s <= best + policy.cutoff_cp).count()
            }
        };
        let target = (competitive as u32).max(policy.min_lines);
        (target < self.live_lines).then_some(target)
    }
}

struct PlayedLine {
    position: Position,
    uci: Vec<String>,
    san: Vec<String>,
}
