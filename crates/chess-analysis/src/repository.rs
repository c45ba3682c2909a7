//! Storage ports and their in-memory implementations.

use crate::evaluation::Evaluation;
use crate::event::EngineInfoEvent;
use crate::task::{AnalysisTask, TaskId};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

pub trait TaskRepository: Send + Sync {
    /// Inserts or replaces by id.
    fn save(&self, task: &AnalysisTask);
    fn find_by_id(&self, id: TaskId) -> Option<AnalysisTask>;
    /// Most recently created task.
    fn find_latest(&self) -> Option<AnalysisTask>;
    fn exists(&self, id: TaskId) -> bool;
}

pub trait EvaluationRepository: Send + Sync {
    fn save(&self, evaluation: &Evaluation);
    fn find_by_id(&self, id: Uuid) -> Option<Evaluation>;
    /// Last evaluation saved for `task`.
    fn find_latest(&self, task: TaskId) -> Option<Evaluation>;
    /// Ids of every evaluation of `task`, oldest first.
    fn list_ids(&self, task: TaskId) -> Vec<Uuid>;
}

pub trait InfoRepository: Send + Sync {
    fn save(&self, event: &EngineInfoEvent);
    /// One event per line id: the deepest, and among equally deep ones the
    /// latest. Ordered by line id.
    fn find_grouped_by_line_max_depth(&self, task: TaskId) -> Vec<EngineInfoEvent>;
    /// Events of `line_id` whose move line starts with `prefix`, oldest first.
    fn find_by_prefix(&self, task: TaskId, line_id: u32, prefix: &[String]) -> Vec<EngineInfoEvent>;
}

#[derive(Debug, Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<Vec<AnalysisTask>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskRepository for InMemoryTaskRepository {
    fn save(&self, task: &AnalysisTask) {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        match tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task.clone(),
            None => tasks.push(task.clone()),
        }
    }

    fn find_by_id(&self, id: TaskId) -> Option<AnalysisTask> {
        let tasks = self.tasks.read().unwrap_or_else(PoisonError::into_inner);
        tasks.iter().find(|t| t.id == id).cloned()
    }

    fn find_latest(&self) -> Option<AnalysisTask> {
        let tasks = self.tasks.read().unwrap_or_else(PoisonError::into_inner);
        // Later insertion wins ties on the timestamp.
        tasks
            .iter()
            .enumerate()
            .max_by_key(|(i, t)| (t.created_at, *i))
            .map(|(_, t)| t.clone())
    }

    fn exists(&self, id: TaskId) -> bool {
        let tasks = self.tasks.read().unwrap_or_else(PoisonError::into_inner);
        tasks.iter().any(|t| t.id == id)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryEvaluationRepository {
    evaluations: RwLock<Vec<Evaluation>>,
}

impl InMemoryEvaluationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EvaluationRepository for InMemoryEvaluationRepository {
    fn save(&self, evaluation: &Evaluation) {
        let mut all = self.evaluations.write().unwrap_or_else(PoisonError::into_inner);
        match all.iter_mut().find(|e| e.id == evaluation.id) {
            Some(existing) => *existing = evaluation.clone(),
            None => all.push(evaluation.clone()),
        }
    }

    fn find_by_id(&self, id: Uuid) -> Option<Evaluation> {
        let all = self.evaluations.read().unwrap_or_else(PoisonError::into_inner);
        all.iter().find(|e| e.id == id).cloned()
    }

    fn find_latest(&self, task: TaskId) -> Option<Evaluation> {
        let all = self.evaluations.read().unwrap_or_else(PoisonError::into_inner);
        all.iter().rev().find(|e| e.task_id == task).cloned()
    }

    fn list_ids(&self, task: TaskId) -> Vec<Uuid> {
        let all = self.evaluations.read().unwrap_or_else(PoisonError::into_inner);
        all.iter().filter(|e| e.task_id == task).map(|e| e.id).collect()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryInfoRepository {
    events: RwLock<HashMap<TaskId, Vec<EngineInfoEvent>>>,
}

impl InMemoryInfoRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InfoRepository for InMemoryInfoRepository {
    fn save(&self, event: &EngineInfoEvent) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event.task_id)
            .or_default()
            .push(event.clone());
    }

    fn find_grouped_by_line_max_depth(&self, task: TaskId) -> Vec<EngineInfoEvent> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        let mut best: BTreeMap<u32, &EngineInfoEvent> = BTreeMap::new();
        for event in events.get(&task).into_iter().flatten() {
            let keep = match best.get(&event.line_id) {
                Some(current) => {
                    (event.depth, event.sequence) > (current.depth, current.sequence)
                }
                None => true,
            };
            if keep {
                best.insert(event.line_id, event);
            }
        }
        best.into_values().cloned().collect()
    }

    fn find_by_prefix(&self, task: TaskId, line_id: u32, prefix: &[String]) -> Vec<EngineInfoEvent> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        events
            .get(&task)
            .into_iter()
            .flatten()
            .filter(|e| e.line_id == line_id && e.uci_line.starts_with(prefix))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uci::Score;

    fn event(task: TaskId, line_id: u32, depth: u32, sequence: u64, pv: &[&str]) -> EngineInfoEvent {
        EngineInfoEvent {
            task_id: task,
            line_id,
            depth,
            seldepth: None,
            score: Score::Cp(0),
            display_score: "+0.00".into(),
            uci_line: pv.iter().map(|m| m.to_string()).collect(),
            san_line: String::new(),
            fen: String::new(),
            pgn: String::new(),
            time_ms: None,
            nodes: None,
            nps: None,
            tbhits: None,
            sequence,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn groups_by_deepest_then_latest() {
        let repo = InMemoryInfoRepository::new();
        let task = TaskId::new();
        repo.save(&event(task, 1, 5, 1, &["e2e4"]));
        repo.save(&event(task, 2, 5, 2, &["d2d4"]));
        repo.save(&event(task, 1, 6, 3, &["e2e4", "e7e5"]));
        repo.save(&event(task, 1, 6, 4, &["g1f3"]));
        repo.save(&event(task, 2, 4, 5, &["c2c4"]));
        repo.save(&event(TaskId::new(), 3, 9, 6, &["a2a3"]));

        let grouped = repo.find_grouped_by_line_max_depth(task);
        assert_eq!(grouped.len(), 2);
        assert_eq!((grouped[0].line_id, grouped[0].depth, grouped[0].sequence), (1, 6, 4));
        assert_eq!((grouped[1].line_id, grouped[1].depth, grouped[1].sequence), (2, 5, 2));
    }

    #[test]
    fn prefix_lookup_is_per_line() {
        let repo = InMemoryInfoRepository::new();
        let task = TaskId::new();
        repo.save(&event(task, 1, 8, 1, &["e2e4", "e7e5", "g1f3"]));
        repo.save(&event(task, 2, 8, 2, &["e2e4", "c7c5", "g1f3"]));
        repo.save(&event(task, 1, 8, 3, &["d2d4"]));

        let prefix = vec!["e2e4".to_string()];
        let found = repo.find_by_prefix(task, 1, &prefix);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].sequence, 1);
        assert!(repo.find_by_prefix(task, 3, &prefix).is_empty());
    }

    #[test]
    fn tasks_replace_and_order_by_creation() {
        let repo = InMemoryTaskRepository::new();
        let mut old = AnalysisTask::new("sf");
        old.created_at = Utc::now() - Duration::seconds(10);
        let new = AnalysisTask::new("sf");
        repo.save(&new);
        repo.save(&old);
        assert_eq!(repo.find_latest().map(|t| t.id), Some(new.id));

        repo.save(&new.with_engine_display_name("Fake"));
        assert_eq!(
            repo.find_by_id(new.id).and_then(|t| t.engine_display_name),
            Some("Fake".to_string())
        );
        assert!(repo.exists(old.id));
        assert!(!repo.exists(TaskId::new()));
    }

    #[test]
    fn evaluations_by_task() {
        use crate::evaluation::{Evaluation, SearchSnapshot};
        let repo = InMemoryEvaluationRepository::new();
        let task = TaskId::new();
        let first =
            Evaluation::publishable(task, &[event(task, 1, 3, 1, &["e2e4"])], &SearchSnapshot::default())
                .unwrap();
        let second =
            Evaluation::publishable(task, &[event(task, 1, 4, 2, &["e2e4"])], &SearchSnapshot::default())
                .unwrap();
        repo.save(&first);
        repo.save(&second);
        assert_eq!(repo.list_ids(task), vec![first.id, second.id]);
        assert_eq!(repo.find_latest(task).map(|e| e.depth), Some(4));
        assert_eq!(repo.find_by_id(first.id).map(|e| e.depth), Some(3));
        assert!(repo.find_latest(TaskId::new()).is_none());
    }
}
