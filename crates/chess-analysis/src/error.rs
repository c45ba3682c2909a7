use crate::config::ConfigError;
use crate::task::TaskId;
use chess_engine::{PgnError, PositionError};
use thiserror::Error;
use uci_client::ClientError;

/// Errors surfaced by the analysis service.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The requested engine is not known to the launcher.
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Starting the search failed after the slot was taken. The slot has
    /// already been released; the task may be retried.
    #[error("analysis could not be started: {0}")]
    TransientTaskFailure(#[source] ClientError),

    #[error("the engine slot is not held")]
    NotLocked,

    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("invalid task: {0}")]
    InvalidTask(String),

    #[error("invalid position: {0}")]
    Position(#[from] PositionError),

    #[error("invalid game: {0}")]
    Pgn(#[from] PgnError),

    #[error(transparent)]
    Client(ClientError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AnalysisError {
    /// Whether a queue consumer should put the task back.
    pub fn is_transient(&self) -> bool {
        matches!(self, AnalysisError::TransientTaskFailure(_))
    }

    /// Validation problems with the task itself, never worth retrying.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AnalysisError::InvalidTask(_) | AnalysisError::Position(_) | AnalysisError::Pgn(_)
        )
    }
}

impl From<ClientError> for AnalysisError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::EngineNotFound(name) => AnalysisError::EngineUnavailable(name),
            other => AnalysisError::Client(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_engine_becomes_unavailable() {
        let e: AnalysisError = ClientError::EngineNotFound("crafty".into()).into();
        assert!(matches!(e, AnalysisError::EngineUnavailable(ref n) if n == "crafty"));
        assert!(!e.is_transient());
    }

    #[test]
    fn classification() {
        assert!(AnalysisError::TransientTaskFailure(ClientError::Busy).is_transient());
        assert!(AnalysisError::InvalidTask("no lines".into()).is_validation());
        assert!(!AnalysisError::NotLocked.is_validation());
    }
}
