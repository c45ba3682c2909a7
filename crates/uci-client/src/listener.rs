use tokio::sync::mpsc;
use uci::EngineInfo;

/// Receives search output from the background reader.
///
/// Callbacks run on the reader task and must not block.
pub trait SearchListener: Send + Sync {
    /// Info lines that arrived together, in engine order.
    fn on_info(&self, batch: Vec<EngineInfo>);

    /// The search finished. Not called for searches interrupted by
    /// [`crate::EngineSession::stop_set_option_go`].
    fn on_best_move(&self, _best: Option<&str>) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    Info(Vec<EngineInfo>),
    BestMove(Option<String>),
}

impl SearchListener for mpsc::UnboundedSender<SearchEvent> {
    fn on_info(&self, batch: Vec<EngineInfo>) {
        let _ = self.send(SearchEvent::Info(batch));
    }

    fn on_best_move(&self, best: Option<&str>) {
        let _ = self.send(SearchEvent::BestMove(best.map(str::to_string)));
    }
}
