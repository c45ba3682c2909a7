//! Engine-backed analysis of chess positions.
//!
//! An [`AnalysisTask`] names a position (FEN and/or PGN), an engine and a
//! search budget. [`AnalysisService`] runs tasks one at a time on a single
//! engine slot:
//!
//! - the [`Orchestrator`] holds the slot, drives the engine session and
//!   finishes the task once the search is over;
//! - the [`Aggregator`] replays every reported line on the board, stores the
//!   result and publishes an [`Evaluation`] whenever all lines agree on a
//!   depth, narrowing the search when a [`DynamicPvPolicy`] asks for it.
//!
//! Progress is published as [`AnalysisEvent`]s on a broadcast channel.
//! Storage goes through the traits in [`repository`]; in-memory
//! implementations are provided.
//!
//! # Example
//!
//! ```ignore
//! use chess_analysis::{AnalysisService, AnalysisTask, ServiceConfig};
//! use std::sync::Arc;
//!
//! let config = ServiceConfig::load("analysis.toml")?;
//! let service = AnalysisService::new(Arc::new(config.registry()), &config);
//! let task = AnalysisTask::new("stockfish").with_depth(20).with_lines(3);
//! service.start_sync(task).await?;
//! ```

pub mod aggregator;
pub mod config;
mod error;
pub mod evaluation;
pub mod event;
pub mod orchestrator;
pub mod repository;
pub mod score;
mod service;
pub mod task;

pub use aggregator::{Aggregator, BatchOutcome};
pub use config::{ConfigError, EngineConfig, ServiceConfig, TimeoutConfig};
pub use error::AnalysisError;
pub use evaluation::{Evaluation, SearchSnapshot, Variation};
pub use event::{AnalysisEvent, EngineInfoEvent};
pub use orchestrator::{Orchestrator, TaskMessage};
pub use service::AnalysisService;
pub use task::{AnalysisTask, DynamicPvPolicy, JobStatus, TaskDetails, TaskId};
