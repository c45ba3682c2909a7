//! Async client for UCI engines running as subprocesses.
//!
//! An [`EngineSession`] owns one engine process. It performs the `uci`
//! handshake, records the engine's option schema, applies options and keeps
//! a background task decoding engine output. Search output is handed to a
//! [`SearchListener`] in batches; everything else answers the session's own
//! requests (`isready`, `eval`).
//!
//! Engines are started by name through an [`EngineLauncher`].
//! [`EngineRegistry`] maps names to executables; with the `test-util`
//! feature, [`fake::FakeEngine`] provides a scripted in-process engine.

mod error;
#[cfg(feature = "test-util")]
pub mod fake;
mod launcher;
mod listener;
mod session;
mod transport;

pub use error::ClientError;
pub use launcher::{EngineDefinition, EngineLauncher, EngineRegistry};
pub use listener::{SearchEvent, SearchListener};
pub use session::{EngineSession, SearchProbe, SessionTimeouts};
pub use transport::EngineTransport;
