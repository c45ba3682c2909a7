//! Service configuration loaded from TOML.
//!
//! ```toml
//! hostname = "analysis-1"
//! evaluation_engine = "stockfish"
//! watchdog_interval_ms = 1000
//!
//! [engines.stockfish]
//! path = "/usr/bin/stockfish"
//! options = { Threads = 4, Hash = 256 }
//!
//! [timeouts]
//! handshake_ms = 10000
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use uci_client::{EngineDefinition, EngineRegistry, SessionTimeouts};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("engine not configured: {0}")]
    EngineNotFound(String),
}

/// An engine executable and the options applied on every connect.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    /// Values may be written as TOML strings, numbers or booleans.
    #[serde(default)]
    pub options: BTreeMap<String, toml::Value>,
}

impl EngineConfig {
    /// Options in the textual form `setoption` expects.
    pub fn option_values(&self) -> Vec<(String, String)> {
        self.options
            .iter()
            .map(|(name, value)| {
                let text = match value {
                    toml::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (name.clone(), text)
            })
            .collect()
    }
}

/// Timeouts in milliseconds, see [`SessionTimeouts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_handshake_ms")]
    pub handshake_ms: u64,
    #[serde(default = "default_ready_ms")]
    pub ready_ms: u64,
    #[serde(default = "default_stop_ms")]
    pub stop_ms: u64,
    #[serde(default = "default_quit_ms")]
    pub quit_ms: u64,
    #[serde(default = "default_eval_quiet_ms")]
    pub eval_quiet_ms: u64,
}

fn default_handshake_ms() -> u64 {
    10_000
}

fn default_ready_ms() -> u64 {
    5_000
}

fn default_stop_ms() -> u64 {
    5_000
}

fn default_quit_ms() -> u64 {
    2_000
}

fn default_eval_quiet_ms() -> u64 {
    500
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        TimeoutConfig {
            handshake_ms: default_handshake_ms(),
            ready_ms: default_ready_ms(),
            stop_ms: default_stop_ms(),
            quit_ms: default_quit_ms(),
            eval_quiet_ms: default_eval_quiet_ms(),
        }
    }
}

impl From<TimeoutConfig> for SessionTimeouts {
    fn from(t: TimeoutConfig) -> Self {
        SessionTimeouts {
            handshake: Duration::from_millis(t.handshake_ms),
            ready: Duration::from_millis(t.ready_ms),
            stop: Duration::from_millis(t.stop_ms),
            quit: Duration::from_millis(t.quit_ms),
            eval_quiet: Duration::from_millis(t.eval_quiet_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Identifies this instance in logs.
    #[serde(default = "default_hostname")]
    pub hostname: String,
    /// Engine used for static evaluations.
    #[serde(default)]
    pub evaluation_engine: Option<String>,
    /// Engine used when a request names none.
    #[serde(default)]
    pub default_engine: Option<String>,
    #[serde(default)]
    pub engines: BTreeMap<String, EngineConfig>,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// How often the watchdog checks whether a search is still running.
    #[serde(default = "default_watchdog_interval_ms")]
    pub watchdog_interval_ms: u64,
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_watchdog_interval_ms() -> u64 {
    1_000
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            hostname: default_hostname(),
            evaluation_engine: None,
            default_engine: None,
            engines: BTreeMap::new(),
            timeouts: TimeoutConfig::default(),
            watchdog_interval_ms: default_watchdog_interval_ms(),
        }
    }
}

impl ServiceConfig {
    /// Reads and parses the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn engine(&self, name: &str) -> Result<&EngineConfig, ConfigError> {
        self.engines
            .get(name)
            .ok_or_else(|| ConfigError::EngineNotFound(name.to_string()))
    }

    pub fn session_timeouts(&self) -> SessionTimeouts {
        self.timeouts.into()
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms.max(1))
    }

    /// Launcher for every configured engine.
    pub fn registry(&self) -> EngineRegistry {
        let mut registry = EngineRegistry::new();
        for (name, engine) in &self.engines {
            let mut definition = EngineDefinition::new(&engine.path);
            definition.args = engine.args.clone();
            for (option, value) in engine.option_values() {
                definition = definition.with_option(option, value);
            }
            registry.register(name.clone(), definition);
        }
        registry
    }
}
