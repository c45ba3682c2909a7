use crate::{ClientError, EngineTransport};
use std::collections::HashMap;
use std::path::PathBuf;

/// Starts engines by name.
pub trait EngineLauncher: Send + Sync {
    fn launch(&self, name: &str) -> Result<EngineTransport, ClientError>;

    /// Options applied right after the handshake, before any caller
    /// overrides.
    fn default_options(&self, _name: &str) -> Vec<(String, String)> {
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineDefinition {
    pub path: PathBuf,
    pub args: Vec<String>,
    pub options: Vec<(String, String)>,
}

impl EngineDefinition {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        EngineDefinition {
            path: path.into(),
            args: Vec::new(),
            options: Vec::new(),
        }
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((name.into(), value.into()));
        self
    }
}

/// Engine executables known by name.
#[derive(Debug, Clone, Default)]
pub struct EngineRegistry {
    engines: HashMap<String, EngineDefinition>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, definition: EngineDefinition) {
        self.engines.insert(name.into(), definition);
    }

    pub fn get(&self, name: &str) -> Option<&EngineDefinition> {
        self.engines.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.engines.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.engines.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl EngineLauncher for EngineRegistry {
    fn launch(&self, name: &str) -> Result<EngineTransport, ClientError> {
        let definition = self
            .get(name)
            .ok_or_else(|| ClientError::EngineNotFound(name.to_string()))?;
        let program = definition.path.to_string_lossy();
        EngineTransport::spawn(&program, &definition.args)
    }

    fn default_options(&self, name: &str) -> Vec<(String, String)> {
        self.get(name)
            .map(|d| d.options.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_engine_is_rejected() {
        let registry = EngineRegistry::new();
        assert!(matches!(
            registry.launch("stockfish"),
            Err(ClientError::EngineNotFound(name)) if name == "stockfish"
        ));
    }

    #[test]
    fn registry_lookup_and_defaults() {
        let mut registry = EngineRegistry::new();
        registry.register(
            "sf",
            EngineDefinition::new("/usr/bin/stockfish").with_option("Threads", "2"),
        );
        registry.register("lc0", EngineDefinition::new("/opt/lc0"));
        assert!(registry.contains("sf"));
        assert_eq!(registry.names(), vec!["lc0", "sf"]);
        assert_eq!(
            registry.default_options("sf"),
            vec![("Threads".to_string(), "2".to_string())]
        );
        assert!(registry.default_options("missing").is_empty());
    }

    #[tokio::test]
    async fn missing_executable_fails_to_connect() {
        let mut registry = EngineRegistry::new();
        registry.register("ghost", EngineDefinition::new("/nonexistent/engine-binary"));
        assert!(matches!(
            registry.launch("ghost"),
            Err(ClientError::ConnectionFailed(_))
        ));
    }
}
