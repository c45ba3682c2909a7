use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("engine not registered: {0}")]
    EngineNotFound(String),

    #[error("failed to connect to engine: {0}")]
    ConnectionFailed(String),

    #[error("engine did not answer '{command}' within {timeout:?}")]
    ProtocolTimeout {
        command: &'static str,
        timeout: Duration,
    },

    #[error("engine is not connected")]
    NotConnected,

    #[error("engine is busy searching")]
    Busy,

    #[error("engine I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
