use crate::ClientError;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};

pub type BoxReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Byte streams to and from an engine, plus the process when there is one.
pub struct EngineTransport {
    pub(crate) reader: BoxReader,
    pub(crate) writer: BoxWriter,
    pub(crate) child: Option<Child>,
}

impl EngineTransport {
    /// Spawns `program` with piped stdin/stdout. The process is killed if the
    /// transport is dropped without a clean shutdown.
    pub fn spawn(program: &str, args: &[String]) -> Result<Self, ClientError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ClientError::ConnectionFailed(format!("{program}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClientError::ConnectionFailed("failed to open stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClientError::ConnectionFailed("failed to open stdout".to_string()))?;

        Ok(EngineTransport {
            reader: Box::new(stdout),
            writer: Box::new(stdin),
            child: Some(child),
        })
    }

    /// In-process streams with no process behind them.
    pub fn from_streams(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        EngineTransport {
            reader: Box::new(reader),
            writer: Box::new(writer),
            child: None,
        }
    }
}
