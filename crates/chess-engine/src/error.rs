use chess_core::FenError;
use thiserror::Error;

/// Rejections from position construction and move input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PositionError {
    #[error(transparent)]
    Fen(#[from] FenError),

    #[error("illegal position: {0}")]
    IllegalPosition(String),

    #[error("invalid move: {0}")]
    InvalidMove(String),

    #[error("ambiguous move: {0}")]
    AmbiguousMove(String),
}

/// Problems met while reading PGN.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PgnError {
    #[error("illegal move '{san}' after {ply} plies: {source}")]
    IllegalMoveEncountered {
        san: String,
        ply: u32,
        #[source]
        source: PositionError,
    },

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("unknown token: {0}")]
    UnknownToken(String),

    #[error("invalid setup position: {0}")]
    InvalidSetup(#[source] PositionError),

    #[error("no game found in input")]
    NoGame,

    #[error("failed to read PGN: {0}")]
    Io(String),
}
