//! UCI (Universal Chess Interface) wire codec.
//!
//! Types for both directions of the line-based protocol between a GUI (here,
//! the analysis client) and an engine process:
//!
//! - [`EngineCommand`] - `uci`, `isready`, `ucinewgame`, `position`, `go`,
//!   `stop`, `setoption`, `eval`, `quit`
//! - [`EngineMessage`] - `id`, `option`, `uciok`, `readyok`, `info`,
//!   `bestmove`
//!
//! Everything renders with `Display` and parses back; decoding is lenient
//! and skips what it does not understand.

mod command;
mod info;
mod option;

pub use command::{EngineCommand, GoOptions};
pub use info::{EngineInfo, InfoBuilder, Score, ScoreBound};
pub use option::{OptionKind, OptionSpec};

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UciError {
    #[error("parse error: {0}")]
    ParseError(String),
}

/// Lines an engine writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineMessage {
    IdName(String),
    IdAuthor(String),
    Option(OptionSpec),
    UciOk,
    ReadyOk,
    Info(EngineInfo),
    /// `bestmove (none)` decodes with `mv: None`.
    BestMove {
        mv: Option<String>,
        ponder: Option<String>,
    },
    /// Anything unrecognised, e.g. `eval` tables or banners.
    Other(String),
}

impl EngineMessage {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        let (head, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (trimmed, ""),
        };

        match head {
            "uciok" => EngineMessage::UciOk,
            "readyok" => EngineMessage::ReadyOk,
            "id" => match rest.split_once(char::is_whitespace) {
                Some(("name", name)) => EngineMessage::IdName(name.trim().to_string()),
                Some(("author", author)) => EngineMessage::IdAuthor(author.trim().to_string()),
                _ => EngineMessage::Other(trimmed.to_string()),
            },
            "option" => match OptionSpec::parse(trimmed) {
                Some(spec) => EngineMessage::Option(spec),
                None => EngineMessage::Other(trimmed.to_string()),
            },
            "info" => match EngineInfo::parse(trimmed) {
                Some(info) => EngineMessage::Info(info),
                None => EngineMessage::Other(trimmed.to_string()),
            },
            "bestmove" => {
                let mut parts = rest.split_whitespace();
                let mv = parts
                    .next()
                    .filter(|m| *m != "(none)" && *m != "0000")
                    .map(str::to_string);
                let ponder = match parts.next() {
                    Some("ponder") => parts.next().map(str::to_string),
                    _ => None,
                };
                EngineMessage::BestMove { mv, ponder }
            }
            _ => EngineMessage::Other(trimmed.to_string()),
        }
    }
}

impl fmt::Display for EngineMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineMessage::IdName(name) => write!(f, "id name {name}"),
            EngineMessage::IdAuthor(author) => write!(f, "id author {author}"),
            EngineMessage::Option(spec) => write!(f, "{spec}"),
            EngineMessage::UciOk => f.write_str("uciok"),
            EngineMessage::ReadyOk => f.write_str("readyok"),
            EngineMessage::Info(info) => write!(f, "{info}"),
            EngineMessage::BestMove { mv, ponder } => {
                write!(f, "bestmove {}", mv.as_deref().unwrap_or("(none)"))?;
                if let Some(p) = ponder {
                    write!(f, " ponder {p}")?;
                }
                Ok(())
            }
            EngineMessage::Other(text) => f.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_handshake_lines() {
        assert_eq!(
            EngineMessage::parse("id name Stockfish 16.1"),
            EngineMessage::IdName("Stockfish 16.1".to_string())
        );
        assert_eq!(
            EngineMessage::parse("id author the Stockfish developers"),
            EngineMessage::IdAuthor("the Stockfish developers".to_string())
        );
        assert_eq!(EngineMessage::parse("uciok\r\n"), EngineMessage::UciOk);
        assert_eq!(EngineMessage::parse("readyok"), EngineMessage::ReadyOk);
        assert!(matches!(
            EngineMessage::parse("option name Threads type spin default 1 min 1 max 1024"),
            EngineMessage::Option(spec) if spec.name == "Threads"
        ));
    }

    #[test]
    fn parse_bestmove_variants() {
        assert_eq!(
            EngineMessage::parse("bestmove e2e4 ponder e7e5"),
            EngineMessage::BestMove {
                mv: Some("e2e4".to_string()),
                ponder: Some("e7e5".to_string())
            }
        );
        assert_eq!(
            EngineMessage::parse("bestmove (none)"),
            EngineMessage::BestMove { mv: None, ponder: None }
        );
        assert_eq!(
            EngineMessage::parse("bestmove"),
            EngineMessage::BestMove { mv: None, ponder: None }
        );
    }

    #[test]
    fn parse_info_and_other() {
        match EngineMessage::parse("info depth 1 score cp 20 pv e2e4") {
            EngineMessage::Info(info) => assert_eq!(info.pv, vec!["e2e4"]),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            EngineMessage::parse("Final evaluation       +0.08 (white side)"),
            EngineMessage::Other("Final evaluation       +0.08 (white side)".to_string())
        );
        assert_eq!(
            EngineMessage::parse("id something"),
            EngineMessage::Other("id something".to_string())
        );
    }

    #[test]
    fn display_is_wire_format() {
        let msg = EngineMessage::BestMove {
            mv: Some("g1f3".to_string()),
            ponder: None,
        };
        assert_eq!(msg.to_string(), "bestmove g1f3");
        assert_eq!(EngineMessage::parse(&msg.to_string()), msg);
        assert_eq!(EngineMessage::IdName("Fake".into()).to_string(), "id name Fake");
    }
}
