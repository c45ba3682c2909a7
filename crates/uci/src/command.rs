//! Commands sent from the GUI side to the engine.

use crate::UciError;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    Uci,
    IsReady,
    UciNewGame,
    /// `position fen <fen> [moves ...]`, or `position startpos` when `fen`
    /// is `None`.
    Position {
        fen: Option<String>,
        moves: Vec<String>,
    },
    Go(GoOptions),
    Stop,
    SetOption {
        name: String,
        value: Option<String>,
    },
    /// Non-standard static evaluation dump understood by Stockfish.
    Eval,
    Quit,
    /// Anything else, kept verbatim.
    Unknown(String),
}

/// Limits for `go`. With no limit set the search is infinite.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GoOptions {
    pub depth: Option<u32>,
    pub movetime: Option<u64>,
    pub nodes: Option<u64>,
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: Option<u64>,
    pub binc: Option<u64>,
    pub movestogo: Option<u32>,
    pub infinite: bool,
}

impl GoOptions {
    pub fn depth(depth: u32) -> Self {
        GoOptions {
            depth: Some(depth),
            ..Self::default()
        }
    }

    pub fn movetime(ms: u64) -> Self {
        GoOptions {
            movetime: Some(ms),
            ..Self::default()
        }
    }

    pub fn infinite() -> Self {
        GoOptions {
            infinite: true,
            ..Self::default()
        }
    }

    fn has_limit(&self) -> bool {
        self.depth.is_some()
            || self.movetime.is_some()
            || self.nodes.is_some()
            || self.wtime.is_some()
            || self.btime.is_some()
    }

    /// True when the search only ends on `stop`.
    pub fn is_infinite(&self) -> bool {
        self.infinite || !self.has_limit()
    }

    /// Parses the arguments of `go`. Unknown keys and unparsable values are
    /// skipped.
    pub fn parse(args: &str) -> Self {
        let mut opts = GoOptions::default();
        let parts: Vec<&str> = args.split_whitespace().collect();
        let mut i = 0;
        while i < parts.len() {
            let value = parts.get(i + 1).copied().unwrap_or("");
            let consumed = match parts[i] {
                "depth" => {
                    opts.depth = value.parse().ok();
                    true
                }
                "movetime" => {
                    opts.movetime = value.parse().ok();
                    true
                }
                "nodes" => {
                    opts.nodes = value.parse().ok();
                    true
                }
                "wtime" => {
                    opts.wtime = value.parse().ok();
                    true
                }
                "btime" => {
                    opts.btime = value.parse().ok();
                    true
                }
                "winc" => {
                    opts.winc = value.parse().ok();
                    true
                }
                "binc" => {
                    opts.binc = value.parse().ok();
                    true
                }
                "movestogo" => {
                    opts.movestogo = value.parse().ok();
                    true
                }
                "infinite" => {
                    opts.infinite = true;
                    false
                }
                _ => false,
            };
            i += if consumed { 2 } else { 1 };
        }
        opts
    }
}

impl fmt::Display for GoOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(d) = self.depth {
            parts.push(format!("depth {d}"));
        }
        if let Some(t) = self.movetime {
            parts.push(format!("movetime {t}"));
        }
        if let Some(n) = self.nodes {
            parts.push(format!("nodes {n}"));
        }
        if let Some(t) = self.wtime {
            parts.push(format!("wtime {t}"));
        }
        if let Some(t) = self.btime {
            parts.push(format!("btime {t}"));
        }
        if let Some(t) = self.winc {
            parts.push(format!("winc {t}"));
        }
        if let Some(t) = self.binc {
            parts.push(format!("binc {t}"));
        }
        if let Some(m) = self.movestogo {
            parts.push(format!("movestogo {m}"));
        }
        if self.is_infinite() {
            parts.push("infinite".to_string());
        }
        f.write_str(&parts.join(" "))
    }
}

impl EngineCommand {
    pub fn position_fen(fen: impl Into<String>, moves: Vec<String>) -> Self {
        EngineCommand::Position {
            fen: Some(fen.into()),
            moves,
        }
    }

    pub fn set_option(name: impl Into<String>, value: impl Into<String>) -> Self {
        EngineCommand::SetOption {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// Parses one command line as an engine would receive it.
    pub fn parse(input: &str) -> Result<Self, UciError> {
        let input = input.trim();
        let (cmd, rest) = match input.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (input, ""),
        };

        match cmd {
            "uci" => Ok(EngineCommand::Uci),
            "isready" => Ok(EngineCommand::IsReady),
            "ucinewgame" => Ok(EngineCommand::UciNewGame),
            "stop" => Ok(EngineCommand::Stop),
            "quit" => Ok(EngineCommand::Quit),
            "eval" => Ok(EngineCommand::Eval),
            "go" => Ok(EngineCommand::Go(GoOptions::parse(rest))),
            "position" => Self::parse_position(rest),
            "setoption" => Self::parse_setoption(rest),
            _ => Ok(EngineCommand::Unknown(input.to_string())),
        }
    }

    fn parse_position(rest: &str) -> Result<Self, UciError> {
        let (setup, moves) = match rest.split_once(" moves") {
            Some((setup, moves)) => (setup.trim(), moves.split_whitespace().map(String::from).collect()),
            None => (rest.trim(), Vec::new()),
        };

        if setup == "startpos" {
            return Ok(EngineCommand::Position { fen: None, moves });
        }
        match setup.strip_prefix("fen") {
            Some(fen) if !fen.trim().is_empty() => Ok(EngineCommand::Position {
                fen: Some(fen.trim().to_string()),
                moves,
            }),
            _ => Err(UciError::ParseError(format!(
                "expected 'startpos' or 'fen <fen>', got '{setup}'"
            ))),
        }
    }

    fn parse_setoption(rest: &str) -> Result<Self, UciError> {
        let body = rest
            .strip_prefix("name")
            .ok_or_else(|| UciError::ParseError(format!("setoption without name: '{rest}'")))?
            .trim();
        let (name, value) = match body.split_once(" value") {
            Some((name, value)) => (name.trim(), Some(value.trim().to_string())),
            None => (body, None),
        };
        if name.is_empty() {
            return Err(UciError::ParseError("setoption with empty name".to_string()));
        }
        Ok(EngineCommand::SetOption {
            name: name.to_string(),
            value,
        })
    }
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineCommand::Uci => f.write_str("uci"),
            EngineCommand::IsReady => f.write_str("isready"),
            EngineCommand::UciNewGame => f.write_str("ucinewgame"),
            EngineCommand::Position { fen, moves } => {
                match fen {
                    Some(fen) => write!(f, "position fen {fen}")?,
                    None => f.write_str("position startpos")?,
                }
                if !moves.is_empty() {
                    write!(f, " moves {}", moves.join(" "))?;
                }
                Ok(())
            }
            EngineCommand::Go(opts) => write!(f, "go {opts}"),
            EngineCommand::Stop => f.write_str("stop"),
            EngineCommand::SetOption { name, value } => match value {
                Some(value) => write!(f, "setoption name {name} value {value}"),
                None => write!(f, "setoption name {name}"),
            },
            EngineCommand::Eval => f.write_str("eval"),
            EngineCommand::Quit => f.write_str("quit"),
            EngineCommand::Unknown(text) => f.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_commands() {
        assert_eq!(EngineCommand::parse("uci").unwrap(), EngineCommand::Uci);
        assert_eq!(EngineCommand::parse("isready\n").unwrap(), EngineCommand::IsReady);
        assert_eq!(EngineCommand::parse("eval").unwrap(), EngineCommand::Eval);
        assert_eq!(
            EngineCommand::parse("xyzzy 1").unwrap(),
            EngineCommand::Unknown("xyzzy 1".to_string())
        );
    }

    #[test]
    fn parse_position_startpos_with_moves() {
        let cmd = EngineCommand::parse("position startpos moves e2e4 e7e5").unwrap();
        assert_eq!(
            cmd,
            EngineCommand::Position {
                fen: None,
                moves: vec!["e2e4".to_string(), "e7e5".to_string()]
            }
        );
    }

    #[test]
    fn parse_position_fen() {
        let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
        let cmd = EngineCommand::parse(&format!("position fen {fen} moves e7e5")).unwrap();
        assert_eq!(cmd, EngineCommand::position_fen(fen, vec!["e7e5".to_string()]));
        assert!(EngineCommand::parse("position").is_err());
        assert!(EngineCommand::parse("position fen").is_err());
    }

    #[test]
    fn parse_setoption_with_spaces() {
        let cmd = EngineCommand::parse("setoption name Skill Level value 10").unwrap();
        assert_eq!(cmd, EngineCommand::set_option("Skill Level", "10"));
        let cmd = EngineCommand::parse("setoption name Clear Hash").unwrap();
        assert_eq!(
            cmd,
            EngineCommand::SetOption {
                name: "Clear Hash".to_string(),
                value: None
            }
        );
    }

    #[test]
    fn go_options_round_trip_text() {
        assert_eq!(GoOptions::depth(5).to_string(), "depth 5");
        assert_eq!(GoOptions::movetime(200).to_string(), "movetime 200");
        assert_eq!(GoOptions::default().to_string(), "infinite");
        assert_eq!(GoOptions::parse("depth 12 movetime 500"), GoOptions {
            depth: Some(12),
            movetime: Some(500),
            ..GoOptions::default()
        });
        assert!(GoOptions::parse("").is_infinite());
        assert!(!GoOptions::parse("depth 3").is_infinite());
    }

    #[test]
    fn display_matches_wire_format() {
        assert_eq!(
            EngineCommand::position_fen("8/8/8/8/8/8/8/K1k5 w - - 0 1", vec!["a1a2".into()]).to_string(),
            "position fen 8/8/8/8/8/8/8/K1k5 w - - 0 1 moves a1a2"
        );
        assert_eq!(EngineCommand::Go(GoOptions::depth(5)).to_string(), "go depth 5");
        assert_eq!(
            EngineCommand::set_option("MultiPV", "3").to_string(),
            "setoption name MultiPV value 3"
        );
        assert_eq!(
            EngineCommand::Position { fen: None, moves: vec![] }.to_string(),
            "position startpos"
        );
    }
}
