//! `info` lines.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Score in centipawns or mate distance, from the engine's side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Score {
    /// Centipawns (100 = one pawn).
    Cp(i32),
    /// Mate in N moves; negative when the side to move is getting mated.
    Mate(i32),
}

impl Score {
    pub fn negate(self) -> Self {
        match self {
            Score::Cp(cp) => Score::Cp(cp.saturating_neg()),
            Score::Mate(n) => Score::Mate(n.saturating_neg()),
        }
    }
}

/// Set when the score is only a bound from an aspiration window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreBound {
    Lower,
    Upper,
}

/// One decoded `info` line. Every field is optional; engines send whatever
/// subset they like.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineInfo {
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    /// Milliseconds searched.
    pub time: Option<u64>,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
    pub tbhits: Option<u64>,
    /// Hash table fill, per mille.
    pub hashfull: Option<u32>,
    /// CPU usage, per mille.
    pub cpuload: Option<u32>,
    /// Line id under MultiPV, counting from 1.
    pub multipv: Option<u32>,
    pub score: Option<Score>,
    pub bound: Option<ScoreBound>,
    pub currmove: Option<String>,
    pub currmovenumber: Option<u32>,
    pub pv: Vec<String>,
    /// Free text after `string`.
    pub string: Option<String>,
}

const KEYWORDS: [&str; 16] = [
    "depth",
    "seldepth",
    "time",
    "nodes",
    "nps",
    "tbhits",
    "hashfull",
    "cpuload",
    "multipv",
    "score",
    "currmove",
    "currmovenumber",
    "pv",
    "string",
    "refutation",
    "currline",
];

fn is_info_keyword(s: &str) -> bool {
    KEYWORDS.contains(&s)
}

impl EngineInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Line id, 1 when the engine does not send `multipv`.
    pub fn line_id(&self) -> u32 {
        self.multipv.unwrap_or(1)
    }

    /// Decodes an `info ...` line. Returns `None` for anything else.
    ///
    /// Unknown tokens are skipped, `pv` runs up to the next known key and
    /// `string` takes the rest of the line.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().peekable();
        if parts.next()? != "info" {
            return None;
        }

        let mut info = EngineInfo::new();
        while let Some(key) = parts.next() {
            match key {
                "depth" => info.depth = parts.next().and_then(|v| v.parse().ok()),
                "seldepth" => info.seldepth = parts.next().and_then(|v| v.parse().ok()),
                "time" => info.time = parts.next().and_then(|v| v.parse().ok()),
                "nodes" => info.nodes = parts.next().and_then(|v| v.parse().ok()),
                "nps" => info.nps = parts.next().and_then(|v| v.parse().ok()),
                "tbhits" => info.tbhits = parts.next().and_then(|v| v.parse().ok()),
                "hashfull" => info.hashfull = parts.next().and_then(|v| v.parse().ok()),
                "cpuload" => info.cpuload = parts.next().and_then(|v| v.parse().ok()),
                "multipv" => info.multipv = parts.next().and_then(|v| v.parse().ok()),
                "currmovenumber" => {
                    info.currmovenumber = parts.next().and_then(|v| v.parse().ok())
                }
                "currmove" => info.currmove = parts.next().map(str::to_string),
                "score" => {
                    let kind = parts.next();
                    let value = parts.next().and_then(|v| v.parse::<i32>().ok());
                    info.score = match (kind, value) {
                        (Some("cp"), Some(v)) => Some(Score::Cp(v)),
                        (Some("mate"), Some(v)) => Some(Score::Mate(v)),
                        _ => None,
                    };
                    match parts.peek() {
                        Some(&"lowerbound") => {
                            info.bound = Some(ScoreBound::Lower);
                            parts.next();
                        }
                        Some(&"upperbound") => {
                            info.bound = Some(ScoreBound::Upper);
                            parts.next();
                        }
                        _ => {}
                    }
                }
                "pv" => {
                    while let Some(mv) = parts.next_if(|p| !is_info_keyword(p)) {
                        info.pv.push(mv.to_string());
                    }
                }
                "string" => {
                    info.string = Some(parts.by_ref().collect::<Vec<_>>().join(" "));
                }
                _ => {}
            }
        }
        Some(info)
    }
}

impl fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("info")?;
        let numbers = [
            ("depth", self.depth.map(u64::from)),
            ("seldepth", self.seldepth.map(u64::from)),
            ("multipv", self.multipv.map(u64::from)),
        ];
        for (key, value) in numbers {
            if let Some(v) = value {
                write!(f, " {key} {v}")?;
            }
        }
        match self.score {
            Some(Score::Cp(cp)) => write!(f, " score cp {cp}")?,
            Some(Score::Mate(n)) => write!(f, " score mate {n}")?,
            None => {}
        }
        match self.bound {
            Some(ScoreBound::Lower) => f.write_str(" lowerbound")?,
            Some(ScoreBound::Upper) => f.write_str(" upperbound")?,
            None => {}
        }
        let counters = [
            ("nodes", self.nodes),
            ("nps", self.nps),
            ("tbhits", self.tbhits),
            ("time", self.time),
            ("hashfull", self.hashfull.map(u64::from)),
            ("cpuload", self.cpuload.map(u64::from)),
        ];
        for (key, value) in counters {
            if let Some(v) = value {
                write!(f, " {key} {v}")?;
            }
        }
        if let Some(m) = &self.currmove {
            write!(f, " currmove {m}")?;
        }
        if let Some(n) = self.currmovenumber {
            write!(f, " currmovenumber {n}")?;
        }
        if !self.pv.is_empty() {
            write!(f, " pv {}", self.pv.join(" "))?;
        }
        if let Some(s) = &self.string {
            write!(f, " string {s}")?;
        }
        Ok(())
    }
}

/// Builder for [`EngineInfo`].
#[derive(Default)]
pub struct InfoBuilder {
    info: EngineInfo,
}

impl InfoBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(mut self, d: u32) -> Self {
        self.info.depth = Some(d);
        self
    }

    pub fn seldepth(mut self, d: u32) -> Self {
        self.info.seldepth = Some(d);
        self
    }

    pub fn multipv(mut self, line: u32) -> Self {
        self.info.multipv = Some(line);
        self
    }

    pub fn score_cp(mut self, cp: i32) -> Self {
        self.info.score = Some(Score::Cp(cp));
        self
    }

    pub fn score_mate(mut self, moves: i32) -> Self {
        self.info.score = Some(Score::Mate(moves));
        self
    }

    pub fn bound(mut self, bound: ScoreBound) -> Self {
        self.info.bound = Some(bound);
        self
    }

    pub fn nodes(mut self, n: u64) -> Self {
        self.info.nodes = Some(n);
        self
    }

    pub fn nps(mut self, n: u64) -> Self {
        self.info.nps = Some(n);
        self
    }

    pub fn tbhits(mut self, n: u64) -> Self {
        self.info.tbhits = Some(n);
        self
    }

    pub fn time(mut self, ms: u64) -> Self {
        self.info.time = Some(ms);
        self
    }

    pub fn pv<S: Into<String>>(mut self, moves: impl IntoIterator<Item = S>) -> Self {
        self.info.pv = moves.into_iter().map(Into::into).collect();
        self
    }

    pub fn string(mut self, s: &str) -> Self {
        self.info.string = Some(s.to_string());
        self
    }

    pub fn build(self) -> EngineInfo {
        self.info
    }
}
