//! `option` declarations from the `uci` handshake.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSpec {
    pub name: String,
    pub kind: OptionKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionKind {
    Spin {
        default: Option<i64>,
        min: Option<i64>,
        max: Option<i64>,
    },
    String {
        default: Option<String>,
    },
    Check {
        default: Option<bool>,
    },
    Combo {
        default: Option<String>,
        values: Vec<String>,
    },
    Button,
}

const FIELDS: [&str; 5] = ["type", "default", "min", "max", "var"];

impl OptionSpec {
    /// Decodes `option name <n> type <t> [default <d>] [min <m>] [max <x>]
    /// [var <v>]*`. Names and values may contain spaces.
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        if tokens.next()? != "option" || tokens.next()? != "name" {
            return None;
        }

        // Group the remaining tokens under the field keyword preceding them.
        let mut name = Vec::new();
        let mut fields: Vec<(&str, Vec<&str>)> = Vec::new();
        for token in tokens {
            if FIELDS.contains(&token) {
                fields.push((token, Vec::new()));
            } else if let Some((_, words)) = fields.last_mut() {
                words.push(token);
            } else {
                name.push(token);
            }
        }
        if name.is_empty() {
            return None;
        }

        let field = |key: &str| {
            fields
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, words)| words.join(" "))
        };
        let number = |key: &str| -> Option<i64> { field(key).and_then(|v| v.parse().ok()) };
        let text = |key: &str| field(key).filter(|v| !v.is_empty() && v != "<empty>");

        let kind = match field("type")?.as_str() {
            "spin" => OptionKind::Spin {
                default: number("default"),
                min: number("min"),
                max: number("max"),
            },
            "string" => OptionKind::String {
                default: text("default"),
            },
            "check" => OptionKind::Check {
                default: field("default").and_then(|v| v.parse().ok()),
            },
            "combo" => OptionKind::Combo {
                default: text("default"),
                values: fields
                    .iter()
                    .filter(|(k, _)| *k == "var")
                    .map(|(_, words)| words.join(" "))
                    .collect(),
            },
            "button" => OptionKind::Button,
            _ => return None,
        };

        Some(OptionSpec {
            name: name.join(" "),
            kind,
        })
    }

    /// Whether `value` is acceptable for this option.
    pub fn accepts(&self, value: &str) -> bool {
        match &self.kind {
            OptionKind::Spin { min, max, .. } => match value.parse::<i64>() {
                Ok(v) => min.map_or(true, |m| v >= m) && max.map_or(true, |m| v <= m),
                Err(_) => false,
            },
            OptionKind::Check { .. } => matches!(value, "true" | "false"),
            OptionKind::Combo { values, .. } => {
                values.iter().any(|v| v.eq_ignore_ascii_case(value))
            }
            OptionKind::String { .. } => true,
            OptionKind::Button => value.is_empty(),
        }
    }
}

impl fmt::Display for OptionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "option name {} type ", self.name)?;
        match &self.kind {
            OptionKind::Spin { default, min, max } => {
                f.write_str("spin")?;
                if let Some(d) = default {
                    write!(f, " default {d}")?;
                }
                if let Some(m) = min {
                    write!(f, " min {m}")?;
                }
                if let Some(m) = max {
                    write!(f, " max {m}")?;
                }
                Ok(())
            }
            OptionKind::String { default } => {
                write!(f, "string default {}", default.as_deref().unwrap_or("<empty>"))
            }
            OptionKind::Check { default } => {
                f.write_str("check")?;
                if let Some(d) = default {
                    write!(f, " default {d}")?;
                }
                Ok(())
            }
            OptionKind::Combo { default, values } => {
                f.write_str("combo")?;
                if let Some(d) = default {
                    write!(f, " default {d}")?;
                }
                for v in values {
                    write!(f, " var {v}")?;
                }
                Ok(())
            }
            OptionKind::Button => f.write_str("button"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_spin() {
        let spec = OptionSpec::parse("option name MultiPV type spin default 1 min 1 max 500").unwrap();
        assert_eq!(spec.name, "MultiPV");
        assert_eq!(
            spec.kind,
            OptionKind::Spin {
                default: Some(1),
                min: Some(1),
                max: Some(500)
            }
        );
        assert!(spec.accepts("3"));
        assert!(!spec.accepts("0"));
        assert!(!spec.accepts("many"));
    }

    #[test]
    fn parse_names_and_values_with_spaces() {
        let spec = OptionSpec::parse("option name Skill Level type spin default 20 min 0 max 20").unwrap();
        assert_eq!(spec.name, "Skill Level");

        let spec = OptionSpec::parse(
            "option name Analysis Contempt type combo default Both var Off var White var Black var Both",
        )
        .unwrap();
        assert_eq!(spec.name, "Analysis Contempt");
        assert_eq!(
            spec.kind,
            OptionKind::Combo {
                default: Some("Both".to_string()),
                values: vec!["Off", "White", "Black", "Both"].into_iter().map(String::from).collect()
            }
        );
        assert!(spec.accepts("white"));
        assert!(!spec.accepts("Green"));
    }

    #[test]
    fn parse_string_check_button() {
        let spec = OptionSpec::parse("option name SyzygyPath type string default <empty>").unwrap();
        assert_eq!(spec.kind, OptionKind::String { default: None });

        let spec = OptionSpec::parse("option name EvalFile type string default nn-1 2.nnue").unwrap();
        assert_eq!(
            spec.kind,
            OptionKind::String {
                default: Some("nn-1 2.nnue".to_string())
            }
        );

        let spec = OptionSpec::parse("option name Ponder type check default false").unwrap();
        assert_eq!(spec.kind, OptionKind::Check { default: Some(false) });
        assert!(spec.accepts("true"));

        let spec = OptionSpec::parse("option name Clear Hash type button").unwrap();
        assert_eq!(spec.name, "Clear Hash");
        assert_eq!(spec.kind, OptionKind::Button);
    }

    #[test]
    fn rejects_malformed() {
        assert!(OptionSpec::parse("option name Hash").is_none());
        assert!(OptionSpec::parse("option type spin").is_none());
        assert!(OptionSpec::parse("option name X type colour").is_none());
        assert!(OptionSpec::parse("id name Stockfish").is_none());
    }

    #[test]
    fn display_parses_back() {
        for line in [
            "option name Hash type spin default 16 min 1 max 33554432",
            "option name UCI_Chess960 type check default false",
            "option name Style type combo default Normal var Solid var Normal",
            "option name Clear Hash type button",
            "option name Debug Log File type string default <empty>",
        ] {
            let spec = OptionSpec::parse(line).unwrap();
            assert_eq!(spec.to_string(), line);
        }
    }
}
