use crate::PgnError;
use std::io::{self, BufRead};

/// Non-move material found in movetext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    /// `{...}` or `;` comment, trimmed.
    Comment(String),
    /// A parenthesised sub-line, inner text only.
    Variation(String),
    /// `$n`, or a suffix glyph such as `!?` mapped to its NAG number.
    Nag(u16),
    /// A `%` escape line.
    Escape(String),
}

/// Receives parse events in input order.
///
/// Only [`PgnListener::move_word`] is required. Returning an error from it
/// aborts the current game: the parser calls
/// [`PgnListener::game_aborted`], skips to the next game and carries on.
pub trait PgnListener {
    fn game_start(&mut self) {}

    fn header(&mut self, _name: &str, _value: &str) {}

    fn move_number(&mut self, _number: u32, _black_to_move: bool) {}

    fn move_word(&mut self, san: &str) -> Result<(), PgnError>;

    fn annotation(&mut self, _annotation: Annotation) {}

    /// A malformed header or unrecognised token. Parsing continues.
    fn unknown(&mut self, _error: PgnError) {}

    fn game_aborted(&mut self, _error: PgnError) {}

    /// End of a game, with the termination marker if one was present.
    fn game_end(&mut self, _result: Option<&str>) {}
}

#[derive(Default)]
struct SubLine {
    depth: usize,
    text: String,
    in_comment: bool,
}

#[derive(Default)]
struct Reader {
    in_game: bool,
    in_movetext: bool,
    skipping: bool,
    comment: Option<String>,
    variation: Option<SubLine>,
}

/// Streams PGN from `input` into `listener`.
///
/// Only I/O failures are returned; everything wrong with the PGN itself is
/// reported through the listener.
pub fn read_pgn<R: BufRead, L: PgnListener + ?Sized>(input: R, listener: &mut L) -> io::Result<()> {
    let mut reader = Reader::default();
    for line in input.lines() {
        reader.line(&line?, listener);
    }
    reader.eof(listener);
    Ok(())
}

impl Reader {
    fn line<L: PgnListener + ?Sized>(&mut self, line: &str, l: &mut L) {
        if self.comment.is_none() && self.variation.is_none() {
            let trimmed = line.trim();
            if let Some(escape) = trimmed.strip_prefix('%') {
                l.annotation(Annotation::Escape(escape.to_string()));
                return;
            }
            if trimmed.starts_with('[') {
                self.header(trimmed, l);
                return;
            }
        }
        self.movetext(line, l);
    }

    fn header<L: PgnListener + ?Sized>(&mut self, line: &str, l: &mut L) {
        let parsed = parse_header(line);
        if parsed.is_some() && self.in_movetext {
            // A tag pair after moves without a result: the old game is over.
            self.finish(None, l);
        }
        if !self.in_game {
            self.begin(l);
        }
        match parsed {
            Some((name, value)) => l.header(&name, &value),
            None => l.unknown(PgnError::MalformedHeader(line.to_string())),
        }
    }

    fn movetext<L: PgnListener + ?Sized>(&mut self, line: &str, l: &mut L) {
        let mut word = String::new();
        let mut chars = line.char_indices();
        while let Some((i, c)) = chars.next() {
            if let Some(buf) = self.comment.as_mut() {
                if c == '}' {
                    let text = std::mem::take(buf);
                    self.comment = None;
                    l.annotation(Annotation::Comment(text.trim().to_string()));
                } else {
                    buf.push(c);
                }
                continue;
            }

            if let Some(sub) = self.variation.as_mut() {
                if sub.in_comment {
                    sub.in_comment = c != '}';
                    sub.text.push(c);
                    continue;
                }
                match c {
                    '{' => sub.in_comment = true,
                    '(' => sub.depth += 1,
                    ')' => sub.depth -= 1,
                    _ => {}
                }
                if sub.depth == 0 {
                    let text = std::mem::take(&mut sub.text);
                    self.variation = None;
                    l.annotation(Annotation::Variation(text.trim().to_string()));
                } else {
                    sub.text.push(c);
                }
                continue;
            }

            match c {
                '{' => {
                    self.word(&mut word, l);
                    self.comment = Some(String::new());
                }
                '(' => {
                    self.word(&mut word, l);
                    self.variation = Some(SubLine {
                        depth: 1,
                        ..SubLine::default()
                    });
                }
                ';' => {
                    self.word(&mut word, l);
                    let rest = &line[i + c.len_utf8()..];
                    l.annotation(Annotation::Comment(rest.trim().to_string()));
                    return;
                }
                ')' => {
                    self.word(&mut word, l);
                    l.unknown(PgnError::UnknownToken(")".to_string()));
                }
                c if c.is_whitespace() => self.word(&mut word, l),
                c => word.push(c),
            }
        }
        self.word(&mut word, l);
        if let Some(buf) = self.comment.as_mut() {
            buf.push(' ');
        } else if let Some(sub) = self.variation.as_mut() {
            sub.text.push(' ');
        }
    }

    fn word<L: PgnListener + ?Sized>(&mut self, word: &mut String, l: &mut L) {
        if word.is_empty() {
            return;
        }
        let token = std::mem::take(word);
        match classify(&token) {
            Token::Result => self.finish(Some(&token), l),
            Token::MoveNumber {
                number,
                black,
                rest,
            } => {
                self.enter_movetext(l);
                if !self.skipping {
                    l.move_number(number, black);
                }
                if !rest.is_empty() {
                    self.san(rest, l);
                }
            }
            Token::Nag(n) => l.annotation(Annotation::Nag(n)),
            Token::Ignored => {}
            Token::Move => self.san(&token, l),
            Token::Unknown => l.unknown(PgnError::UnknownToken(token)),
        }
    }

    fn san<L: PgnListener + ?Sized>(&mut self, san: &str, l: &mut L) {
        self.enter_movetext(l);
        if self.skipping {
            return;
        }
        match classify(san) {
            Token::Move => {
                if let Err(err) = l.move_word(san) {
                    self.skipping = true;
                    l.game_aborted(err);
                }
            }
            _ => l.unknown(PgnError::UnknownToken(san.to_string())),
        }
    }

    fn enter_movetext<L: PgnListener + ?Sized>(&mut self, l: &mut L) {
        if !self.in_game {
            self.begin(l);
        }
        self.in_movetext = true;
    }

    fn begin<L: PgnListener + ?Sized>(&mut self, l: &mut L) {
        self.in_game = true;
        self.in_movetext = false;
        self.skipping = false;
        l.game_start();
    }

    fn finish<L: PgnListener + ?Sized>(&mut self, result: Option<&str>, l: &mut L) {
        if !self.in_game {
            self.begin(l);
        }
        if !self.skipping {
            l.game_end(result);
        }
        self.in_game = false;
        self.in_movetext = false;
        self.skipping = false;
    }

    fn eof<L: PgnListener + ?Sized>(&mut self, l: &mut L) {
        if self.comment.take().is_some() {
            l.unknown(PgnError::UnknownToken("unterminated comment".to_string()));
        }
        if self.variation.take().is_some() {
            l.unknown(PgnError::UnknownToken("unterminated variation".to_string()));
        }
        if self.in_game {
            self.finish(None, l);
        }
    }
}

enum Token<'a> {
    Result,
    MoveNumber {
        number: u32,
        black: bool,
        rest: &'a str,
    },
    Nag(u16),
    Move,
    Ignored,
    Unknown,
}

fn classify(token: &str) -> Token<'_> {
    match token {
        "1-0" | "0-1" | "1/2-1/2" | "*" => return Token::Result,
        "e.p." => return Token::Ignored,
        "!" => return Token::Nag(1),
        "?" => return Token::Nag(2),
        "!!" => return Token::Nag(3),
        "??" => return Token::Nag(4),
        "!?" => return Token::Nag(5),
        "?!" => return Token::Nag(6),
        _ => {}
    }

    if let Some(n) = token.strip_prefix('$') {
        return match n.parse() {
            Ok(n) => Token::Nag(n),
            Err(_) => Token::Unknown,
        };
    }

    let digits = token.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 {
        let after = &token[digits..];
        let dots = after.bytes().take_while(|&b| b == b'.').count();
        let number = match token[..digits].parse() {
            Ok(n) => n,
            Err(_) => return Token::Unknown,
        };
        if dots == 0 && !after.is_empty() {
            // Castling written with zeros.
            return if is_move_word(token) {
                Token::Move
            } else {
                Token::Unknown
            };
        }
        return Token::MoveNumber {
            number,
            black: dots >= 2,
            rest: &after[dots..],
        };
    }

    if is_move_word(token) {
        Token::Move
    } else {
        Token::Unknown
    }
}

fn is_move_word(token: &str) -> bool {
    let mut chars = token.chars();
    let first_ok = matches!(
        chars.next(),
        Some('a'..='h' | 'N' | 'B' | 'R' | 'Q' | 'K' | 'P' | 'O' | 'o' | '0')
    );
    first_ok
        && token.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '=' | '+' | '#' | ':' | '!' | '?' | '.')
        })
}

/// Splits `[Name "Value"]`, undoing `\"` and `\\` escapes.
fn parse_header(line: &str) -> Option<(String, String)> {
    let inner = line.strip_prefix('[')?.trim_end().strip_suffix(']')?.trim();
    let split = inner.find(char::is_whitespace)?;
    let (name, rest) = inner.split_at(split);
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    let quoted = rest.trim().strip_prefix('"')?.strip_suffix('"')?;
    let mut value = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            value.push(chars.next()?);
        } else {
            value.push(c);
        }
    }
    Some((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        reject: Option<&'static str>,
    }

    impl PgnListener for Recorder {
        fn game_start(&mut self) {
            self.events.push("start".into());
        }
        fn header(&mut self, name: &str, value: &str) {
            self.events.push(format!("header {name}={value}"));
        }
        fn move_number(&mut self, number: u32, black: bool) {
            self.events.push(format!("num {number}{}", if black { "..." } else { "." }));
        }
        fn move_word(&mut self, san: &str) -> Result<(), PgnError> {
            if Some(san) == self.reject {
                return Err(PgnError::UnknownToken(san.to_string()));
            }
            self.events.push(format!("move {san}"));
            Ok(())
        }
        fn annotation(&mut self, a: Annotation) {
            self.events.push(format!("{a:?}"));
        }
        fn unknown(&mut self, e: PgnError) {
            self.events.push(format!("unknown {e}"));
        }
        fn game_aborted(&mut self, _e: PgnError) {
            self.events.push("aborted".into());
        }
        fn game_end(&mut self, result: Option<&str>) {
            self.events.push(format!("end {result:?}"));
        }
    }

    fn record(text: &str) -> Vec<String> {
        let mut r = Recorder::default();
        read_pgn(text.as_bytes(), &mut r).unwrap();
        r.events
    }

    #[test]
    fn headers_moves_and_result() {
        let events = record("[Event \"Test \\\"cup\\\"\"]\n[White \"A\"]\n\n1. e4 e5 2.Nf3 1-0\n");
        assert_eq!(
            events,
            vec![
                "start",
                "header Event=Test \"cup\"",
                "header White=A",
                "num 1.",
                "move e4",
                "move e5",
                "num 2.",
                "move Nf3",
                "end Some(\"1-0\")",
            ]
        );
    }

    #[test]
    fn comments_variations_and_nags() {
        let events = record("1. e4 {best by\ntest} (1. d4 {a (b} d5 (1... Nf6)) e5 $1 !? ; rest\n*");
        assert_eq!(
            events,
            vec![
                "start",
                "num 1.",
                "move e4",
                "Comment(\"best by test\")",
                "Variation(\"1. d4 {a (b} d5 (1... Nf6)\")",
                "move e5",
                "Nag(1)",
                "Nag(5)",
                "Comment(\"rest\")",
                "end Some(\"*\")",
            ]
        );
    }

    #[test]
    fn black_move_number_and_escape() {
        let events = record("% skip me\n12... Nf6 13.O-O\n");
        assert_eq!(
            events,
            vec![
                "Escape(\" skip me\")",
                "start",
                "num 12...",
                "move Nf6",
                "num 13.",
                "move O-O",
                "end None",
            ]
        );
    }

    #[test]
    fn rejected_move_skips_rest_of_game_only() {
        let mut r = Recorder {
            reject: Some("Zz"),
            ..Recorder::default()
        };
        read_pgn("1. e4 Zz 2. Nf3 1-0\n\n1. d4 0-1\n".as_bytes(), &mut r).unwrap();
        assert_eq!(
            r.events,
            vec![
                "start",
                "num 1.",
                "move e4",
                "unknown unknown token: Zz",
                "num 2.",
                "move Nf3",
                "end Some(\"1-0\")",
                "start",
                "num 1.",
                "move d4",
                "end Some(\"0-1\")",
            ]
        );

        let mut r = Recorder {
            reject: Some("e5"),
            ..Recorder::default()
        };
        read_pgn("1. e4 e5 2. Nf3 1-0\n1. d4 *\n".as_bytes(), &mut r).unwrap();
        assert_eq!(
            r.events,
            vec![
                "start",
                "num 1.",
                "move e4",
                "aborted",
                "start",
                "num 1.",
                "move d4",
                "end Some(\"*\")",
            ]
        );
    }

    #[test]
    fn malformed_header_is_reported_not_fatal() {
        let events = record("[Event Test]\n1. e4 *\n");
        assert_eq!(events[0], "start");
        assert!(events[1].starts_with("unknown malformed header"));
        assert_eq!(events[3], "move e4");
    }

    #[test]
    fn header_after_moves_starts_new_game() {
        let events = record("1. e4\n[Event \"Two\"]\n1. d4\n");
        assert_eq!(
            events,
            vec![
                "start",
                "num 1.",
                "move e4",
                "end None",
                "start",
                "header Event=Two",
                "num 1.",
                "move d4",
                "end None",
            ]
        );
    }

    #[test]
    fn unknown_tokens_are_skipped() {
        let events = record("1. e4 @@ e5 ) *\n");
        assert!(events.contains(&"unknown unknown token: @@".to_string()));
        assert!(events.contains(&"unknown unknown token: )".to_string()));
        assert!(events.contains(&"move e5".to_string()));
    }

    #[test]
    fn unterminated_comment_is_reported() {
        let events = record("1. e4 { never closed\n");
        assert!(events.contains(&"unknown unknown token: unterminated comment".to_string()));
        assert_eq!(events.last().map(String::as_str), Some("end None"));
    }
}
