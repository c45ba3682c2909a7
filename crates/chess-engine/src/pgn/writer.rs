use std::fmt::Write;

pub const SEVEN_TAG_ROSTER: [&str; 7] = ["Event", "Site", "Date", "Round", "White", "Black", "Result"];

/// Movetext lines are broken before they would exceed this width.
pub const MAX_LINE_WIDTH: usize = 75;

pub fn is_result_token(text: &str) -> bool {
    matches!(text, "1-0" | "0-1" | "1/2-1/2" | "*")
}

/// Numbered move line, `1. e4 e5 2. Nf3` or `3... Bc5 4. O-O` when the first
/// move is Black's. `first_ply` counts from 0 at White's first move.
pub fn format_move_line(first_ply: u32, sans: &[String]) -> String {
    numbered_tokens(first_ply, sans).join(" ")
}

fn numbered_tokens(first_ply: u32, sans: &[String]) -> Vec<String> {
    let mut tokens = Vec::with_capacity(sans.len() * 3 / 2 + 1);
    for (i, san) in sans.iter().enumerate() {
        let ply = first_ply + i as u32;
        let number = ply / 2 + 1;
        if ply % 2 == 0 {
            tokens.push(format!("{number}."));
        } else if i == 0 {
            tokens.push(format!("{number}..."));
        }
        tokens.push(san.clone());
    }
    tokens
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Renders one game.
///
/// The seven-tag roster comes first, `?` where a tag is missing, then
/// `SetUp`/`FEN` when `setup_fen` is given, then every other header in its
/// stored order. The terminator is the `Result` header when it is a valid
/// result token and `*` otherwise.
pub fn write_pgn(
    headers: &[(String, String)],
    setup_fen: Option<&str>,
    first_ply: u32,
    sans: &[String],
) -> String {
    let lookup = |name: &str| {
        headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    };

    let mut out = String::new();
    for tag in SEVEN_TAG_ROSTER {
        let _ = writeln!(out, "[{tag} \"{}\"]", escape(lookup(tag).unwrap_or("?")));
    }
    if let Some(fen) = setup_fen {
        let _ = writeln!(out, "[SetUp \"1\"]");
        let _ = writeln!(out, "[FEN \"{}\"]", escape(fen));
    }
    for (name, value) in headers {
        if SEVEN_TAG_ROSTER.contains(&name.as_str()) || name == "SetUp" || name == "FEN" {
            continue;
        }
        let _ = writeln!(out, "[{name} \"{}\"]", escape(value));
    }
    out.push('\n');

    let terminator = lookup("Result").filter(|r| is_result_token(r)).unwrap_or("*");
    let mut tokens = numbered_tokens(first_ply, sans);
    tokens.push(terminator.to_string());

    let mut line = String::new();
    for token in tokens {
        if !line.is_empty() && line.len() + 1 + token.len() > MAX_LINE_WIDTH {
            out.push_str(&line);
            out.push('\n');
            line.clear();
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&token);
    }
    out.push_str(&line);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sans(moves: &[&str]) -> Vec<String> {
        moves.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn move_line_numbering() {
        assert_eq!(
            format_move_line(0, &sans(&["e4", "e5", "Nf3"])),
            "1. e4 e5 2. Nf3"
        );
        assert_eq!(format_move_line(5, &sans(&["Bc5", "O-O"])), "3... Bc5 4. O-O");
        assert_eq!(format_move_line(0, &[]), "");
    }

    #[test]
    fn missing_roster_tags_default_to_question_mark() {
        let headers = vec![
            ("White".to_string(), "Carlsen".to_string()),
            ("Annotator".to_string(), "me".to_string()),
        ];
        let pgn = write_pgn(&headers, None, 0, &sans(&["e4"]));
        let lines: Vec<&str> = pgn.lines().collect();
        assert_eq!(lines[0], "[Event \"?\"]");
        assert_eq!(lines[4], "[White \"Carlsen\"]");
        assert_eq!(lines[6], "[Result \"?\"]");
        assert_eq!(lines[7], "[Annotator \"me\"]");
        assert_eq!(lines[8], "");
        assert_eq!(lines[9], "1. e4 *");
    }

    #[test]
    fn setup_tags_and_valid_result() {
        let headers = vec![
            ("Result".to_string(), "0-1".to_string()),
            ("FEN".to_string(), "stale".to_string()),
        ];
        let fen = "4k3/8/8/8/8/8/8/4K3 b - - 0 1";
        let pgn = write_pgn(&headers, Some(fen), 1, &sans(&["Kd7"]));
        assert!(pgn.contains("[SetUp \"1\"]\n[FEN \"4k3/8/8/8/8/8/8/4K3 b - - 0 1\"]\n"));
        assert!(!pgn.contains("stale"));
        assert!(pgn.ends_with("\n1... Kd7 0-1\n"));
    }

    #[test]
    fn long_movetext_wraps() {
        let moves: Vec<String> = (0..80).map(|i| if i % 2 == 0 { "Nf3" } else { "Nf6" }.to_string()).collect();
        let pgn = write_pgn(&[], None, 0, &moves);
        let movetext: Vec<&str> = pgn.split("\n\n").nth(1).unwrap().lines().collect();
        assert!(movetext.len() > 1);
        assert!(movetext.iter().all(|l| l.len() <= MAX_LINE_WIDTH));
        assert!(movetext.last().unwrap().ends_with('*'));
    }

    #[test]
    fn header_values_are_escaped() {
        let headers = vec![("Event".to_string(), "A \"quoted\" \\ event".to_string())];
        let pgn = write_pgn(&headers, None, 0, &[]);
        assert!(pgn.starts_with("[Event \"A \\\"quoted\\\" \\\\ event\"]\n"));
    }
}
