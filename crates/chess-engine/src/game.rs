//! Games: a tagged [`Position`] that can be read from and written to PGN.

use crate::pgn::{self, PgnListener};
use crate::{PgnError, Position};
use std::io::BufRead;

/// A game record: PGN tag pairs plus the position with its move history.
#[derive(Debug, Clone, Default)]
pub struct Game {
    headers: Vec<(String, String)>,
    position: Position,
}

impl Game {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_position(position: Position) -> Self {
        Game {
            headers: Vec::new(),
            position,
        }
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Replaces the value of an existing tag or appends a new one.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.headers.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn position_mut(&mut self) -> &mut Position {
        &mut self.position
    }

    pub fn into_position(self) -> Position {
        self.position
    }

    /// The `Result` tag when it holds a valid result, `*` otherwise.
    pub fn result(&self) -> &str {
        self.header("Result")
            .filter(|r| pgn::is_result_token(r))
            .unwrap_or("*")
    }

    /// First game in `text`.
    pub fn from_pgn(text: &str) -> Result<Game, PgnError> {
        Self::from_pgn_with_setup(text, None)
    }

    /// First game in `text`, starting from `setup` unless the game carries
    /// its own `FEN` tag.
    pub fn from_pgn_with_setup(text: &str, setup: Option<&str>) -> Result<Game, PgnError> {
        let mut builder = GameBuilder {
            setup: setup.map(str::to_string),
            ..GameBuilder::default()
        };
        pgn::read_pgn(text.as_bytes(), &mut builder).map_err(|e| PgnError::Io(e.to_string()))?;
        builder
            .games
            .into_iter()
            .next()
            .unwrap_or(Err(PgnError::NoGame))
    }

    /// Every game in `input`, in order. Games with an illegal move or a bad
    /// setup come back as errors without affecting their neighbours.
    pub fn read_all<R: BufRead>(input: R) -> Result<GameBuilder, PgnError> {
        let mut builder = GameBuilder::default();
        pgn::read_pgn(input, &mut builder).map_err(|e| PgnError::Io(e.to_string()))?;
        Ok(builder)
    }

    pub fn to_pgn(&self) -> String {
        let mut replay = self.position.clone();
        let sans = replay.history_sans();
        let first_ply = self.position.ply() - sans.len() as u32;
        let setup = if self.position.starts_from_standard_position() {
            None
        } else {
            Some(self.position.start_fen())
        };
        pgn::write_pgn(&self.headers, setup, first_ply, &sans)
    }
}

impl Position {
    /// This position's history as an untagged PGN game.
    pub fn to_pgn(&self) -> String {
        Game::from_position(self.clone()).to_pgn()
    }
}

/// [`PgnListener`] that replays movetext into [`Game`]s.
#[derive(Debug, Default)]
pub struct GameBuilder {
    games: Vec<Result<Game, PgnError>>,
    warnings: Vec<PgnError>,
    headers: Vec<(String, String)>,
    current: Option<Game>,
    /// Start position for games without a `FEN` tag.
    setup: Option<String>,
}

impl GameBuilder {
    pub fn games(&self) -> &[Result<Game, PgnError>] {
        &self.games
    }

    pub fn into_games(self) -> Vec<Result<Game, PgnError>> {
        self.games
    }

    /// Malformed headers and unknown tokens that were skipped.
    pub fn warnings(&self) -> &[PgnError] {
        &self.warnings
    }

    fn current(&mut self) -> Result<&mut Game, PgnError> {
        if self.current.is_none() {
            let fen = self
                .headers
                .iter()
                .find(|(n, _)| n == "FEN")
                .map(|(_, fen)| fen.as_str())
                .or(self.setup.as_deref());
            let position = match fen {
                Some(fen) => Position::from_fen(fen).map_err(PgnError::InvalidSetup)?,
                None => Position::startpos(),
            };
            let mut game = Game::from_position(position);
            game.headers = std::mem::take(&mut self.headers);
            self.current = Some(game);
        }
        self.current.as_mut().ok_or(PgnError::NoGame)
    }
}

impl PgnListener for GameBuilder {
    fn game_start(&mut self) {
        self.headers.clear();
        self.current = None;
    }

    fn header(&mut self, name: &str, value: &str) {
        match self.current.as_mut() {
            Some(game) => game.set_header(name, value),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    fn move_word(&mut self, san: &str) -> Result<(), PgnError> {
        let game = self.current()?;
        let ply = game.position.ply();
        game.position
            .make_san_move(san)
            .map_err(|source| PgnError::IllegalMoveEncountered {
                san: san.to_string(),
                ply,
                source,
            })
    }

    fn unknown(&mut self, error: PgnError) {
        self.warnings.push(error);
    }

    fn game_aborted(&mut self, error: PgnError) {
        self.headers.clear();
        self.current = None;
        self.games.push(Err(error));
    }

    fn game_end(&mut self, result: Option<&str>) {
        let finished = self.current().map(|game| {
            if let Some(result) = result.filter(|r| pgn::is_result_token(r)) {
                if game.header("Result").is_none() {
                    game.set_header("Result", result);
                }
            }
        });
        let entry = match finished {
            Ok(()) => self.current.take().ok_or(PgnError::NoGame),
            Err(e) => Err(e),
        };
        self.games.push(entry);
        self.headers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_core::Color;

    const SCHOLAR: &str = r#"[Event "Casual"]
[Site "?"]
[Date "2024.01.01"]
[Round "1"]
[White "Alice"]
[Black "Bob"]
[Result "1-0"]

1. e4 e5 2. Bc4 Nc6 3. Qh5 Nf6 4. Qxf7# 1-0
"#;

    #[test]
    fn reads_headers_and_moves() {
        let mut game = Game::from_pgn(SCHOLAR).unwrap();
        assert_eq!(game.header("White"), Some("Alice"));
        assert_eq!(game.result(), "1-0");
        assert_eq!(game.position().history().len(), 7);
        assert!(game.position_mut().is_checkmate());
    }

    #[test]
    fn writes_what_it_reads() {
        let game = Game::from_pgn(SCHOLAR).unwrap();
        assert_eq!(game.to_pgn(), SCHOLAR);
    }

    #[test]
    fn round_trip_from_setup_position() {
        let fen = "4k3/8/8/8/8/8/4P3/4K3 b - - 0 10";
        let mut position = Position::from_fen(fen).unwrap();
        position.make_san_move("Kd7").unwrap();
        position.make_san_move("e4").unwrap();
        let text = position.to_pgn();
        assert!(text.contains("[SetUp \"1\"]"));
        assert!(text.contains("10... Kd7 11. e4 *"));

        let again = Game::from_pgn(&text).unwrap();
        assert_eq!(again.position().to_fen(), position.to_fen());
        assert_eq!(again.to_pgn(), text);
    }

    #[test]
    fn illegal_move_aborts_only_that_game() {
        let text = "[White \"A\"]\n\n1. e4 e5 2. Ke3 *\n\n[White \"B\"]\n\n1. d4 d5 *\n";
        let builder = Game::read_all(text.as_bytes()).unwrap();
        let games = builder.games();
        assert_eq!(games.len(), 2);
        match &games[0] {
            Err(PgnError::IllegalMoveEncountered { san, ply, .. }) => {
                assert_eq!(san, "Ke3");
                assert_eq!(*ply, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        let second = games[1].as_ref().unwrap();
        assert_eq!(second.header("White"), Some("B"));
        assert_eq!(second.position().side_to_move(), Color::White);
    }

    #[test]
    fn bad_setup_fen_is_reported() {
        let text = "[FEN \"not a fen\"]\n\n1. e4 *\n";
        assert!(matches!(
            Game::from_pgn(text),
            Err(PgnError::InvalidSetup(_))
        ));
    }

    #[test]
    fn untagged_movetext_starts_from_given_setup() {
        let setup = "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1";
        let game = Game::from_pgn_with_setup("1. e4 Kd7 *", Some(setup)).unwrap();
        assert_eq!(game.position().start_fen(), setup);
        assert_eq!(game.position().ply(), 2);

        let tagged = "[FEN \"4k3/8/8/8/8/8/3P4/4K3 w - - 0 1\"]\n\n1. d4 *";
        let game = Game::from_pgn_with_setup(tagged, Some(setup)).unwrap();
        assert_eq!(game.position().start_fen(), "4k3/8/8/8/8/8/3P4/4K3 w - - 0 1");
    }

    #[test]
    fn setup_errors_clone_with_their_fen_cause() {
        let err = Game::from_pgn("[FEN \"not a fen\"]\n\n1. e4 *\n").unwrap_err();
        let copy = err.clone();
        assert_eq!(copy, err);
        assert!(matches!(
            copy,
            PgnError::InvalidSetup(crate::PositionError::Fen(chess_core::FenError::InvalidPiecePlacement(_)))
        ));
    }

    #[test]
    fn result_token_fills_missing_header() {
        let game = Game::from_pgn("1. e4 e5 1/2-1/2\n").unwrap();
        assert_eq!(game.header("Result"), Some("1/2-1/2"));
    }

    #[test]
    fn empty_input_has_no_game() {
        assert_eq!(Game::from_pgn("").unwrap_err(), PgnError::NoGame);
    }

    #[test]
    fn unknown_tokens_become_warnings() {
        let builder = Game::read_all("1. e4 @@ e5 *\n".as_bytes()).unwrap();
        assert_eq!(builder.warnings().len(), 1);
        assert_eq!(
            builder.games()[0].as_ref().unwrap().position().history().len(),
            2
        );
    }

    #[test]
    fn set_header_replaces() {
        let mut game = Game::new();
        game.set_header("Event", "One");
        game.set_header("Event", "Two");
        assert_eq!(game.headers().len(), 1);
        assert_eq!(game.header("Event"), Some("Two"));
        assert_eq!(game.result(), "*");
    }
}
