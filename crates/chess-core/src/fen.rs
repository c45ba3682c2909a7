//! FEN parsing and serialization.
//!
//! Only the piece placement is mandatory. Missing trailing fields take the
//! defaults `w - - 0 1`.

use crate::{CastlingRights, Color, Piece, Square};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FenError {
    #[error("empty FEN")]
    Empty,

    #[error("invalid FEN: too many fields ({0})")]
    TooManyFields(usize),

    #[error("invalid piece placement: {0}")]
    InvalidPiecePlacement(String),

    #[error("invalid active color: expected 'w' or 'b', got '{0}'")]
    InvalidActiveColor(String),

    #[error("invalid castling rights: {0}")]
    InvalidCastlingRights(String),

    #[error("invalid en passant square: {0}")]
    InvalidEnPassantSquare(String),

    #[error("invalid halfmove clock: {0}")]
    InvalidHalfmoveClock(String),

    #[error("invalid fullmove number: {0}")]
    InvalidFullmoveNumber(String),
}

pub type Placement = [Option<(Piece, Color)>; 64];

/// A syntactically valid FEN, decoded into typed fields.
///
/// No chess legality is checked here; the engine's position constructor does
/// that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FenRecord {
    pub placement: Placement,
    pub side_to_move: Color,
    pub castling: CastlingRights,
    pub en_passant: Option<Square>,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
}

impl FenRecord {
    pub const STARTPOS: &'static str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    pub fn parse(fen: &str) -> Result<Self, FenError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.is_empty() {
            return Err(FenError::Empty);
        }
        if fields.len() > 6 {
            return Err(FenError::TooManyFields(fields.len()));
        }

        let placement = parse_placement(fields[0])?;

        let side_to_move = match fields.get(1) {
            None => Color::White,
            Some(tok) => {
                Color::from_fen(tok).ok_or_else(|| FenError::InvalidActiveColor(tok.to_string()))?
            }
        };

        let castling = match fields.get(2) {
            None => CastlingRights::NONE,
            Some(tok) => CastlingRights::from_fen(tok)
                .ok_or_else(|| FenError::InvalidCastlingRights(tok.to_string()))?,
        };

        let en_passant = match fields.get(3) {
            None | Some(&"-") => None,
            Some(tok) => match Square::from_algebraic(tok) {
                Some(sq) if sq.rank() == 2 || sq.rank() == 5 => Some(sq),
                _ => return Err(FenError::InvalidEnPassantSquare(tok.to_string())),
            },
        };

        let halfmove_clock = match fields.get(4) {
            None => 0,
            Some(tok) => tok
                .parse()
                .map_err(|_| FenError::InvalidHalfmoveClock(tok.to_string()))?,
        };

        let fullmove_number = match fields.get(5) {
            None => 1,
            Some(tok) => match tok.parse::<u32>() {
                Ok(n) if n >= 1 => n,
                _ => return Err(FenError::InvalidFullmoveNumber(tok.to_string())),
            },
        };

        Ok(FenRecord {
            placement,
            side_to_move,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
        })
    }

    /// The first four fields, as used for repetition and FEN tags.
    pub fn position_part(&self) -> String {
        format!(
            "{} {} {} {}",
            placement_to_fen(&self.placement),
            self.side_to_move.to_fen_char(),
            self.castling.to_fen(),
            self.en_passant
                .map(|s| s.to_algebraic())
                .unwrap_or_else(|| "-".to_string())
        )
    }

    pub fn to_fen(&self) -> String {
        format!(
            "{} {} {}",
            self.position_part(),
            self.halfmove_clock,
            self.fullmove_number
        )
    }
}

impl Default for FenRecord {
    fn default() -> Self {
        match Self::parse(Self::STARTPOS) {
            Ok(rec) => rec,
            Err(_) => unreachable!("start position FEN is well formed"),
        }
    }
}

fn parse_placement(field: &str) -> Result<Placement, FenError> {
    let rows: Vec<&str> = field.split('/').collect();
    if rows.len() != 8 {
        return Err(FenError::InvalidPiecePlacement(format!(
            "expected 8 ranks, got {}",
            rows.len()
        )));
    }

    let mut placement: Placement = [None; 64];
    for (i, row) in rows.iter().enumerate() {
        let rank = 7 - i as u8;
        let mut file = 0u8;
        for c in row.chars() {
            if let Some(skip) = c.to_digit(10) {
                if skip == 0 || skip > 8 {
                    return Err(FenError::InvalidPiecePlacement(format!(
                        "bad empty-square count '{}' in rank {}",
                        c,
                        rank + 1
                    )));
                }
                file += skip as u8;
            } else if let Some(pc) = Piece::from_fen_char(c) {
                let sq = Square::new(file, rank).ok_or_else(|| {
                    FenError::InvalidPiecePlacement(format!("rank {} overflows", rank + 1))
                })?;
                placement[sq.idx()] = Some(pc);
                file += 1;
            } else {
                return Err(FenError::InvalidPiecePlacement(format!(
                    "invalid character '{}' in rank {}",
                    c,
                    rank + 1
                )));
            }
            if file > 8 {
                return Err(FenError::InvalidPiecePlacement(format!(
                    "rank {} has more than 8 squares",
                    rank + 1
                )));
            }
        }
        if file != 8 {
            return Err(FenError::InvalidPiecePlacement(format!(
                "rank {} has {} squares, expected 8",
                rank + 1,
                file
            )));
        }
    }
    Ok(placement)
}

/// Serializes a board array to the FEN placement field.
pub fn placement_to_fen(placement: &Placement) -> String {
    let mut out = String::with_capacity(72);
    for rank in (0..8u8).rev() {
        let mut empty = 0;
        for file in 0..8u8 {
            match placement[(rank * 8 + file) as usize] {
                Some((piece, color)) => {
                    if empty > 0 {
                        out.push(char::from(b'0' + empty));
                        empty = 0;
                    }
                    out.push(piece.to_fen_char(color));
                }
                None => empty += 1,
            }
        }
        if empty > 0 {
            out.push(char::from(b'0' + empty));
        }
        if rank > 0 {
            out.push('/');
        }
    }
    out
}
