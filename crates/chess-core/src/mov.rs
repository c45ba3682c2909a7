//! Move representation.

use crate::{CastlingRights, Color, Piece, Square};
use std::fmt;
use std::sync::OnceLock;

/// What kind of move this is, beyond from/to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveKind {
    Normal,
    /// Pawn advancing two squares from its start rank.
    DoublePush,
    EnPassant,
    CastleShort,
    CastleLong,
    Promotion,
}

impl MoveKind {
    #[inline]
    pub const fn is_castle(self) -> bool {
        matches!(self, MoveKind::CastleShort | MoveKind::CastleLong)
    }
}

/// A fully described move.
///
/// Besides the squares it records everything needed to undo it: the
/// captured piece (and whether that piece had been promoted), the castling
/// rights and fifty-move count before the move. Its SAN is computed lazily
/// against the position it was played from and then cached.
#[derive(Clone)]
pub struct Move {
    from: Square,
    to: Square,
    piece: Piece,
    color: Color,
    captured: Option<Piece>,
    captured_promoted: bool,
    promotion: Option<Piece>,
    kind: MoveKind,
    prev_castling: CastlingRights,
    prev_fifty: u32,
    san: OnceLock<String>,
}

impl Move {
    pub fn new(from: Square, to: Square, piece: Piece, color: Color, kind: MoveKind) -> Self {
        Move {
            from,
            to,
            piece,
            color,
            captured: None,
            captured_promoted: false,
            promotion: None,
            kind,
            prev_castling: CastlingRights::NONE,
            prev_fifty: 0,
            san: OnceLock::new(),
        }
    }

    pub fn with_capture(mut self, captured: Piece, was_promoted: bool) -> Self {
        self.captured = Some(captured);
        self.captured_promoted = was_promoted;
        self
    }

    pub fn with_promotion(mut self, target: Piece) -> Self {
        self.promotion = Some(target);
        self.kind = MoveKind::Promotion;
        self
    }

    /// Records the irreversible state the move will overwrite.
    pub fn with_prior_state(mut self, castling: CastlingRights, fifty: u32) -> Self {
        self.prev_castling = castling;
        self.prev_fifty = fifty;
        self
    }

    #[inline]
    pub fn from(&self) -> Square {
        self.from
    }

    #[inline]
    pub fn to(&self) -> Square {
        self.to
    }

    #[inline]
    pub fn piece(&self) -> Piece {
        self.piece
    }

    #[inline]
    pub fn color(&self) -> Color {
        self.color
    }

    #[inline]
    pub fn captured(&self) -> Option<Piece> {
        self.captured
    }

    #[inline]
    pub fn captured_was_promoted(&self) -> bool {
        self.captured_promoted
    }

    #[inline]
    pub fn promotion(&self) -> Option<Piece> {
        self.promotion
    }

    #[inline]
    pub fn kind(&self) -> MoveKind {
        self.kind
    }

    #[inline]
    pub fn prev_castling(&self) -> CastlingRights {
        self.prev_castling
    }

    #[inline]
    pub fn prev_fifty(&self) -> u32 {
        self.prev_fifty
    }

    #[inline]
    pub fn is_capture(&self) -> bool {
        self.captured.is_some()
    }

    /// Captures and promotions are searched first.
    #[inline]
    pub fn is_high_priority(&self) -> bool {
        self.captured.is_some() || self.promotion.is_some()
    }

    /// Square of the captured piece; differs from `to` only for en passant.
    pub fn capture_square(&self) -> Square {
        if self.kind == MoveKind::EnPassant {
            Square::at(self.to.file(), self.from.rank())
        } else {
            self.to
        }
    }

    /// Rook origin and destination for castling moves.
    pub fn rook_squares(&self) -> Option<(Square, Square)> {
        let rank = self.color.home_rank();
        let (from_file, to_file) = match self.kind {
            MoveKind::CastleShort => (7, 5),
            MoveKind::CastleLong => (0, 3),
            _ => return None,
        };
        Some((Square::at(from_file, rank), Square::at(to_file, rank)))
    }

    /// Cached SAN, if it has been computed.
    pub fn san(&self) -> Option<&str> {
        self.san.get().map(String::as_str)
    }

    /// Returns the cached SAN, computing it with `f` the first time.
    pub fn san_or_init(&self, f: impl FnOnce() -> String) -> &str {
        self.san.get_or_init(f)
    }

    pub fn to_uci(&self) -> String {
        self.uci().to_string()
    }

    pub fn uci(&self) -> UciMove {
        UciMove {
            from: self.from,
            to: self.to,
            promotion: self.promotion,
        }
    }

    /// Whether this move matches a from/to/promotion triple.
    pub fn matches(&self, from: Square, to: Square, promotion: Option<Piece>) -> bool {
        self.from == from && self.to == to && self.promotion == promotion
    }
}

impl PartialEq for Move {
    fn eq(&self, other: &Self) -> bool {
        self.from == other.from
            && self.to == other.to
            && self.piece == other.piece
            && self.color == other.color
            && self.captured == other.captured
            && self.captured_promoted == other.captured_promoted
            && self.promotion == other.promotion
            && self.kind == other.kind
            && self.prev_castling == other.prev_castling
            && self.prev_fifty == other.prev_fifty
    }
}

impl Eq for Move {}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Move({} {:?})", self.uci(), self.kind)
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.san() {
            Some(san) => f.write_str(san),
            None => write!(f, "{}", self.uci()),
        }
    }
}

/// A move in long algebraic form as exchanged over UCI (`e2e4`, `e7e8q`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UciMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Piece>,
}

impl UciMove {
    pub fn parse(s: &str) -> Option<Self> {
        if !s.is_ascii() || !(4..=5).contains(&s.len()) {
            return None;
        }
        let from = Square::from_algebraic(&s[0..2])?;
        let to = Square::from_algebraic(&s[2..4])?;
        let promotion = match s[4..].chars().next() {
            None => None,
            Some(c) => match Piece::from_letter(c)? {
                p @ (Piece::Knight | Piece::Bishop | Piece::Rook | Piece::Queen) => Some(p),
                _ => return None,
            },
        };
        Some(UciMove {
            from,
            to,
            promotion,
        })
    }
}

impl fmt::Display for UciMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(p) = self.promotion {
            write!(f, "{}", p.uci_char())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    #[test]
    fn uci_parse_and_format() {
        let m = UciMove::parse("e2e4").unwrap();
        assert_eq!(m.from, sq("e2"));
        assert_eq!(m.to, sq("e4"));
        assert_eq!(m.promotion, None);
        assert_eq!(m.to_string(), "e2e4");

        let p = UciMove::parse("a7a8N").unwrap();
        assert_eq!(p.promotion, Some(Piece::Knight));
        assert_eq!(p.to_string(), "a7a8n");
    }

    #[test]
    fn uci_parse_rejects_bad_input() {
        assert!(UciMove::parse("e2").is_none());
        assert!(UciMove::parse("e2e9").is_none());
        assert!(UciMove::parse("e7e8k").is_none());
        assert!(UciMove::parse("e7e8qq").is_none());
        assert!(UciMove::parse("é2e4").is_none());
    }

    #[test]
    fn en_passant_capture_square() {
        let m = Move::new(sq("e5"), sq("d6"), Piece::Pawn, Color::White, MoveKind::EnPassant)
            .with_capture(Piece::Pawn, false);
        assert_eq!(m.capture_square(), sq("d5"));
        assert!(m.is_high_priority());
    }

    #[test]
    fn castle_rook_squares() {
        let short = Move::new(Square::E8, Square::G8, Piece::King, Color::Black, MoveKind::CastleShort);
        assert_eq!(short.rook_squares(), Some((Square::H8, Square::F8)));
        let long = Move::new(Square::E1, Square::C1, Piece::King, Color::White, MoveKind::CastleLong);
        assert_eq!(long.rook_squares(), Some((Square::A1, Square::D1)));
        let quiet = Move::new(Square::E1, Square::E1, Piece::King, Color::White, MoveKind::Normal);
        assert_eq!(quiet.rook_squares(), None);
    }

    #[test]
    fn san_is_set_once_and_ignored_by_eq() {
        let a = Move::new(sq("g1"), sq("f3"), Piece::Knight, Color::White, MoveKind::Normal);
        let b = a.clone();
        assert_eq!(a.san_or_init(|| "Nf3".to_string()), "Nf3");
        assert_eq!(a.san_or_init(|| "ignored".to_string()), "Nf3");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "Nf3");
        assert_eq!(b.to_string(), "g1f3");
    }

    #[test]
    fn promotion_sets_kind() {
        let m = Move::new(sq("b7"), sq("a8"), Piece::Pawn, Color::White, MoveKind::Normal)
            .with_capture(Piece::Rook, false)
            .with_promotion(Piece::Queen);
        assert_eq!(m.kind(), MoveKind::Promotion);
        assert_eq!(m.to_uci(), "b7a8q");
        assert!(m.matches(sq("b7"), sq("a8"), Some(Piece::Queen)));
    }
}
