//! Standard Algebraic Notation.
//!
//! Generation follows the usual rules: castling as `O-O` / `O-O-O`, pawn
//! captures named by their origin file, piece moves disambiguated by file,
//! rank or both only when another piece of the same kind also attacks the
//! destination, and a `+` / `#` suffix for check and mate.
//!
//! Parsing is forgiving. Input is normalised before matching: check and
//! capture markers, `=`, `e.p.` and annotation glyphs are dropped and
//! coordinates lower-cased, so `exd5`, `ed5`, `e4xd5!?` and `0-0` all work.

use crate::movegen::attacks::piece_attacks;
use crate::{Position, PositionError};
use chess_core::{file_from_char, rank_from_char, Move, MoveKind, Piece, Square};

/// SAN of `m`, which must be legal in `position` and not yet played.
pub fn to_san(position: &mut Position, m: &Move) -> String {
    let mut san = String::with_capacity(8);
    match m.kind() {
        MoveKind::CastleShort => san.push_str("O-O"),
        MoveKind::CastleLong => san.push_str("O-O-O"),
        _ if m.piece() == Piece::Pawn => {
            if m.is_capture() {
                san.push(m.from().file_char());
                san.push('x');
            }
            san.push_str(&m.to().to_algebraic());
            if let Some(target) = m.promotion().and_then(Piece::san_char) {
                san.push('=');
                san.push(target);
            }
        }
        _ => {
            if let Some(letter) = m.piece().san_char() {
                san.push(letter);
            }
            san.push_str(&disambiguation(position, m));
            if m.is_capture() {
                san.push('x');
            }
            san.push_str(&m.to().to_algebraic());
        }
    }

    position.force_move(m.clone());
    if position.is_check() {
        san.push(if position.has_legal_moves() { '+' } else { '#' });
    }
    position.rollback();
    san
}

/// Origin file and/or rank needed to tell `m` apart from other pieces of the
/// same kind attacking the same square.
fn disambiguation(position: &Position, m: &Move) -> String {
    let occupied = position.occupied();
    let rivals: Vec<Square> = position
        .pieces(m.piece(), m.color())
        .into_iter()
        .filter(|&sq| sq != m.from())
        .filter(|&sq| piece_attacks(m.piece(), sq, occupied).contains(m.to()))
        .collect();

    if rivals.is_empty() {
        return String::new();
    }
    let from = m.from();
    if rivals.iter().all(|sq| sq.file() != from.file()) {
        from.file_char().to_string()
    } else if rivals.iter().all(|sq| sq.rank() != from.rank()) {
        from.rank_char().to_string()
    } else {
        from.to_algebraic()
    }
}

/// Canonical form of user SAN: markers stripped, castling as `O-O` /
/// `O-O-O`, a leading piece letter upper-case, everything else lower-case.
pub fn normalize(text: &str) -> String {
    let stripped: String = text
        .trim()
        .replace("e.p.", "")
        .chars()
        .filter(|c| !matches!(c, '+' | '#' | '=' | 'x' | 'X' | ':' | '!' | '?' | ' '))
        .collect();

    let castle = stripped.replace(|c: char| c == '0' || c == 'o', "O");
    if castle == "O-O" || castle == "O-O-O" {
        return castle;
    }

    let mut out = String::with_capacity(stripped.len());
    for (i, c) in stripped.chars().enumerate() {
        if i == 0 && matches!(c, 'N' | 'B' | 'R' | 'Q' | 'K') {
            out.push(c);
        } else {
            out.push(c.to_ascii_lowercase());
        }
    }
    out
}

#[derive(Debug, PartialEq, Eq)]
struct SanPattern {
    piece: Piece,
    from_file: Option<u8>,
    from_rank: Option<u8>,
    to: Square,
    promotion: Option<Piece>,
}

impl SanPattern {
    fn parse(normalized: &str) -> Option<Self> {
        let mut chars: Vec<char> = normalized.chars().collect();

        let piece = match chars.first().copied() {
            Some(c) if c.is_ascii_uppercase() => {
                chars.remove(0);
                Piece::from_letter(c)?
            }
            Some('p') if chars.len() > 2 => {
                chars.remove(0);
                Piece::Pawn
            }
            _ => Piece::Pawn,
        };

        // Trailing promotion letter right after a rank digit.
        let mut promotion = None;
        if chars.len() >= 3 {
            let last = chars[chars.len() - 1];
            let before = chars[chars.len() - 2];
            if before.is_ascii_digit() && last.is_ascii_alphabetic() {
                match Piece::from_letter(last)? {
                    p @ (Piece::Knight | Piece::Bishop | Piece::Rook | Piece::Queen) => {
                        promotion = Some(p);
                        chars.pop();
                    }
                    _ => return None,
                }
            }
        }

        if chars.len() < 2 {
            return None;
        }
        let rank = rank_from_char(chars.pop()?)?;
        let file = file_from_char(chars.pop()?)?;
        let to = Square::new(file, rank)?;

        let mut from_file = None;
        let mut from_rank = None;
        for c in chars {
            if let Some(f) = file_from_char(c).filter(|_| c.is_ascii_lowercase()) {
                if from_file.replace(f).is_some() {
                    return None;
                }
            } else if let Some(r) = rank_from_char(c) {
                if from_rank.replace(r).is_some() {
                    return None;
                }
            } else {
                return None;
            }
        }

        Some(SanPattern {
            piece,
            from_file,
            from_rank,
            to,
            promotion,
        })
    }

    fn matches(&self, m: &Move) -> bool {
        m.piece() == self.piece
            && m.to() == self.to
            && m.promotion() == self.promotion
            && !m.kind().is_castle()
            && self.from_file.map_or(true, |f| m.from().file() == f)
            && self.from_rank.map_or(true, |r| m.from().rank() == r)
    }
}

/// Finds the unique legal move `text` denotes.
pub fn resolve(position: &mut Position, text: &str) -> Result<Move, PositionError> {
    let normalized = normalize(text);
    let legal = position.generate_legal_moves();

    let mut candidates: Vec<Move> = match normalized.as_str() {
        "O-O" => legal
            .into_iter()
            .filter(|m| m.kind() == MoveKind::CastleShort)
            .collect(),
        "O-O-O" => legal
            .into_iter()
            .filter(|m| m.kind() == MoveKind::CastleLong)
            .collect(),
        _ => {
            let pattern = SanPattern::parse(&normalized)
                .ok_or_else(|| PositionError::InvalidMove(text.to_string()))?;
            legal.into_iter().filter(|m| pattern.matches(m)).collect()
        }
    };

    match candidates.len() {
        0 => Err(PositionError::InvalidMove(text.to_string())),
        1 => candidates
            .pop()
            .ok_or_else(|| PositionError::InvalidMove(text.to_string())),
        _ => Err(PositionError::AmbiguousMove(text.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn san_after(fen: &str, uci: &str) -> String {
        let mut pos = Position::from_fen(fen).unwrap();
        let m = pos
            .generate_legal_moves()
            .into_iter()
            .find(|m| m.to_uci() == uci)
            .unwrap();
        to_san(&mut pos, &m)
    }

    #[test]
    fn generates_basic_moves() {
        let start = chess_core::FenRecord::STARTPOS;
        assert_eq!(san_after(start, "e2e4"), "e4");
        assert_eq!(san_after(start, "g1f3"), "Nf3");
    }

    #[test]
    fn generates_pawn_capture_and_promotion() {
        assert_eq!(
            san_after("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2", "e4d5"),
            "exd5"
        );
        assert_eq!(san_after("1r2k3/P7/8/8/8/8/8/4K3 w - - 0 1", "a7b8n"), "axb8=N");
        assert_eq!(san_after("4k3/P7/8/8/8/8/8/4K3 w - - 0 1", "a7a8q"), "a8=Q+");
    }

    #[test]
    fn generates_castling() {
        let fen = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1";
        assert_eq!(san_after(fen, "e1g1"), "O-O");
        assert_eq!(san_after(fen, "e1c1"), "O-O-O");
    }

    #[test]
    fn disambiguates_by_file_rank_or_both() {
        // Knights on b1 and f3 both reach d2.
        assert_eq!(san_after("4k3/8/8/8/8/5N2/8/1N2K3 w - - 0 1", "b1d2"), "Nbd2");
        // Rooks on a1 and a5 share a file.
        assert_eq!(san_after("4k3/8/8/R7/8/8/8/R3K3 w - - 0 1", "a1a3"), "R1a3");
        // Queens on h1, h4 and e1 all reach e4; h1 shares a file and a rank.
        assert_eq!(
            san_after("8/8/1k6/8/7Q/8/8/K3Q2Q w - - 0 1", "h1e4"),
            "Qh1e4"
        );
    }

    #[test]
    fn generates_mate_suffix() {
        let fen = "rnbqkbnr/pppp1ppp/8/4p3/6P1/5P2/PPPPP2P/RNBQKBNR b KQkq - 0 2";
        assert_eq!(san_after(fen, "d8h4"), "Qh4#");
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize("Nf3+"), "Nf3");
        assert_eq!(normalize("exd5 e.p."), "ed5");
        assert_eq!(normalize("e8=Q#"), "e8q");
        assert_eq!(normalize("0-0-0"), "O-O-O");
        assert_eq!(normalize("o-o"), "O-O");
        assert_eq!(normalize("NXF3!?"), "Nf3");
        assert_eq!(normalize("Bb5"), "Bb5");
    }

    #[test]
    fn resolves_lenient_input() {
        let fen = "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2";
        for text in ["exd5", "ed5", "e4xd5", "exd5!", "PExd5"] {
            let mut pos = Position::from_fen(fen).unwrap();
            let m = resolve(&mut pos, text).unwrap_or_else(|e| panic!("{text}: {e}"));
            assert_eq!(m.to_uci(), "e4d5", "{text}");
        }
    }

    #[test]
    fn resolves_promotion_case_insensitively() {
        let mut pos = Position::from_fen("4k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(resolve(&mut pos, "a8=q").unwrap().promotion(), Some(Piece::Queen));
        assert_eq!(resolve(&mut pos, "a8N").unwrap().promotion(), Some(Piece::Knight));
        assert!(matches!(
            resolve(&mut pos, "a8"),
            Err(PositionError::InvalidMove(_))
        ));
    }

    #[test]
    fn reports_ambiguity_and_garbage() {
        let mut pos = Position::from_fen("4k3/8/8/8/8/5N2/8/1N2K3 w - - 0 1").unwrap();
        assert!(matches!(
            resolve(&mut pos, "Nd2"),
            Err(PositionError::AmbiguousMove(_))
        ));
        assert_eq!(resolve(&mut pos, "Nfd2").unwrap().from().to_algebraic(), "f3");
        assert!(matches!(
            resolve(&mut pos, "Zz9"),
            Err(PositionError::InvalidMove(_))
        ));
        assert!(matches!(
            resolve(&mut pos, "O-O"),
            Err(PositionError::InvalidMove(_))
        ));
    }

    #[test]
    fn resolves_castling_spellings() {
        for text in ["O-O", "0-0", "o-o", "O-O+"] {
            let mut pos =
                Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
            assert_eq!(resolve(&mut pos, text).unwrap().kind(), MoveKind::CastleShort);
        }
    }
}
