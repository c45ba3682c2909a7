//! Board coordinates.
//!
//! Squares are numbered rank-major from a1: a1 = 0, b1 = 1, ..., h1 = 7,
//! a2 = 8, ..., h8 = 63.

use std::fmt;

/// A square on the board, 0..=63.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square(u8);

impl Square {
    /// Builds a square from zero-based file and rank.
    #[inline]
    pub const fn new(file: u8, rank: u8) -> Option<Self> {
        if file < 8 && rank < 8 {
            Some(Square(rank * 8 + file))
        } else {
            None
        }
    }

    /// Builds a square from file and rank, masking each to 0..=7.
    #[inline]
    pub const fn at(file: u8, rank: u8) -> Self {
        Square(((rank & 7) << 3) | (file & 7))
    }

    #[inline]
    pub const fn from_index(index: u8) -> Option<Self> {
        if index < 64 {
            Some(Square(index))
        } else {
            None
        }
    }

    /// Square of a bit position, as produced by `trailing_zeros` on a
    /// non-empty bitboard. Out-of-range input wraps.
    #[inline]
    pub const fn from_bit(bit: u32) -> Self {
        Square((bit & 63) as u8)
    }

    /// Parses a lower- or upper-case coordinate such as `e4`.
    pub fn from_algebraic(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return None;
        }
        let file = file_from_char(bytes[0] as char)?;
        let rank = rank_from_char(bytes[1] as char)?;
        Square::new(file, rank)
    }

    #[inline]
    pub const fn index(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn idx(self) -> usize {
        self.0 as usize
    }

    /// Zero-based file, a = 0.
    #[inline]
    pub const fn file(self) -> u8 {
        self.0 & 7
    }

    /// Zero-based rank, 1 = 0.
    #[inline]
    pub const fn rank(self) -> u8 {
        self.0 >> 3
    }

    #[inline]
    pub const fn file_char(self) -> char {
        (b'a' + self.file()) as char
    }

    #[inline]
    pub const fn rank_char(self) -> char {
        (b'1' + self.rank()) as char
    }

    /// Single-bit mask of this square.
    #[inline]
    pub const fn bit(self) -> u64 {
        1u64 << self.0
    }

    /// Moves by a file/rank delta, `None` when leaving the board.
    pub const fn offset(self, df: i8, dr: i8) -> Option<Self> {
        let f = self.file() as i8 + df;
        let r = self.rank() as i8 + dr;
        if f < 0 || f > 7 || r < 0 || r > 7 {
            None
        } else {
            Some(Square((r * 8 + f) as u8))
        }
    }

    /// Same file, rank mirrored. Used for colour-symmetric tables.
    #[inline]
    pub const fn flip_rank(self) -> Self {
        Square(self.0 ^ 56)
    }

    pub fn iter() -> impl Iterator<Item = Square> {
        (0u8..64).map(Square)
    }

    pub fn to_algebraic(self) -> String {
        let mut s = String::with_capacity(2);
        s.push(self.file_char());
        s.push(self.rank_char());
        s
    }

    pub const A1: Square = Square(0);
    pub const B1: Square = Square(1);
    pub const C1: Square = Square(2);
    pub const D1: Square = Square(3);
    pub const E1: Square = Square(4);
    pub const F1: Square = Square(5);
    pub const G1: Square = Square(6);
    pub const H1: Square = Square(7);
    pub const A8: Square = Square(56);
    pub const B8: Square = Square(57);
    pub const C8: Square = Square(58);
    pub const D8: Square = Square(59);
    pub const E8: Square = Square(60);
    pub const F8: Square = Square(61);
    pub const G8: Square = Square(62);
    pub const H8: Square = Square(63);
}

/// Parses a file letter, either case.
pub const fn file_from_char(c: char) -> Option<u8> {
    match c.to_ascii_lowercase() {
        'a'..='h' => Some(c.to_ascii_lowercase() as u8 - b'a'),
        _ => None,
    }
}

/// Parses a rank digit.
pub const fn rank_from_char(c: char) -> Option<u8> {
    match c {
        '1'..='8' => Some(c as u8 - b'1'),
        _ => None,
    }
}

impl fmt::Debug for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.file_char(), self.rank_char())
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.file_char(), self.rank_char())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_major_numbering() {
        let e4 = Square::from_algebraic("e4").unwrap();
        assert_eq!(e4.index(), 28);
        assert_eq!(e4.file(), 4);
        assert_eq!(e4.rank(), 3);
        assert_eq!(Square::H8.index(), 63);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(Square::from_algebraic("E4").map(|s| s.index()), Some(28));
        assert!(Square::from_algebraic("i1").is_none());
        assert!(Square::from_algebraic("a9").is_none());
        assert!(Square::from_algebraic("a").is_none());
        assert!(Square::from_algebraic("a10").is_none());
    }

    #[test]
    fn offset_stays_on_board() {
        assert_eq!(Square::A1.offset(1, 2).map(|s| s.to_algebraic()), Some("b3".into()));
        assert_eq!(Square::A1.offset(-1, 0), None);
        assert_eq!(Square::H8.offset(0, 1), None);
    }

    #[test]
    fn display_and_flip() {
        assert_eq!(Square::G1.to_string(), "g1");
        assert_eq!(Square::G1.flip_rank(), Square::G8);
        assert_eq!(Square::iter().count(), 64);
    }
}
