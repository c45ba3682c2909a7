//! Bitboards and directional shifts.
//!
//! Bit 0 is a1, bit 63 is h8. Sliding attacks are computed with Kogge-Stone
//! occluded fills: three doubling steps propagate a generator set along a
//! direction through empty squares, and one final shift turns the fill into
//! the attack set.

use chess_core::Square;
use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign, Not};

/// A set of squares.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Bitboard(pub u64);

/// One of the eight ray directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl Direction {
    pub const ORTHOGONAL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub const DIAGONAL: [Direction; 4] = [
        Direction::NorthEast,
        Direction::NorthWest,
        Direction::SouthEast,
        Direction::SouthWest,
    ];

    /// Square-index delta of one step.
    #[inline]
    pub const fn delta(self) -> i8 {
        match self {
            Direction::North => 8,
            Direction::South => -8,
            Direction::East => 1,
            Direction::West => -1,
            Direction::NorthEast => 9,
            Direction::NorthWest => 7,
            Direction::SouthEast => -7,
            Direction::SouthWest => -9,
        }
    }

    /// Squares a one-step shift may land on without wrapping around the
    /// board edge.
    #[inline]
    pub const fn wrap_mask(self) -> u64 {
        match self {
            Direction::North | Direction::South => !0,
            Direction::East | Direction::NorthEast | Direction::SouthEast => Bitboard::NOT_FILE_A.0,
            Direction::West | Direction::NorthWest | Direction::SouthWest => Bitboard::NOT_FILE_H.0,
        }
    }
}

#[inline]
const fn rotate(bits: u64, delta: i8) -> u64 {
    if delta >= 0 {
        bits << delta as u32
    } else {
        bits >> (-delta) as u32
    }
}

impl Bitboard {
    pub const EMPTY: Bitboard = Bitboard(0);
    pub const FULL: Bitboard = Bitboard(!0);

    pub const FILE_A: Bitboard = Bitboard(0x0101_0101_0101_0101);
    pub const FILE_H: Bitboard = Bitboard(0x8080_8080_8080_8080);
    pub const NOT_FILE_A: Bitboard = Bitboard(!0x0101_0101_0101_0101);
    pub const NOT_FILE_H: Bitboard = Bitboard(!0x8080_8080_8080_8080);

    pub const RANK_1: Bitboard = Bitboard(0x0000_0000_0000_00FF);
    pub const RANK_8: Bitboard = Bitboard(0xFF00_0000_0000_0000);

    #[inline]
    pub const fn from_square(sq: Square) -> Self {
        Bitboard(sq.bit())
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn any(self) -> bool {
        self.0 != 0
    }

    #[inline]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    #[inline]
    pub const fn contains(self, sq: Square) -> bool {
        self.0 & sq.bit() != 0
    }

    #[inline]
    pub fn set(&mut self, sq: Square) {
        self.0 |= sq.bit();
    }

    #[inline]
    pub fn clear(&mut self, sq: Square) {
        self.0 &= !sq.bit();
    }

    #[inline]
    pub fn toggle(&mut self, sq: Square) {
        self.0 ^= sq.bit();
    }

    /// Lowest set square.
    #[inline]
    pub const fn first(self) -> Option<Square> {
        if self.0 == 0 {
            None
        } else {
            Some(Square::from_bit(self.0.trailing_zeros()))
        }
    }

    #[inline]
    pub fn pop_first(&mut self) -> Option<Square> {
        let sq = self.first()?;
        self.0 &= self.0 - 1;
        Some(sq)
    }

    /// One step in `dir`, dropping bits that would wrap around a file edge.
    #[inline]
    pub const fn shift(self, dir: Direction) -> Bitboard {
        Bitboard(rotate(self.0, dir.delta()) & dir.wrap_mask())
    }

    /// Kogge-Stone occluded fill: every square reachable from `self` along
    /// `dir` through `empty` squares, generators included.
    pub const fn occluded_fill(self, empty: Bitboard, dir: Direction) -> Bitboard {
        let d = dir.delta();
        let mut gen = self.0;
        let mut pro = empty.0 & dir.wrap_mask();
        gen |= pro & rotate(gen, d);
        pro &= rotate(pro, d);
        gen |= pro & rotate(gen, 2 * d);
        pro &= rotate(pro, 2 * d);
        gen |= pro & rotate(gen, 4 * d);
        Bitboard(gen)
    }

    /// Squares attacked along `dir` by sliders in `self`, first blocker
    /// included.
    #[inline]
    pub const fn sliding_attacks(self, empty: Bitboard, dir: Direction) -> Bitboard {
        self.occluded_fill(empty, dir).shift(dir)
    }
}

impl BitAnd for Bitboard {
    type Output = Self;
    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Bitboard(self.0 & rhs.0)
    }
}

impl BitAndAssign for Bitboard {
    #[inline]
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl BitOr for Bitboard {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Bitboard(self.0 | rhs.0)
    }
}

impl BitOrAssign for Bitboard {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitXor for Bitboard {
    type Output = Self;
    #[inline]
    fn bitxor(self, rhs: Self) -> Self {
        Bitboard(self.0 ^ rhs.0)
    }
}

impl BitXorAssign for Bitboard {
    #[inline]
    fn bitxor_assign(&mut self, rhs: Self) {
        self.0 ^= rhs.0;
    }
}

impl Not for Bitboard {
    type Output = Self;
    #[inline]
    fn not(self) -> Self {
        Bitboard(!self.0)
    }
}

impl fmt::Debug for Bitboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Bitboard({:#018x})", self.0)?;
        for rank in (0..8).rev() {
            write!(f, "{} ", rank + 1)?;
            for file in 0..8 {
                let mark = if (self.0 >> (rank * 8 + file)) & 1 == 1 {
                    'x'
                } else {
                    '.'
                };
                write!(f, "{} ", mark)?;
            }
            writeln!(f)?;
        }
        writeln!(f, "  a b c d e f g h")
    }
}

/// Iterates set squares from a1 upwards.
pub struct BitboardIter(Bitboard);

impl Iterator for BitboardIter {
    type Item = Square;

    #[inline]
    fn next(&mut self) -> Option<Square> {
        self.0.pop_first()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for BitboardIter {}

impl IntoIterator for Bitboard {
    type Item = Square;
    type IntoIter = BitboardIter;

    #[inline]
    fn into_iter(self) -> BitboardIter {
        BitboardIter(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    fn bb(squares: &[&str]) -> Bitboard {
        let mut b = Bitboard::EMPTY;
        for s in squares {
            b.set(sq(s));
        }
        b
    }

    #[test]
    fn shifts_do_not_wrap() {
        let h4 = Bitboard::from_square(sq("h4"));
        assert!(h4.shift(Direction::East).is_empty());
        assert!(h4.shift(Direction::NorthEast).is_empty());
        assert_eq!(h4.shift(Direction::West), bb(&["g4"]));

        let a4 = Bitboard::from_square(sq("a4"));
        assert!(a4.shift(Direction::West).is_empty());
        assert!(a4.shift(Direction::SouthWest).is_empty());
        assert_eq!(a4.shift(Direction::SouthEast), bb(&["b3"]));

        assert!(Bitboard::from_square(sq("c8")).shift(Direction::North).is_empty());
    }

    #[test]
    fn fill_on_empty_board_reaches_edge() {
        let a1 = Bitboard::from_square(Square::A1);
        let fill = a1.occluded_fill(Bitboard::FULL, Direction::North);
        assert_eq!(fill, Bitboard::FILE_A);
        let diag = a1.sliding_attacks(Bitboard::FULL, Direction::NorthEast);
        assert_eq!(diag.count(), 7);
        assert!(diag.contains(Square::H8));
    }

    #[test]
    fn fill_stops_at_blocker() {
        let occupied = bb(&["d1", "d6"]);
        let attacks = Bitboard::from_square(sq("d1")).sliding_attacks(!occupied, Direction::North);
        assert_eq!(attacks, bb(&["d2", "d3", "d4", "d5", "d6"]));
    }

    #[test]
    fn fill_moves_many_generators_at_once() {
        let gens = bb(&["a1", "a5"]);
        let blockers = bb(&["c1"]);
        let attacks = gens.sliding_attacks(!(blockers | gens), Direction::East);
        assert!(attacks.contains(sq("b1")));
        assert!(attacks.contains(sq("c1")));
        assert!(!attacks.contains(sq("d1")));
        assert!(attacks.contains(sq("h5")));
    }

    #[test]
    fn iteration_and_pop() {
        let squares: Vec<Square> = bb(&["h8", "a1", "e4"]).into_iter().collect();
        assert_eq!(squares, vec![Square::A1, sq("e4"), Square::H8]);
        let mut b = Bitboard(0b1010);
        assert_eq!(b.pop_first().map(|s| s.index()), Some(1));
        assert_eq!(b.pop_first().map(|s| s.index()), Some(3));
        assert_eq!(b.pop_first(), None);
    }
}
