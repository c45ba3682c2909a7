//! Castling rights.

use crate::{Color, Square};
use std::fmt;

/// The four castling rights packed into a nibble.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CastlingRights(u8);

impl CastlingRights {
    pub const WHITE_SHORT: u8 = 0b0001;
    pub const WHITE_LONG: u8 = 0b0010;
    pub const BLACK_SHORT: u8 = 0b0100;
    pub const BLACK_LONG: u8 = 0b1000;

    pub const NONE: CastlingRights = CastlingRights(0);
    pub const ALL: CastlingRights = CastlingRights(0b1111);

    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        CastlingRights(bits & 0b1111)
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn has(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    pub const fn short_flag(color: Color) -> u8 {
        match color {
            Color::White => Self::WHITE_SHORT,
            Color::Black => Self::BLACK_SHORT,
        }
    }

    pub const fn long_flag(color: Color) -> u8 {
        match color {
            Color::White => Self::WHITE_LONG,
            Color::Black => Self::BLACK_LONG,
        }
    }

    #[inline]
    pub const fn can_castle_short(self, color: Color) -> bool {
        self.has(Self::short_flag(color))
    }

    #[inline]
    pub const fn can_castle_long(self, color: Color) -> bool {
        self.has(Self::long_flag(color))
    }

    #[inline]
    pub const fn without(self, flags: u8) -> Self {
        CastlingRights(self.0 & !flags)
    }

    /// Rights that disappear when a piece leaves or arrives on `sq`.
    pub const fn lost_on(sq: Square) -> u8 {
        match sq.index() {
            0 => Self::WHITE_LONG,
            4 => Self::WHITE_SHORT | Self::WHITE_LONG,
            7 => Self::WHITE_SHORT,
            56 => Self::BLACK_LONG,
            60 => Self::BLACK_SHORT | Self::BLACK_LONG,
            63 => Self::BLACK_SHORT,
            _ => 0,
        }
    }

    /// Parses the FEN castling field. `-` means none.
    pub fn from_fen(field: &str) -> Option<Self> {
        if field == "-" {
            return Some(Self::NONE);
        }
        let mut bits = 0;
        for c in field.chars() {
            bits |= match c {
                'K' => Self::WHITE_SHORT,
                'Q' => Self::WHITE_LONG,
                'k' => Self::BLACK_SHORT,
                'q' => Self::BLACK_LONG,
                _ => return None,
            };
        }
        Some(CastlingRights(bits))
    }

    pub fn to_fen(self) -> String {
        if self.0 == 0 {
            return "-".to_string();
        }
        let mut s = String::with_capacity(4);
        for (flag, c) in [
            (Self::WHITE_SHORT, 'K'),
            (Self::WHITE_LONG, 'Q'),
            (Self::BLACK_SHORT, 'k'),
            (Self::BLACK_LONG, 'q'),
        ] {
            if self.has(flag) {
                s.push(c);
            }
        }
        s
    }
}

impl fmt::Debug for CastlingRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CastlingRights({})", self.to_fen())
    }
}
