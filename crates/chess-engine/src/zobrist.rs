//! Zobrist keys.
//!
//! One independent pseudo-random word per (colour, piece, square), one for
//! Black to move, one per castling right and one per en-passant file. A
//! position's hash is the XOR of the keys of everything present, so every
//! change is a single XOR toggle.

use chess_core::{CastlingRights, Color, Piece, Square};

pub struct ZobristKeys {
    pieces: [[[u64; 64]; 6]; 2],
    black_to_move: u64,
    castling: [u64; 4],
    en_passant: [u64; 8],
}

/// splitmix64 step. Returns the advanced state and the output word.
const fn next(state: u64) -> (u64, u64) {
    let state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    (state, z ^ (z >> 31))
}

impl ZobristKeys {
    const fn generate(seed: u64) -> Self {
        let mut state = seed;
        let mut pieces = [[[0u64; 64]; 6]; 2];
        let mut c = 0;
        while c < 2 {
            let mut p = 0;
            while p < 6 {
                let mut s = 0;
                while s < 64 {
                    let (advanced, value) = next(state);
                    state = advanced;
                    pieces[c][p][s] = value;
                    s += 1;
                }
                p += 1;
            }
            c += 1;
        }
        let (advanced, black_to_move) = next(state);
        state = advanced;
        let mut castling = [0u64; 4];
        let mut i = 0;
        while i < 4 {
            let (advanced, value) = next(state);
            state = advanced;
            castling[i] = value;
            i += 1;
        }
        let mut en_passant = [0u64; 8];
        let mut i = 0;
        while i < 8 {
            let (advanced, value) = next(state);
            state = advanced;
            en_passant[i] = value;
            i += 1;
        }
        ZobristKeys {
            pieces,
            black_to_move,
            castling,
            en_passant,
        }
    }

    #[inline]
    pub fn piece(&self, piece: Piece, color: Color, sq: Square) -> u64 {
        self.pieces[color.index()][piece.index()][sq.idx()]
    }

    #[inline]
    pub fn side(&self) -> u64 {
        self.black_to_move
    }

    /// XOR of the keys of every right present in `rights`.
    pub fn castling(&self, rights: CastlingRights) -> u64 {
        let mut key = 0;
        for (i, k) in self.castling.iter().enumerate() {
            if rights.bits() & (1 << i) != 0 {
                key ^= k;
            }
        }
        key
    }

    /// Key of the en-passant file, zero when there is no target square.
    #[inline]
    pub fn en_passant(&self, ep: Option<Square>) -> u64 {
        match ep {
            Some(sq) => self.en_passant[sq.file() as usize],
            None => 0,
        }
    }
}

pub static ZOBRIST: ZobristKeys = ZobristKeys::generate(0x5EED_C0DE_0BAD_F00D);
