//! Chess rules on bitboards, plus SAN and PGN.
//!
//! This crate provides:
//! - [`Position`] - board state with incremental Zobrist hashing, make and
//!   rollback, and a repetition window
//! - Legal move generation and [`perft`](movegen::perft)
//! - [`san`] - SAN generation and lenient SAN resolution
//! - [`pgn`] - a streaming PGN reader and a PGN writer
//! - [`Game`] - a tagged position read from or written to PGN
//!
//! # Example
//!
//! ```
//! use chess_engine::{Game, Position};
//!
//! let mut position = Position::startpos();
//! position.make_san_move("e4").unwrap();
//! position.make_uci_move("e7e5").unwrap();
//! assert_eq!(position.generate_legal_moves().len(), 29);
//!
//! let game = Game::from_pgn("1. e4 e5 2. Nf3 *").unwrap();
//! assert_eq!(game.position().history().len(), 3);
//! ```

mod bitboard;
mod error;
mod game;
pub mod movegen;
pub mod pgn;
mod position;
mod repetition;
pub mod san;
mod zobrist;

pub use bitboard::{Bitboard, BitboardIter, Direction};
pub use error::{PgnError, PositionError};
pub use game::{Game, GameBuilder};
pub use movegen::attacks::{
    bishop_attacks, king_attacks, knight_attacks, pawn_attacks, queen_attacks, rook_attacks,
};
pub use movegen::perft::{perft, perft_divide};
pub use movegen::{MoveList, PriorityMoveList};
pub use pgn::{read_pgn, Annotation, PgnListener};
pub use position::Position;
pub use repetition::RepetitionTable;
pub use zobrist::{ZobristKeys, ZOBRIST};
