//! Core chess vocabulary shared by the engine and the analysis service.
//!
//! - [`Piece`], [`Color`] and [`Square`] for board contents and coordinates
//! - [`CastlingRights`]
//! - [`Move`], the fully described move kept in a position's history, and
//!   [`UciMove`], the bare long-algebraic form engines speak
//! - [`FenRecord`] for lenient FEN parsing

mod castling;
mod color;
mod fen;
mod mov;
mod piece;
mod square;

pub use castling::CastlingRights;
pub use color::Color;
pub use fen::{placement_to_fen, FenError, FenRecord, Placement};
pub use mov::{Move, MoveKind, UciMove};
pub use piece::Piece;
pub use square::{file_from_char, rank_from_char, Square};
