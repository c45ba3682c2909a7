//! PGN reading and writing.
//!
//! [`read_pgn`] is a streaming tokenizer that reports what it sees to a
//! [`PgnListener`]; it never builds games itself. [`crate::GameBuilder`] is
//! the listener that turns the events into [`crate::Game`]s.

mod reader;
mod writer;

pub use reader::{read_pgn, Annotation, PgnListener};
pub use writer::{format_move_line, is_result_token, write_pgn, MAX_LINE_WIDTH, SEVEN_TAG_ROSTER};
