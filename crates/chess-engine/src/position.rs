//! Mutable position with incremental make/rollback.
//!
//! The board is kept twice: a 64-cell array for "what is on this square"
//! and per-piece / per-colour bitboards for move generation. Both are updated
//! together by [`Position::force_move`] and [`Position::rollback`], as are the
//! Zobrist hash, the piece counts and the repetition table. Nothing is ever
//! recomputed from scratch during play.

use crate::bitboard::Bitboard;
use crate::error::PositionError;
use crate::movegen::MoveList;
use crate::repetition::RepetitionTable;
use crate::san;
use crate::zobrist::ZOBRIST;
use chess_core::{
    placement_to_fen, CastlingRights, Color, FenRecord, Move, MoveKind, Piece, Placement, Square,
    UciMove,
};
use std::fmt;

#[derive(Clone)]
pub struct Position {
    board: Placement,
    pieces: [Bitboard; 6],
    colors: [Bitboard; 2],
    promoted: Bitboard,
    counts: [[u8; 6]; 2],
    side_to_move: Color,
    castling: CastlingRights,
    en_passant: Option<Square>,
    initial_en_passant: Option<Square>,
    fifty: u32,
    /// Half-moves since the start of the game, derived from the FEN
    /// full-move number and side to move.
    ply: u32,
    start_fen: String,
    hash: u64,
    repetitions: RepetitionTable,
    history: MoveList,
}

impl Position {
    pub fn startpos() -> Self {
        match Self::from_fen(FenRecord::STARTPOS) {
            Ok(pos) => pos,
            Err(_) => unreachable!("start position is legal"),
        }
    }

    /// Parses and validates a FEN.
    ///
    /// Fails with [`PositionError::IllegalPosition`] unless each side has
    /// exactly one king and the side not to move is not in check.
    pub fn from_fen(fen: &str) -> Result<Self, PositionError> {
        let record = FenRecord::parse(fen)?;
        Self::from_record(&record)
    }

    pub fn from_record(record: &FenRecord) -> Result<Self, PositionError> {
        let mut pos = Position {
            board: [None; 64],
            pieces: [Bitboard::EMPTY; 6],
            colors: [Bitboard::EMPTY; 2],
            promoted: Bitboard::EMPTY,
            counts: [[0; 6]; 2],
            side_to_move: record.side_to_move,
            castling: record.castling,
            en_passant: record.en_passant,
            initial_en_passant: record.en_passant,
            fifty: record.halfmove_clock,
            ply: record.fullmove_number.saturating_sub(1) * 2 + record.side_to_move.index() as u32,
            start_fen: record.to_fen(),
            hash: 0,
            repetitions: RepetitionTable::default(),
            history: MoveList::new(),
        };

        for sq in Square::iter() {
            if let Some((piece, color)) = record.placement[sq.idx()] {
                pos.put_piece(sq, piece, color, false);
            }
        }
        if pos.side_to_move == Color::Black {
            pos.hash ^= ZOBRIST.side();
        }
        pos.hash ^= ZOBRIST.castling(pos.castling);
        pos.hash ^= ZOBRIST.en_passant(pos.en_passant);

        for color in Color::BOTH {
            let kings = pos.piece_count(Piece::King, color);
            if kings != 1 {
                return Err(PositionError::IllegalPosition(format!(
                    "{} has {} kings",
                    color, kings
                )));
            }
        }
        if pos.is_king_attacked(pos.side_to_move.opposite()) {
            return Err(PositionError::IllegalPosition(format!(
                "{} is in check but it is {}'s move",
                pos.side_to_move.opposite(),
                pos.side_to_move
            )));
        }

        pos.repetitions.push(pos.hash);
        Ok(pos)
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    #[inline]
    pub fn piece_at(&self, sq: Square) -> Option<(Piece, Color)> {
        self.board[sq.idx()]
    }

    /// Board cell code: the piece code, or-ed with the promoted mask for
    /// pieces that came from a promotion; 0 for an empty square.
    pub fn cell_code(&self, sq: Square) -> u8 {
        match self.board[sq.idx()] {
            Some((piece, _)) if self.promoted.contains(sq) => piece.code() | Piece::PROMOTED_MASK,
            Some((piece, _)) => piece.code(),
            None => 0,
        }
    }

    #[inline]
    pub fn pieces(&self, piece: Piece, color: Color) -> Bitboard {
        self.pieces[piece.index()] & self.colors[color.index()]
    }

    #[inline]
    pub fn color_bb(&self, color: Color) -> Bitboard {
        self.colors[color.index()]
    }

    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.colors[0] | self.colors[1]
    }

    /// Pieces that reached the board through promotion.
    #[inline]
    pub fn promoted(&self) -> Bitboard {
        self.promoted
    }

    #[inline]
    pub fn is_promoted(&self, sq: Square) -> bool {
        self.promoted.contains(sq)
    }

    #[inline]
    pub fn piece_count(&self, piece: Piece, color: Color) -> u8 {
        self.counts[color.index()][piece.index()]
    }

    pub fn king_square(&self, color: Color) -> Option<Square> {
        self.pieces(Piece::King, color).first()
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    #[inline]
    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    #[inline]
    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    #[inline]
    pub fn halfmove_clock(&self) -> u32 {
        self.fifty
    }

    #[inline]
    pub fn ply(&self) -> u32 {
        self.ply
    }

    #[inline]
    pub fn fullmove_number(&self) -> u32 {
        self.ply / 2 + 1
    }

    #[inline]
    pub fn zobrist_hash(&self) -> u64 {
        self.hash
    }

    pub fn history(&self) -> &MoveList {
        &self.history
    }

    pub fn last_move(&self) -> Option<&Move> {
        self.history.last()
    }

    /// FEN the position was created from.
    pub fn start_fen(&self) -> &str {
        &self.start_fen
    }

    pub fn starts_from_standard_position(&self) -> bool {
        self.start_fen == FenRecord::STARTPOS
    }

    /// Times the current position occurred since the last irreversible move,
    /// the current occurrence included.
    pub fn repetition_count(&self) -> usize {
        self.repetitions
            .count_recent(self.hash, self.fifty as usize + 1)
    }

    pub fn is_fifty_move_draw(&self) -> bool {
        self.fifty >= 100
    }

    pub fn to_fen(&self) -> String {
        format!(
            "{} {} {}",
            self.to_fen_position(),
            self.fifty,
            self.fullmove_number()
        )
    }

    /// Placement, side, castling and en passant only.
    pub fn to_fen_position(&self) -> String {
        format!(
            "{} {} {} {}",
            placement_to_fen(&self.board),
            self.side_to_move.to_fen_char(),
            self.castling.to_fen(),
            self.en_passant
                .map(|s| s.to_algebraic())
                .unwrap_or_else(|| "-".to_string())
        )
    }

    /// Hash of the current state computed from nothing. Matches
    /// [`Position::zobrist_hash`] whenever the incremental updates are right.
    pub fn compute_hash_from_scratch(&self) -> u64 {
        let mut hash = 0;
        for sq in Square::iter() {
            if let Some((piece, color)) = self.board[sq.idx()] {
                hash ^= ZOBRIST.piece(piece, color, sq);
            }
        }
        if self.side_to_move == Color::Black {
            hash ^= ZOBRIST.side();
        }
        hash ^ ZOBRIST.castling(self.castling) ^ ZOBRIST.en_passant(self.en_passant)
    }

    /// Cross-checks the board array, bitboards, counts and hash.
    pub fn is_consistent(&self) -> bool {
        let mut pieces = [Bitboard::EMPTY; 6];
        let mut colors = [Bitboard::EMPTY; 2];
        let mut counts = [[0u8; 6]; 2];
        for sq in Square::iter() {
            if let Some((piece, color)) = self.board[sq.idx()] {
                pieces[piece.index()].set(sq);
                colors[color.index()].set(sq);
                counts[color.index()][piece.index()] += 1;
            }
        }
        pieces == self.pieces
            && colors == self.colors
            && counts == self.counts
            && (self.promoted & !self.occupied()).is_empty()
            && self.hash == self.compute_hash_from_scratch()
    }

    // ---------------------------------------------------------------------
    // Make / rollback
    // ---------------------------------------------------------------------

    fn put_piece(&mut self, sq: Square, piece: Piece, color: Color, promoted: bool) {
        self.board[sq.idx()] = Some((piece, color));
        self.pieces[piece.index()].toggle(sq);
        self.colors[color.index()].toggle(sq);
        if promoted {
            self.promoted.toggle(sq);
        }
        self.counts[color.index()][piece.index()] += 1;
        self.hash ^= ZOBRIST.piece(piece, color, sq);
    }

    /// Clears a square, returning what was there and whether it was a
    /// promoted piece.
    fn remove_piece(&mut self, sq: Square) -> Option<(Piece, Color, bool)> {
        let (piece, color) = self.board[sq.idx()].take()?;
        self.pieces[piece.index()].toggle(sq);
        self.colors[color.index()].toggle(sq);
        let was_promoted = self.promoted.contains(sq);
        if was_promoted {
            self.promoted.toggle(sq);
        }
        self.counts[color.index()][piece.index()] -= 1;
        self.hash ^= ZOBRIST.piece(piece, color, sq);
        Some((piece, color, was_promoted))
    }

    /// Plays `m` without any legality check.
    ///
    /// `m` must come from this position's move generator (or describe the
    /// same state change); the caller is responsible for legality.
    pub fn force_move(&mut self, m: Move) {
        let us = m.color();

        self.hash ^= ZOBRIST.castling(self.castling) ^ ZOBRIST.en_passant(self.en_passant);

        if m.is_capture() {
            self.remove_piece(m.capture_square());
        }
        let mover_promoted = self
            .remove_piece(m.from())
            .map(|(_, _, promoted)| promoted)
            .unwrap_or(false);
        match m.promotion() {
            Some(target) => self.put_piece(m.to(), target, us, true),
            None => self.put_piece(m.to(), m.piece(), us, mover_promoted),
        }
        if let Some((rook_from, rook_to)) = m.rook_squares() {
            if let Some((rook, color, promoted)) = self.remove_piece(rook_from) {
                self.put_piece(rook_to, rook, color, promoted);
            }
        }

        self.castling = self
            .castling
            .without(CastlingRights::lost_on(m.from()) | CastlingRights::lost_on(m.to()));
        self.en_passant = double_push_target(&m);
        self.fifty = if m.piece() == Piece::Pawn || m.is_capture() {
            0
        } else {
            self.fifty + 1
        };
        self.side_to_move = us.opposite();
        self.ply += 1;

        self.hash ^= ZOBRIST.side();
        self.hash ^= ZOBRIST.castling(self.castling) ^ ZOBRIST.en_passant(self.en_passant);

        self.repetitions.push(self.hash);
        self.history.push(m);
    }

    /// Undoes the last move, returning it. `None` at the start of the game.
    pub fn rollback(&mut self) -> Option<Move> {
        let m = self.history.pop()?;
        let us = m.color();
        self.repetitions.pop();

        self.hash ^= ZOBRIST.side();
        self.hash ^= ZOBRIST.castling(self.castling) ^ ZOBRIST.en_passant(self.en_passant);

        if let Some((rook_from, rook_to)) = m.rook_squares() {
            if let Some((rook, color, promoted)) = self.remove_piece(rook_to) {
                self.put_piece(rook_from, rook, color, promoted);
            }
        }
        let landed = self.remove_piece(m.to());
        let mover_promoted = m.promotion().is_none()
            && landed.map(|(_, _, promoted)| promoted).unwrap_or(false);
        self.put_piece(m.from(), m.piece(), us, mover_promoted);
        if let Some(captured) = m.captured() {
            self.put_piece(
                m.capture_square(),
                captured,
                us.opposite(),
                m.captured_was_promoted(),
            );
        }

        self.side_to_move = us;
        self.ply -= 1;
        self.fifty = m.prev_fifty();
        self.castling = m.prev_castling();
        self.en_passant = match self.history.last() {
            Some(prev) => double_push_target(prev),
            None => self.initial_en_passant,
        };

        self.hash ^= ZOBRIST.castling(self.castling) ^ ZOBRIST.en_passant(self.en_passant);
        Some(m)
    }

    /// Plays the unique legal move matching from/to/promotion.
    pub fn make_move(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<Piece>,
    ) -> Result<(), PositionError> {
        let describe = || UciMove { from, to, promotion }.to_string();
        let mut candidates: Vec<Move> = self
            .generate_legal_moves()
            .into_iter()
            .filter(|m| m.from() == from && m.to() == to)
            .filter(|m| promotion.is_none() || m.promotion() == promotion)
            .collect();
        match candidates.len() {
            0 => Err(PositionError::InvalidMove(describe())),
            1 => {
                if let Some(m) = candidates.pop() {
                    self.force_move(m);
                }
                Ok(())
            }
            _ => Err(PositionError::AmbiguousMove(describe())),
        }
    }

    /// Plays a move given in long algebraic form (`e2e4`, `e7e8q`).
    pub fn make_uci_move(&mut self, uci: &str) -> Result<(), PositionError> {
        let parsed =
            UciMove::parse(uci).ok_or_else(|| PositionError::InvalidMove(uci.to_string()))?;
        self.make_move(parsed.from, parsed.to, parsed.promotion)
    }

    /// Plays a move given in SAN. Input is normalised first, so `exd5`,
    /// `ed5`, `e4xd5`, `Nf3+` and `0-0` are all understood.
    pub fn make_san_move(&mut self, text: &str) -> Result<(), PositionError> {
        let m = san::resolve(self, text)?;
        self.force_move(m);
        Ok(())
    }

    /// SAN of every move played so far, computing and caching any that are
    /// missing.
    pub fn history_sans(&mut self) -> Vec<String> {
        let mut undone = Vec::with_capacity(self.history.len());
        while let Some(m) = self.rollback() {
            undone.push(m);
        }
        let mut sans = Vec::with_capacity(undone.len());
        while let Some(m) = undone.pop() {
            sans.push(m.san_or_init(|| san::to_san(self, &m)).to_string());
            self.force_move(m);
        }
        sans
    }

    /// SAN of a move that has not been played yet.
    pub fn san_of(&mut self, m: &Move) -> String {
        san::to_san(self, m)
    }
}

/// En-passant target square left behind by `m`.
fn double_push_target(m: &Move) -> Option<Square> {
    if m.kind() == MoveKind::DoublePush {
        Some(Square::at(m.from().file(), (m.from().rank() + m.to().rank()) / 2))
    } else {
        None
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position({})", self.to_fen())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in (0..8u8).rev() {
            write!(f, "{} ", rank + 1)?;
            for file in 0..8u8 {
                let c = match self.board[Square::at(file, rank).idx()] {
                    Some((piece, color)) => piece.to_fen_char(color),
                    None => '.',
                };
                write!(f, "{} ", c)?;
            }
            writeln!(f)?;
        }
        writeln!(f, "  a b c d e f g h")
    }
}
