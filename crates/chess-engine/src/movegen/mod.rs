//! Move generation.
//!
//! Pseudo-legal generation produces every move obeying piece movement rules
//! (castling already checked against attacked squares). Legal generation
//! then plays each candidate, drops those leaving the mover's king attacked
//! and rolls back.

pub mod attacks;
pub mod perft;

use crate::bitboard::Bitboard;
use crate::Position;
use attacks::{
    bishop_attacks, king_attacks, knight_attacks, pawn_attacks, piece_attacks, rook_attacks,
};
use chess_core::{Color, Move, MoveKind, Piece, Square};

/// Moves played so far, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveList(Vec<Move>);

impl MoveList {
    pub const fn new() -> Self {
        MoveList(Vec::new())
    }

    #[inline]
    pub fn push(&mut self, m: Move) {
        self.0.push(m);
    }

    #[inline]
    pub fn pop(&mut self) -> Option<Move> {
        self.0.pop()
    }

    #[inline]
    pub fn last(&self) -> Option<&Move> {
        self.0.last()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Move] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Move> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a MoveList {
    type Item = &'a Move;
    type IntoIter = std::slice::Iter<'a, Move>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Pseudo-legal candidates split into captures/promotions and quiet moves.
#[derive(Debug, Clone, Default)]
pub struct PriorityMoveList {
    high: Vec<Move>,
    low: Vec<Move>,
}

impl PriorityMoveList {
    pub fn new() -> Self {
        PriorityMoveList {
            high: Vec::with_capacity(16),
            low: Vec::with_capacity(48),
        }
    }

    pub fn push(&mut self, m: Move) {
        if m.is_high_priority() {
            self.high.push(m);
        } else {
            self.low.push(m);
        }
    }

    pub fn high(&self) -> &[Move] {
        &self.high
    }

    pub fn low(&self) -> &[Move] {
        &self.low
    }

    pub fn len(&self) -> usize {
        self.high.len() + self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.high.is_empty() && self.low.is_empty()
    }

    /// High-priority moves first, then quiet ones.
    pub fn iter(&self) -> impl Iterator<Item = &Move> {
        self.high.iter().chain(self.low.iter())
    }
}

impl IntoIterator for PriorityMoveList {
    type Item = Move;
    type IntoIter = std::iter::Chain<std::vec::IntoIter<Move>, std::vec::IntoIter<Move>>;

    fn into_iter(self) -> Self::IntoIter {
        self.high.into_iter().chain(self.low)
    }
}

impl Position {
    /// Every piece of `by` attacking `sq`.
    pub fn attackers_of(&self, sq: Square, by: Color) -> Bitboard {
        let occupied = self.occupied();
        let rook_like = self.pieces(Piece::Rook, by) | self.pieces(Piece::Queen, by);
        let bishop_like = self.pieces(Piece::Bishop, by) | self.pieces(Piece::Queen, by);
        (pawn_attacks(sq, by.opposite()) & self.pieces(Piece::Pawn, by))
            | (knight_attacks(sq) & self.pieces(Piece::Knight, by))
            | (king_attacks(sq) & self.pieces(Piece::King, by))
            | (rook_attacks(sq, occupied) & rook_like)
            | (bishop_attacks(sq, occupied) & bishop_like)
    }

    #[inline]
    pub fn is_square_attacked(&self, sq: Square, by: Color) -> bool {
        self.attackers_of(sq, by).any()
    }

    pub fn is_king_attacked(&self, color: Color) -> bool {
        match self.king_square(color) {
            Some(king) => self.is_square_attacked(king, color.opposite()),
            None => false,
        }
    }

    /// Whether the side to move is in check.
    pub fn is_check(&self) -> bool {
        self.is_king_attacked(self.side_to_move())
    }

    pub fn generate_pseudo_legal_moves(&self) -> PriorityMoveList {
        let mut list = PriorityMoveList::new();
        self.pawn_moves(&mut list);
        self.piece_moves(&mut list);
        self.castling_moves(&mut list);
        list
    }

    /// Legal moves in generation order: captures and promotions first.
    pub fn generate_legal_moves(&mut self) -> Vec<Move> {
        let us = self.side_to_move();
        let candidates = self.generate_pseudo_legal_moves();
        let mut legal = Vec::with_capacity(candidates.len());
        for m in candidates {
            self.force_move(m);
            let safe = !self.is_king_attacked(us);
            if let Some(m) = self.rollback() {
                if safe {
                    legal.push(m);
                }
            }
        }
        legal
    }

    pub fn has_legal_moves(&mut self) -> bool {
        let us = self.side_to_move();
        for m in self.generate_pseudo_legal_moves() {
            self.force_move(m);
            let safe = !self.is_king_attacked(us);
            self.rollback();
            if safe {
                return true;
            }
        }
        false
    }

    pub fn is_checkmate(&mut self) -> bool {
        self.is_check() && !self.has_legal_moves()
    }

    pub fn is_stalemate(&mut self) -> bool {
        !self.is_check() && !self.has_legal_moves()
    }

    fn new_move(&self, from: Square, to: Square, piece: Piece, kind: MoveKind) -> Move {
        let m = Move::new(from, to, piece, self.side_to_move(), kind)
            .with_prior_state(self.castling(), self.halfmove_clock());
        match self.piece_at(to) {
            Some((captured, _)) if kind != MoveKind::EnPassant => {
                m.with_capture(captured, self.is_promoted(to))
            }
            _ => m,
        }
    }

    fn push_pawn_move(&self, list: &mut PriorityMoveList, from: Square, to: Square) {
        if to.rank() == self.side_to_move().promotion_rank() {
            for target in Piece::PROMOTIONS {
                list.push(
                    self.new_move(from, to, Piece::Pawn, MoveKind::Normal)
                        .with_promotion(target),
                );
            }
        } else {
            list.push(self.new_move(from, to, Piece::Pawn, MoveKind::Normal));
        }
    }

    fn pawn_moves(&self, list: &mut PriorityMoveList) {
        let us = self.side_to_move();
        let them = us.opposite();
        let occupied = self.occupied();
        let enemy = self.color_bb(them);
        let enemy_pawns = self.pieces(Piece::Pawn, them);

        for from in self.pieces(Piece::Pawn, us) {
            if let Some(one) = from.offset(0, us.forward()) {
                if !occupied.contains(one) {
                    self.push_pawn_move(list, from, one);
                    if from.rank() == us.pawn_rank() {
                        if let Some(two) = one.offset(0, us.forward()) {
                            if !occupied.contains(two) {
                                list.push(self.new_move(
                                    from,
                                    two,
                                    Piece::Pawn,
                                    MoveKind::DoublePush,
                                ));
                            }
                        }
                    }
                }
            }

            let hits = pawn_attacks(from, us);
            for to in hits & enemy {
                self.push_pawn_move(list, from, to);
            }

            if let Some(ep) = self.en_passant() {
                let victim = Square::at(ep.file(), from.rank());
                if hits.contains(ep) && !occupied.contains(ep) && enemy_pawns.contains(victim) {
                    list.push(
                        self.new_move(from, ep, Piece::Pawn, MoveKind::EnPassant)
                            .with_capture(Piece::Pawn, false),
                    );
                }
            }
        }
    }

    fn piece_moves(&self, list: &mut PriorityMoveList) {
        let us = self.side_to_move();
        let own = self.color_bb(us);
        let occupied = self.occupied();
        for piece in [
            Piece::Knight,
            Piece::Bishop,
            Piece::Rook,
            Piece::Queen,
            Piece::King,
        ] {
            for from in self.pieces(piece, us) {
                for to in piece_attacks(piece, from, occupied) & !own {
                    list.push(self.new_move(from, to, piece, MoveKind::Normal));
                }
            }
        }
    }

    fn castling_moves(&self, list: &mut PriorityMoveList) {
        let us = self.side_to_move();
        let them = us.opposite();
        let rank = us.home_rank();
        let king = Square::at(4, rank);
        let rights = self.castling();

        if self.piece_at(king) != Some((Piece::King, us)) {
            return;
        }
        if !rights.can_castle_short(us) && !rights.can_castle_long(us) {
            return;
        }
        if self.is_square_attacked(king, them) {
            return;
        }

        let occupied = self.occupied();
        let empty = |files: &[u8]| files.iter().all(|&f| !occupied.contains(Square::at(f, rank)));
        let safe = |files: &[u8]| {
            files
                .iter()
                .all(|&f| !self.is_square_attacked(Square::at(f, rank), them))
        };
        let rook_on = |file: u8| self.piece_at(Square::at(file, rank)) == Some((Piece::Rook, us));

        if rights.can_castle_short(us) && rook_on(7) && empty(&[5, 6]) && safe(&[5, 6]) {
            list.push(self.new_move(king, Square::at(6, rank), Piece::King, MoveKind::CastleShort));
        }
        if rights.can_castle_long(us) && rook_on(0) && empty(&[1, 2, 3]) && safe(&[2, 3]) {
            list.push(self.new_move(king, Square::at(2, rank), Piece::King, MoveKind::CastleLong));
        }
    }
}
