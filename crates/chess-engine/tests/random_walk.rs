//! Random games checking that incremental state matches state rebuilt from
//! scratch.

use chess_engine::{Game, Position};
use proptest::prelude::*;

fn walk(choices: &[usize]) -> Position {
    let mut position = Position::startpos();
    for &choice in choices {
        let moves = position.generate_legal_moves();
        if moves.is_empty() {
            break;
        }
        let m = moves[choice % moves.len()].clone();
        position.force_move(m);
    }
    position
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn hash_and_fen_survive_random_play(choices in prop::collection::vec(any::<usize>(), 0..60)) {
        let position = walk(&choices);
        prop_assert!(position.is_consistent());
        prop_assert_eq!(position.zobrist_hash(), position.compute_hash_from_scratch());

        let fen = position.to_fen();
        let reparsed = Position::from_fen(&fen).unwrap();
        prop_assert_eq!(reparsed.to_fen(), fen);
        prop_assert_eq!(reparsed.zobrist_hash(), position.zobrist_hash());
    }

    #[test]
    fn rollback_restores_start(choices in prop::collection::vec(any::<usize>(), 0..60)) {
        let mut position = walk(&choices);
        let start = Position::startpos();
        while position.rollback().is_some() {}
        prop_assert_eq!(position.to_fen(), start.to_fen());
        prop_assert_eq!(position.zobrist_hash(), start.zobrist_hash());
        prop_assert!(position.is_consistent());
    }

    #[test]
    fn pgn_replays_to_same_position(choices in prop::collection::vec(any::<usize>(), 0..40)) {
        let position = walk(&choices);
        let text = position.to_pgn();
        let game = Game::from_pgn(&text).unwrap();
        prop_assert_eq!(game.position().to_fen(), position.to_fen());
        prop_assert_eq!(game.to_pgn(), text);
    }
}
