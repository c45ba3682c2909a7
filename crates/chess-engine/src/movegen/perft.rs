//! Perft: leaf counts of the legal move tree, compared against published
//! values to validate generation and make/rollback.

use crate::Position;

pub fn perft(position: &mut Position, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let moves = position.generate_legal_moves();
    if depth == 1 {
        return moves.len() as u64;
    }
    let mut nodes = 0;
    for m in moves {
        position.force_move(m);
        nodes += perft(position, depth - 1);
        position.rollback();
    }
    nodes
}

/// Per-root-move leaf counts, sorted by UCI text.
pub fn perft_divide(position: &mut Position, depth: u32) -> Vec<(String, u64)> {
    let mut results = Vec::new();
    for m in position.generate_legal_moves() {
        let uci = m.to_uci();
        position.force_move(m);
        let nodes = if depth > 1 {
            perft(position, depth - 1)
        } else {
            1
        };
        position.rollback();
        results.push((uci, nodes));
    }
    results.sort();
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
    const POSITION_3: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
    const POSITION_4: &str = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";
    const POSITION_5: &str = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8";

    fn check(fen: &str, expected: &[u64]) {
        let mut pos = Position::from_fen(fen).unwrap();
        let before = pos.to_fen();
        for (i, &nodes) in expected.iter().enumerate() {
            assert_eq!(perft(&mut pos, i as u32 + 1), nodes, "{fen} depth {}", i + 1);
        }
        assert_eq!(pos.to_fen(), before);
        assert!(pos.is_consistent());
    }

    #[test]
    fn startpos() {
        check(chess_core::FenRecord::STARTPOS, &[20, 400, 8902]);
    }

    #[test]
    #[ignore = "slow in debug builds"]
    fn startpos_depth_4() {
        check(chess_core::FenRecord::STARTPOS, &[20, 400, 8902, 197_281]);
    }

    #[test]
    fn kiwipete() {
        check(KIWIPETE, &[48, 2039]);
    }

    #[test]
    #[ignore = "slow in debug builds"]
    fn kiwipete_depth_3() {
        check(KIWIPETE, &[48, 2039, 97_862]);
    }

    #[test]
    fn position_3() {
        check(POSITION_3, &[14, 191, 2812]);
    }

    #[test]
    fn position_4() {
        check(POSITION_4, &[6, 264, 9467]);
    }

    #[test]
    fn position_5() {
        check(POSITION_5, &[44, 1486]);
    }

    #[test]
    #[ignore = "slow in debug builds"]
    fn position_5_depth_3() {
        check(POSITION_5, &[44, 1486, 62_379]);
    }

    #[test]
    fn divide_sums_to_perft() {
        let mut pos = Position::startpos();
        let divided = perft_divide(&mut pos, 2);
        assert_eq!(divided.len(), 20);
        assert_eq!(divided.iter().map(|(_, n)| n).sum::<u64>(), 400);
        assert_eq!(divided[0].0, "a2a3");
    }
}
