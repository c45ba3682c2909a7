//! Score presentation and comparison.

use chess_core::Color;
use uci::Score;

/// Centipawn value of a mate in zero; each further move costs 100.
pub const MATE_CP: i32 = 30_000;

/// Total order over scores: mates map to `±(30000 − 100·n)`.
pub fn to_centipawns(score: Score) -> i32 {
    match score {
        Score::Cp(cp) => cp,
        Score::Mate(n) if n > 0 => MATE_CP.saturating_sub(n.saturating_mul(100)),
        Score::Mate(n) => MATE_CP.saturating_add(n.saturating_mul(100)).saturating_neg(),
    }
}

/// Turns an engine score, given for the side to move at `root`, into one
/// from White's point of view.
pub fn white_relative(score: Score, root: Color) -> Score {
    match root {
        Color::White => score,
        Color::Black => score.negate(),
    }
}

/// `+0.35`, `-1.20`, `+0.00`, `+M3`, `-M2`.
pub fn display(score: Score) -> String {
    match score {
        Score::Cp(cp) => {
            let sign = if cp < 0 { '-' } else { '+' };
            let abs = cp.unsigned_abs();
            format!("{sign}{}.{:02}", abs / 100, abs % 100)
        }
        Score::Mate(n) if n > 0 => format!("+M{n}"),
        Score::Mate(n) => format!("-M{}", n.unsigned_abs()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_pawns() {
        assert_eq!(display(Score::Cp(35)), "+0.35");
        assert_eq!(display(Score::Cp(-120)), "-1.20");
        assert_eq!(display(Score::Cp(0)), "+0.00");
        assert_eq!(display(Score::Cp(-5)), "-0.05");
        assert_eq!(display(Score::Cp(1234)), "+12.34");
    }

    #[test]
    fn displays_mates() {
        assert_eq!(display(Score::Mate(3)), "+M3");
        assert_eq!(display(Score::Mate(-2)), "-M2");
    }

    #[test]
    fn mates_outrank_material() {
        assert_eq!(to_centipawns(Score::Mate(1)), 29_900);
        assert_eq!(to_centipawns(Score::Mate(-3)), -29_700);
        assert!(to_centipawns(Score::Mate(2)) > to_centipawns(Score::Mate(5)));
        assert!(to_centipawns(Score::Mate(5)) > to_centipawns(Score::Cp(2_000)));
        assert!(to_centipawns(Score::Mate(-5)) < to_centipawns(Score::Cp(-2_000)));
    }

    #[test]
    fn absurd_mate_distances_saturate() {
        assert_eq!(to_centipawns(Score::Mate(i32::MAX)), MATE_CP - i32::MAX);
        assert_eq!(to_centipawns(Score::Mate(i32::MIN)), i32::MAX - MATE_CP + 1);
        assert!(to_centipawns(Score::Mate(1_000_000)) < to_centipawns(Score::Mate(1)));
        assert!(to_centipawns(Score::Mate(-1_000_000)) > to_centipawns(Score::Mate(-1)));
    }

    #[test]
    fn flips_for_black() {
        assert_eq!(white_relative(Score::Cp(40), Color::White), Score::Cp(40));
        assert_eq!(white_relative(Score::Cp(40), Color::Black), Score::Cp(-40));
        assert_eq!(white_relative(Score::Mate(2), Color::Black), Score::Mate(-2));
    }
}
