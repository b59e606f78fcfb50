//! Per-move classification: centipawn loss, labels, and special tags.

use chess::{Board, Color};
use serde::{Deserialize, Serialize};

use crate::config::ClassifyConfig;
use crate::error::AnalysisError;
use crate::eval::{cp_equivalent, Evaluation, Score};
use crate::material::material_diff;

/// Quality label for one ply. Exactly one label per analyzed ply;
/// `Unanalyzed` is the sentinel for plies whose oracle calls exhausted
/// their retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Best,
    Good,
    Inaccuracy,
    Mistake,
    Blunder,
    Unanalyzed,
}

impl Label {
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Best => "best",
            Label::Good => "good",
            Label::Inaccuracy => "inaccuracy",
            Label::Mistake => "mistake",
            Label::Blunder => "blunder",
            Label::Unanalyzed => "unanalyzed",
        }
    }
}

/// Heuristic highlight on top of the standard label, never on blunders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialTag {
    Brilliant,
    Great,
}

/// Output of classifying a single ply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: Label,
    /// Capped centipawn loss used for metrics, always >= 0.
    pub cpl: f64,
    /// Win-probability loss in percent, feeds the accuracy curve.
    pub win_percent_loss: f64,
    pub tag: Option<SpecialTag>,
    pub is_top_choice: bool,
    pub is_top_n_choice: bool,
}

/// Everything the classifier needs to judge one ply. Classification is a
/// pure function of this tuple; no other ply is consulted.
pub struct MoveContext<'a> {
    /// Evaluation of the position before the move; side to move is the mover.
    pub before: &'a Evaluation,
    /// Evaluation of the position after the move; side to move is the opponent.
    pub after: &'a Evaluation,
    pub mover: Color,
    /// The move that was played, UCI notation.
    pub played_uci: &'a str,
    pub board_before: &'a Board,
    pub board_after: &'a Board,
}

pub fn classify(
    ctx: &MoveContext<'_>,
    cfg: &ClassifyConfig,
) -> Result<Classification, AnalysisError> {
    if ctx.before.depth != ctx.after.depth && !cfg.allow_mixed_depth {
        return Err(AnalysisError::IncompatibleEvaluation {
            before: ctx.before.depth,
            after: ctx.after.depth,
        });
    }

    // Both win chances from the mover's point of view; the after-eval is
    // reported for the opponent and gets flipped.
    let chance_before = ctx.before.score().win_chance();
    let chance_after = ctx.after.score().flipped().win_chance();

    let raw_cpl = cp_equivalent(chance_before) - cp_equivalent(chance_after);
    let cpl = raw_cpl.max(0.0).min(cfg.cpl_cap);
    let win_percent_loss = ((chance_before - chance_after) * 100.0).max(0.0);

    let is_top_choice = ctx.before.best_move() == Some(ctx.played_uci);
    let is_top_n_choice =
        is_top_choice || ctx.before.lines.iter().any(|line| line.mv == ctx.played_uci);

    let label = if cpl >= cfg.blunder_cpl {
        Label::Blunder
    } else if cpl >= cfg.mistake_cpl {
        Label::Mistake
    } else if cpl >= cfg.inaccuracy_cpl {
        Label::Inaccuracy
    } else if cpl <= cfg.best_cpl && is_top_choice {
        Label::Best
    } else {
        Label::Good
    };

    let tag = if label == Label::Blunder {
        None
    } else if let Some(tag) = check_brilliant(ctx, cfg, raw_cpl, is_top_choice) {
        Some(tag)
    } else {
        check_great(ctx, cfg, is_top_choice, cpl)
    };

    Ok(Classification {
        label,
        cpl,
        win_percent_loss,
        tag,
        is_top_choice,
        is_top_n_choice,
    })
}

/// Centipawn view of a score with mates saturated at the cap.
fn capped_cp(score: Score, cap: f64) -> f64 {
    match score {
        Score::Cp(cp) => f64::from(cp).clamp(-cap, cap),
        Score::Mate(n) if n > 0 => cap,
        Score::Mate(_) => -cap,
    }
}

/// Brilliant: a sound move the oracle did not rank first, played from a
/// position that was not already decisively won, giving up real material.
fn check_brilliant(
    ctx: &MoveContext<'_>,
    cfg: &ClassifyConfig,
    raw_cpl: f64,
    is_top_choice: bool,
) -> Option<SpecialTag> {
    let criteria = &cfg.brilliant;

    if is_top_choice || raw_cpl > criteria.max_cpl {
        return None;
    }

    match ctx.before.score() {
        // Already delivering mate; nothing left to find.
        Score::Mate(n) if n > 0 => return None,
        Score::Cp(cp) if f64::from(cp) > criteria.max_eval_before_cp => return None,
        _ => {}
    }

    let drop = capped_cp(ctx.before.score(), cfg.cpl_cap)
        - capped_cp(ctx.after.score().flipped(), cfg.cpl_cap);
    if drop > criteria.eval_drop_leniency_cp {
        return None;
    }

    let sacrificed =
        material_diff(ctx.board_before, ctx.mover) - material_diff(ctx.board_after, ctx.mover);
    if sacrificed < criteria.min_sacrifice_pawns {
        return None;
    }

    Some(SpecialTag::Brilliant)
}

/// Great: the mover found the unique strong move. Requires at least two
/// ranked lines and no mate score in either, where CPL is not meaningful.
fn check_great(
    ctx: &MoveContext<'_>,
    cfg: &ClassifyConfig,
    is_top_choice: bool,
    cpl: f64,
) -> Option<SpecialTag> {
    if !is_top_choice || cpl > cfg.best_cpl {
        return None;
    }

    let best = ctx.before.best()?;
    let second = ctx.before.second()?;
    let (Score::Cp(best_cp), Score::Cp(second_cp)) = (best.score, second.score) else {
        return None;
    };

    if f64::from(best_cp - second_cp) < cfg.great.min_uniqueness_gain_cp {
        return None;
    }

    Some(SpecialTag::Great)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::EngineLine;
    use std::str::FromStr;

    fn eval(depth: u8, scores: &[(&str, Score)]) -> Evaluation {
        Evaluation {
            depth,
            lines: scores
                .iter()
                .map(|&(mv, score)| EngineLine {
                    mv: mv.to_string(),
                    score,
                    pv: vec![],
                })
                .collect(),
        }
    }

    fn ctx<'a>(
        before: &'a Evaluation,
        after: &'a Evaluation,
        played: &'a str,
        boards: &'a (Board, Board),
    ) -> MoveContext<'a> {
        MoveContext {
            before,
            after,
            mover: Color::White,
            played_uci: played,
            board_before: &boards.0,
            board_after: &boards.1,
        }
    }

    fn default_boards() -> (Board, Board) {
        (Board::default(), Board::default())
    }

    #[test]
    fn test_hung_queen_is_blunder() {
        // Mover stood at +0.2; after the move the opponent is +5.0.
        let before = eval(18, &[("d1h5", Score::Cp(20))]);
        let after = eval(18, &[("g6h5", Score::Cp(500))]);
        let boards = default_boards();
        let class = classify(&ctx(&before, &after, "d1h5", &boards), &ClassifyConfig::default())
            .unwrap();
        assert_eq!(class.label, Label::Blunder);
        assert!(class.cpl >= 300.0);
        assert_eq!(class.tag, None);
    }

    #[test]
    fn test_cpl_bounded_by_cap() {
        let cfg = ClassifyConfig::default();
        // Throwing away a forced mate: the loss is capped, not unbounded.
        let before = eval(18, &[("h5f7", Score::Mate(2))]);
        let after = eval(18, &[("d8h4", Score::Mate(1))]);
        let boards = default_boards();
        let class = classify(&ctx(&before, &after, "a2a3", &boards), &cfg).unwrap();
        assert_eq!(class.cpl, cfg.cpl_cap);
        assert_eq!(class.label, Label::Blunder);
    }

    #[test]
    fn test_cpl_never_negative() {
        // The move improved the position; CPL floors at zero.
        let before = eval(18, &[("e2e4", Score::Cp(-50))]);
        let after = eval(18, &[("e7e5", Score::Cp(-120))]);
        let boards = default_boards();
        let class = classify(&ctx(&before, &after, "e2e4", &boards), &ClassifyConfig::default())
            .unwrap();
        assert_eq!(class.cpl, 0.0);
        assert_eq!(class.win_percent_loss, 0.0);
    }

    #[test]
    fn test_top_choice_low_loss_is_best() {
        let before = eval(18, &[("e2e4", Score::Cp(30))]);
        let after = eval(18, &[("e7e5", Score::Cp(-28))]);
        let boards = default_boards();
        let class = classify(&ctx(&before, &after, "e2e4", &boards), &ClassifyConfig::default())
            .unwrap();
        assert_eq!(class.label, Label::Best);
        assert!(class.is_top_choice);
    }

    #[test]
    fn test_low_loss_off_book_is_good() {
        let before = eval(18, &[("e2e4", Score::Cp(30))]);
        let after = eval(18, &[("e7e5", Score::Cp(-28))]);
        let boards = default_boards();
        let class = classify(&ctx(&before, &after, "d2d4", &boards), &ClassifyConfig::default())
            .unwrap();
        assert_eq!(class.label, Label::Good);
        assert!(!class.is_top_choice);
    }

    #[test]
    fn test_mistake_and_inaccuracy_bands() {
        let cfg = ClassifyConfig::default();
        let boards = default_boards();

        let before = eval(18, &[("e2e4", Score::Cp(0))]);
        let after = eval(18, &[("e7e5", Score::Cp(150))]);
        let class = classify(&ctx(&before, &after, "g2g4", &boards), &cfg).unwrap();
        assert_eq!(class.label, Label::Mistake);

        let after = eval(18, &[("e7e5", Score::Cp(60))]);
        let class = classify(&ctx(&before, &after, "g2g4", &boards), &cfg).unwrap();
        assert_eq!(class.label, Label::Inaccuracy);
    }

    #[test]
    fn test_depth_mismatch_fails_fast() {
        let before = eval(18, &[("e2e4", Score::Cp(0))]);
        let after = eval(12, &[("e7e5", Score::Cp(0))]);
        let boards = default_boards();
        let result = classify(&ctx(&before, &after, "e2e4", &boards), &ClassifyConfig::default());
        assert!(matches!(
            result,
            Err(AnalysisError::IncompatibleEvaluation {
                before: 18,
                after: 12
            })
        ));
    }

    #[test]
    fn test_mixed_depth_allowed_when_configured() {
        let cfg = ClassifyConfig {
            allow_mixed_depth: true,
            ..ClassifyConfig::default()
        };
        let before = eval(18, &[("e2e4", Score::Cp(0))]);
        let after = eval(12, &[("e7e5", Score::Cp(0))]);
        let boards = default_boards();
        assert!(classify(&ctx(&before, &after, "e2e4", &boards), &cfg).is_ok());
    }

    #[test]
    fn test_brilliant_queen_sacrifice() {
        // A second-ranked move that holds the evaluation while giving up
        // the queen.
        let before = eval(18, &[("d2d4", Score::Cp(30)), ("d1h5", Score::Cp(25))]);
        let after = eval(18, &[("g8f6", Score::Cp(-25))]);
        let board_before = Board::default();
        let board_after =
            Board::from_str("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNB1KBNR b KQkq - 0 1").unwrap();
        let boards = (board_before, board_after);
        let class = classify(&ctx(&before, &after, "d1h5", &boards), &ClassifyConfig::default())
            .unwrap();
        assert_eq!(class.tag, Some(SpecialTag::Brilliant));
        assert!(!class.is_top_choice);
    }

    #[test]
    fn test_no_brilliant_without_sacrifice() {
        let before = eval(18, &[("d2d4", Score::Cp(30)), ("g1f3", Score::Cp(25))]);
        let after = eval(18, &[("g8f6", Score::Cp(-25))]);
        let boards = default_boards();
        let class = classify(&ctx(&before, &after, "g1f3", &boards), &ClassifyConfig::default())
            .unwrap();
        assert_eq!(class.tag, None);
    }

    #[test]
    fn test_no_brilliant_when_already_winning() {
        let before = eval(18, &[("d2d4", Score::Cp(600)), ("d1h5", Score::Cp(595))]);
        let after = eval(18, &[("g8f6", Score::Cp(-595))]);
        let board_before = Board::default();
        let board_after =
            Board::from_str("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNB1KBNR b KQkq - 0 1").unwrap();
        let boards = (board_before, board_after);
        let class = classify(&ctx(&before, &after, "d1h5", &boards), &ClassifyConfig::default())
            .unwrap();
        assert_eq!(class.tag, None);
    }

    #[test]
    fn test_great_only_move() {
        // Top line clearly better than the runner-up, and the mover found it.
        let before = eval(18, &[("e2e4", Score::Cp(150)), ("d2d4", Score::Cp(10))]);
        let after = eval(18, &[("e7e5", Score::Cp(-148))]);
        let boards = default_boards();
        let class = classify(&ctx(&before, &after, "e2e4", &boards), &ClassifyConfig::default())
            .unwrap();
        assert_eq!(class.label, Label::Best);
        assert_eq!(class.tag, Some(SpecialTag::Great));
    }

    #[test]
    fn test_no_great_with_single_line() {
        let before = eval(18, &[("e2e4", Score::Cp(150))]);
        let after = eval(18, &[("e7e5", Score::Cp(-148))]);
        let boards = default_boards();
        let class = classify(&ctx(&before, &after, "e2e4", &boards), &ClassifyConfig::default())
            .unwrap();
        assert_eq!(class.tag, None);
    }

    #[test]
    fn test_no_great_when_alternatives_are_close() {
        let before = eval(18, &[("e2e4", Score::Cp(40)), ("d2d4", Score::Cp(35))]);
        let after = eval(18, &[("e7e5", Score::Cp(-39))]);
        let boards = default_boards();
        let class = classify(&ctx(&before, &after, "e2e4", &boards), &ClassifyConfig::default())
            .unwrap();
        assert_eq!(class.tag, None);
    }

    #[test]
    fn test_classification_deterministic() {
        let before = eval(18, &[("e2e4", Score::Cp(37)), ("d2d4", Score::Cp(12))]);
        let after = eval(18, &[("e7e5", Score::Cp(44))]);
        let boards = default_boards();
        let cfg = ClassifyConfig::default();
        let first = classify(&ctx(&before, &after, "b1c3", &boards), &cfg).unwrap();
        let second = classify(&ctx(&before, &after, "b1c3", &boards), &cfg).unwrap();
        assert_eq!(first, second);
    }
}
