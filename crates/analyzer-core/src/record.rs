//! Serializable per-move and per-game analysis records.

use serde::{Deserialize, Serialize};

use crate::accuracy::PlayerSummary;
use crate::classify::{Label, SpecialTag};
use crate::eval::Evaluation;

/// One analyzed ply. Flat on purpose; this is the report row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// 1-based ply number.
    pub ply: usize,
    pub san: String,
    pub uci: String,
    pub is_white: bool,
    pub fen_before: String,
    pub fen_after: String,
    pub eval_before: Option<Evaluation>,
    pub eval_after: Option<Evaluation>,
    pub label: Label,
    pub cpl: f64,
    pub win_percent_loss: f64,
    pub tag: Option<SpecialTag>,
    /// The oracle's first choice in the position before the move.
    pub best_move: Option<String>,
    pub is_top_choice: bool,
}

impl MoveRecord {
    /// Record for a ply whose evaluation could not be obtained. Carries
    /// neutral metrics so aggregation can skip it without special cases.
    pub fn unanalyzed(
        ply: usize,
        san: String,
        uci: String,
        is_white: bool,
        fen_before: String,
        fen_after: String,
    ) -> Self {
        Self {
            ply,
            san,
            uci,
            is_white,
            fen_before,
            fen_after,
            eval_before: None,
            eval_after: None,
            label: Label::Unanalyzed,
            cpl: 0.0,
            win_percent_loss: 0.0,
            tag: None,
            best_move: None,
            is_top_choice: false,
        }
    }
}

/// Full analysis output for one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameAnalysis {
    pub game_id: String,
    pub white: String,
    pub black: String,
    pub moves: Vec<MoveRecord>,
    pub white_summary: PlayerSummary,
    pub black_summary: PlayerSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unanalyzed_record_is_neutral() {
        let record = MoveRecord::unanalyzed(
            3,
            "Nf3".to_string(),
            "g1f3".to_string(),
            true,
            "fen before".to_string(),
            "fen after".to_string(),
        );
        assert_eq!(record.label, Label::Unanalyzed);
        assert_eq!(record.cpl, 0.0);
        assert_eq!(record.tag, None);
        assert!(record.eval_before.is_none());
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let record = MoveRecord::unanalyzed(
            1,
            "e4".to_string(),
            "e2e4".to_string(),
            true,
            "a".to_string(),
            "b".to_string(),
        );
        let json = serde_json::to_string(&record).unwrap();
        let back: MoveRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
