//! Per-player accuracy and label aggregation.

use serde::{Deserialize, Serialize};

use crate::classify::{Label, SpecialTag};
use crate::config::AccuracyConfig;
use crate::record::MoveRecord;

// Lichess accuracy curve coefficients.
const ACCURACY_A: f64 = 103.1668;
const ACCURACY_B: f64 = -0.04354;
const ACCURACY_C: f64 = -3.1669;

/// How many moves of each kind a player made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCounts {
    pub best: usize,
    pub good: usize,
    pub inaccuracy: usize,
    pub mistake: usize,
    pub blunder: usize,
    pub unanalyzed: usize,
    pub brilliant: usize,
    pub great: usize,
}

impl LabelCounts {
    pub fn record(&mut self, label: Label, tag: Option<SpecialTag>) {
        match label {
            Label::Best => self.best += 1,
            Label::Good => self.good += 1,
            Label::Inaccuracy => self.inaccuracy += 1,
            Label::Mistake => self.mistake += 1,
            Label::Blunder => self.blunder += 1,
            Label::Unanalyzed => self.unanalyzed += 1,
        }
        match tag {
            Some(SpecialTag::Brilliant) => self.brilliant += 1,
            Some(SpecialTag::Great) => self.great += 1,
            None => {}
        }
    }
}

/// Aggregated quality metrics for one side of one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    /// Weighted accuracy in [0, 100].
    pub accuracy: f64,
    /// Mean capped CPL over analyzed moves.
    pub avg_cpl: f64,
    pub counts: LabelCounts,
}

/// Accuracy of a single move from its win-probability loss (in percent),
/// clamped to [0, 100].
pub fn move_accuracy(win_percent_loss: f64) -> f64 {
    (ACCURACY_A * (ACCURACY_B * win_percent_loss).exp() + ACCURACY_C).clamp(0.0, 100.0)
}

/// Summarize one player's moves. Unanalyzed plies are counted but carry
/// no weight in the accuracy or CPL averages. A side with no analyzed
/// moves scores a vacuous 100.
pub fn aggregate(records: &[MoveRecord], is_white: bool, cfg: &AccuracyConfig) -> PlayerSummary {
    let mut counts = LabelCounts::default();
    let mut weighted_accuracy = 0.0;
    let mut total_weight = 0.0;
    let mut cpl_sum = 0.0;
    let mut analyzed = 0usize;

    for record in records.iter().filter(|r| r.is_white == is_white) {
        counts.record(record.label, record.tag);
        if record.label == Label::Unanalyzed {
            continue;
        }
        let weight = if record.ply <= cfg.opening_plies {
            cfg.opening_weight
        } else {
            1.0
        };
        weighted_accuracy += move_accuracy(record.win_percent_loss) * weight;
        total_weight += weight;
        cpl_sum += record.cpl;
        analyzed += 1;
    }

    let accuracy = if total_weight > 0.0 {
        (weighted_accuracy / total_weight).clamp(0.0, 100.0)
    } else {
        100.0
    };
    let avg_cpl = if analyzed > 0 {
        cpl_sum / analyzed as f64
    } else {
        0.0
    };

    PlayerSummary {
        accuracy,
        avg_cpl,
        counts,
    }
}
