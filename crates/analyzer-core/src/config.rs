//! Tunable classification and accuracy thresholds.

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Criteria for tagging a move Brilliant. All thresholds are
/// calibration-sensitive and deliberately configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrilliantCriteria {
    /// Maximum raw CPL for the move to still count as objectively sound.
    pub max_cpl: f64,
    /// Allowed evaluation drop, in centipawns.
    pub eval_drop_leniency_cp: f64,
    /// The position must not already be decisively won.
    pub max_eval_before_cp: f64,
    /// Net material given up, in pawns.
    pub min_sacrifice_pawns: f64,
}

impl Default for BrilliantCriteria {
    fn default() -> Self {
        Self {
            max_cpl: 20.0,
            eval_drop_leniency_cp: 15.0,
            max_eval_before_cp: 350.0,
            min_sacrifice_pawns: 2.5,
        }
    }
}

/// Criteria for tagging a move Great (the only-move pattern).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GreatCriteria {
    /// How much better the top line must be than the runner-up.
    pub min_uniqueness_gain_cp: f64,
}

impl Default for GreatCriteria {
    fn default() -> Self {
        Self {
            min_uniqueness_gain_cp: 120.0,
        }
    }
}

/// CPL thresholds for the standard labels, plus special-tag criteria.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyConfig {
    pub blunder_cpl: f64,
    pub mistake_cpl: f64,
    pub inaccuracy_cpl: f64,
    /// At or below this CPL, the oracle's own first choice is labeled Best.
    pub best_cpl: f64,
    /// Ceiling on reported CPL; losses near forced mate are capped here.
    pub cpl_cap: f64,
    /// Comparing evaluations from different depths is an error unless the
    /// caller opts in.
    pub allow_mixed_depth: bool,
    pub brilliant: BrilliantCriteria,
    pub great: GreatCriteria,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            blunder_cpl: 300.0,
            mistake_cpl: 100.0,
            inaccuracy_cpl: 50.0,
            best_cpl: 5.0,
            cpl_cap: 1000.0,
            allow_mixed_depth: false,
            brilliant: BrilliantCriteria::default(),
            great: GreatCriteria::default(),
        }
    }
}

impl ClassifyConfig {
    /// Threshold misordering is a configuration error, fatal at startup.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let ordered = self.blunder_cpl > self.mistake_cpl
            && self.mistake_cpl > self.inaccuracy_cpl
            && self.inaccuracy_cpl > self.best_cpl
            && self.best_cpl >= 0.0;
        if !ordered {
            return Err(AnalysisError::Config(
                "classification thresholds must satisfy blunder > mistake > inaccuracy > best >= 0",
            ));
        }
        if self.cpl_cap < self.blunder_cpl {
            return Err(AnalysisError::Config(
                "cpl_cap must be at least the blunder threshold",
            ));
        }
        Ok(())
    }
}

/// Accuracy aggregation options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccuracyConfig {
    /// Plies at the start of the game treated as book-like; 0 disables
    /// down-weighting.
    pub opening_plies: usize,
    /// Weight applied to those plies.
    pub opening_weight: f64,
}

impl Default for AccuracyConfig {
    fn default() -> Self {
        Self {
            opening_plies: 0,
            opening_weight: 1.0,
        }
    }
}

impl AccuracyConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(self.opening_weight > 0.0 && self.opening_weight <= 1.0) {
            return Err(AnalysisError::Config(
                "opening_weight must be in (0, 1]",
            ));
        }
        Ok(())
    }
}
