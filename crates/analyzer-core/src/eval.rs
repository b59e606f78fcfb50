//! Engine evaluation values and the centipawn/win-chance transforms.

use serde::{Deserialize, Serialize};

/// Slope of the logistic centipawn -> win-chance model (lichess).
pub const WIN_CHANCE_SLOPE: f64 = 0.003_682_08;

/// Probabilities are clamped this far away from 0 and 1 before the
/// inverse transform, so mate scores stay finite in centipawn units.
const MIN_CHANCE: f64 = 1e-4;

/// Score of a position from the side to move's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Score {
    /// Centipawns, positive favors the side to move.
    Cp(i32),
    /// Mate in N; positive means the side to move mates.
    Mate(i32),
}

impl Score {
    /// Winning chance for the side to move, in [0, 1].
    pub fn win_chance(self) -> f64 {
        match self {
            Score::Cp(cp) => 1.0 / (1.0 + (-WIN_CHANCE_SLOPE * f64::from(cp)).exp()),
            Score::Mate(n) if n > 0 => 1.0,
            Score::Mate(_) => 0.0,
        }
    }

    /// The same score seen by the opponent of the side to move.
    pub fn flipped(self) -> Score {
        match self {
            Score::Cp(cp) => Score::Cp(-cp),
            Score::Mate(n) => Score::Mate(-n),
        }
    }
}

/// Centipawn equivalent of a winning chance, via the inverse logistic.
pub fn cp_equivalent(chance: f64) -> f64 {
    let p = chance.clamp(MIN_CHANCE, 1.0 - MIN_CHANCE);
    (p / (1.0 - p)).ln() / WIN_CHANCE_SLOPE
}

/// One ranked line from a multi-PV search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineLine {
    /// First move of the line, UCI notation.
    #[serde(rename = "move")]
    pub mv: String,
    pub score: Score,
    #[serde(default)]
    pub pv: Vec<String>,
}

/// Result of analyzing one position at one depth. Immutable value
/// object; lines are ordered best-first. Deserialization ignores unknown
/// fields, so cache entries written by newer versions stay readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub depth: u8,
    pub lines: Vec<EngineLine>,
}

impl Evaluation {
    pub fn best(&self) -> Option<&EngineLine> {
        self.lines.first()
    }

    pub fn second(&self) -> Option<&EngineLine> {
        self.lines.get(1)
    }

    /// Score of the best line, for the side to move.
    pub fn score(&self) -> Score {
        self.best().map(|line| line.score).unwrap_or(Score::Cp(0))
    }

    pub fn best_move(&self) -> Option<&str> {
        self.best().map(|line| line.mv.as_str())
    }
}
