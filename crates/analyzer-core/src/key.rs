//! Canonical cache keys for evaluated positions.

use std::fmt;
use std::str::FromStr;

use chess::Board;

use crate::error::AnalysisError;

/// Cache key for one (position, search depth) pair.
///
/// The position part is the first four FEN fields (placement, side to
/// move, castling rights, en-passant target) re-serialized from a parsed
/// board, so move counters and clock fields never influence the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionKey {
    position: String,
    depth: u8,
}

impl PositionKey {
    /// Validates and normalizes a FEN into a key. Malformed input is an
    /// `InvalidPosition` error.
    pub fn normalize(fen: &str, depth: u8) -> Result<Self, AnalysisError> {
        let board = Board::from_str(fen)
            .map_err(|e| AnalysisError::InvalidPosition(format!("{fen}: {e}")))?;
        Ok(Self::from_board(&board, depth))
    }

    /// Key for an already-validated board.
    pub fn from_board(board: &Board, depth: u8) -> Self {
        let fen = board.to_string();
        let position = fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ");
        Self { position, depth }
    }

    /// The normalized position part, without the depth.
    pub fn position(&self) -> &str {
        &self.position
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|d{}", self.position, self.depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn test_clock_fields_ignored() {
        let a = PositionKey::normalize(START, 18).unwrap();
        let b = PositionKey::normalize(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 12 37",
            18,
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_depth_distinguishes_keys() {
        let a = PositionKey::normalize(START, 18).unwrap();
        let b = PositionKey::normalize(START, 20).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.position(), b.position());
    }

    #[test]
    fn test_en_passant_rights_distinguish_keys() {
        // After 1. e4 c5 2. e5 d5 the e5 pawn can capture on d6 en passant.
        let with_ep = "rnbqkbnr/pp2pppp/8/2ppP3/8/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 3";
        let without_ep = "rnbqkbnr/pp2pppp/8/2ppP3/8/8/PPPP1PPP/RNBQKBNR w KQkq - 0 3";
        let a = PositionKey::normalize(with_ep, 18).unwrap();
        let b = PositionKey::normalize(without_ep, 18).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_castling_rights_distinguish_keys() {
        let full = PositionKey::normalize(START, 18).unwrap();
        let partial = PositionKey::normalize(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w Kkq - 0 1",
            18,
        )
        .unwrap();
        assert_ne!(full, partial);
    }

    #[test]
    fn test_malformed_fen_rejected() {
        let result = PositionKey::normalize("not a position", 18);
        assert!(matches!(result, Err(AnalysisError::InvalidPosition(_))));
    }

    #[test]
    fn test_display_contains_depth() {
        let key = PositionKey::normalize(START, 18).unwrap();
        assert!(key.to_string().ends_with("|d18"));
    }
}
