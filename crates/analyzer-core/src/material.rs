//! Material accounting for sacrifice detection.

use chess::{Board, Color, Piece};

pub const PAWN_VALUE: f64 = 1.0;
pub const KNIGHT_VALUE: f64 = 3.0;
/// Slightly above a knight so minor-piece trades register.
pub const BISHOP_VALUE: f64 = 3.2;
pub const ROOK_VALUE: f64 = 5.0;
pub const QUEEN_VALUE: f64 = 9.0;

/// Pawn-unit value of a piece (kings carry none).
pub fn piece_value(piece: Piece) -> f64 {
    match piece {
        Piece::Pawn => PAWN_VALUE,
        Piece::Knight => KNIGHT_VALUE,
        Piece::Bishop => BISHOP_VALUE,
        Piece::Rook => ROOK_VALUE,
        Piece::Queen => QUEEN_VALUE,
        Piece::King => 0.0,
    }
}

/// Total material for one side, in pawns.
pub fn material_count(board: &Board, color: Color) -> f64 {
    let color_bb = *board.color_combined(color);
    [
        Piece::Pawn,
        Piece::Knight,
        Piece::Bishop,
        Piece::Rook,
        Piece::Queen,
    ]
    .iter()
    .map(|&piece| f64::from((*board.pieces(piece) & color_bb).popcnt()) * piece_value(piece))
    .sum()
}

/// Material balance from `color`'s perspective (positive = ahead).
pub fn material_diff(board: &Board, color: Color) -> f64 {
    material_count(board, color) - material_count(board, !color)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_starting_position_balanced() {
        let board = Board::default();
        assert!((material_count(&board, Color::White) - 39.4).abs() < 1e-9);
        assert_eq!(material_diff(&board, Color::White), 0.0);
    }

    #[test]
    fn test_queen_odds() {
        let board =
            Board::from_str("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNB1KBNR w KQkq - 0 1").unwrap();
        assert!((material_diff(&board, Color::White) + 9.0).abs() < 1e-9);
        assert!((material_diff(&board, Color::Black) - 9.0).abs() < 1e-9);
    }
}
