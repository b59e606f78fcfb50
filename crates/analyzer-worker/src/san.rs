//! SAN move resolution against a board position.

use chess::{Board, ChessMove, File, MoveGen, Piece, Rank, Square};

use crate::error::WorkerError;

fn invalid(san: &str, reason: &str) -> WorkerError {
    WorkerError::InvalidGame(format!("SAN '{san}': {reason}"))
}

fn piece_from_letter(letter: u8) -> Option<Piece> {
    match letter {
        b'K' => Some(Piece::King),
        b'Q' => Some(Piece::Queen),
        b'R' => Some(Piece::Rook),
        b'B' => Some(Piece::Bishop),
        b'N' => Some(Piece::Knight),
        _ => None,
    }
}

/// King move two files sideways; covers standard castling encoding.
fn find_castling(board: &Board, kingside: bool) -> Option<ChessMove> {
    MoveGen::new_legal(board).find(|m| {
        if board.piece_on(m.get_source()) != Some(Piece::King) {
            return false;
        }
        let src = m.get_source().get_file().to_index() as i32;
        let dst = m.get_dest().get_file().to_index() as i32;
        if kingside {
            dst - src == 2
        } else {
            src - dst == 2
        }
    })
}

/// Resolve a SAN token to the legal move it denotes on `board`.
///
/// Accepts check, mate, and annotation suffixes. A token that matches no
/// legal move, or more than one after disambiguation, is an invalid game.
pub fn resolve(board: &Board, san: &str) -> Result<ChessMove, WorkerError> {
    let clean = san.trim_end_matches(|c: char| c == '+' || c == '#' || c == '!' || c == '?');

    if clean == "O-O" || clean == "0-0" {
        return find_castling(board, true).ok_or_else(|| invalid(san, "no kingside castling"));
    }
    if clean == "O-O-O" || clean == "0-0-0" {
        return find_castling(board, false).ok_or_else(|| invalid(san, "no queenside castling"));
    }

    let bytes = clean.as_bytes();
    if bytes.is_empty() {
        return Err(invalid(san, "empty token"));
    }

    let (piece, rest) = if bytes[0].is_ascii_uppercase() {
        let piece =
            piece_from_letter(bytes[0]).ok_or_else(|| invalid(san, "unknown piece letter"))?;
        (piece, &clean[1..])
    } else {
        (Piece::Pawn, clean)
    };

    let (rest, promotion) = match rest.find('=') {
        Some(eq) => {
            let promo = rest
                .as_bytes()
                .get(eq + 1)
                .copied()
                .and_then(piece_from_letter)
                .ok_or_else(|| invalid(san, "bad promotion piece"))?;
            (&rest[..eq], Some(promo))
        }
        None => (rest, None),
    };

    let rest = rest.replace('x', "");
    let rest_bytes = rest.as_bytes();
    if rest_bytes.len() < 2 {
        return Err(invalid(san, "token too short"));
    }

    let dest_file = rest_bytes[rest_bytes.len() - 2];
    let dest_rank = rest_bytes[rest_bytes.len() - 1];
    if !(b'a'..=b'h').contains(&dest_file) || !(b'1'..=b'8').contains(&dest_rank) {
        return Err(invalid(san, "bad destination square"));
    }
    let dest = Square::make_square(
        Rank::from_index((dest_rank - b'1') as usize),
        File::from_index((dest_file - b'a') as usize),
    );

    let disambig = rest_bytes[..rest_bytes.len() - 2].to_vec();

    let mut candidates: Vec<ChessMove> = MoveGen::new_legal(board)
        .filter(|m| {
            m.get_dest() == dest
                && board.piece_on(m.get_source()) == Some(piece)
                && m.get_promotion() == promotion
        })
        .collect();

    if candidates.len() > 1 && !disambig.is_empty() {
        candidates.retain(|m| {
            let src = m.get_source();
            disambig.iter().all(|&b| match b {
                b'a'..=b'h' => src.get_file().to_index() == (b - b'a') as usize,
                b'1'..=b'8' => src.get_rank().to_index() == (b - b'1') as usize,
                _ => false,
            })
        });
    }

    match candidates.as_slice() {
        [only] => Ok(*only),
        [] => Err(invalid(san, "no matching legal move")),
        _ => Err(invalid(san, "ambiguous")),
    }
}
