//! Per-game analysis orchestration.
//!
//! Walks a game's SAN moves, obtains an evaluation for every position
//! (cache first, oracle on miss), classifies each ply, and aggregates
//! the per-player summaries.

use std::str::FromStr;
use std::time::Duration;

use chess::{Board, BoardStatus};
use tracing::{info, warn};

use analyzer_core::accuracy::aggregate;
use analyzer_core::classify::{classify, MoveContext};
use analyzer_core::eval::{EngineLine, Evaluation, Score};
use analyzer_core::key::PositionKey;
use analyzer_core::record::{GameAnalysis, MoveRecord};

use crate::cache::{EvalCache, Lookup};
use crate::config::WorkerConfig;
use crate::engine::Oracle;
use crate::error::WorkerError;
use crate::games::GameRecord;
use crate::san;

/// Analyze one game. An illegal move list fails the whole game; an
/// exhausted oracle fails only the plies touching the lost position,
/// which come back labeled `Unanalyzed`.
pub async fn analyze_game<O: Oracle>(
    oracle: &mut O,
    cache: &EvalCache,
    config: &WorkerConfig,
    game: &GameRecord,
) -> Result<GameAnalysis, WorkerError> {
    let mut board = match game.starting_fen.as_deref() {
        Some(fen) => Board::from_str(fen).map_err(|_| {
            WorkerError::InvalidGame(format!("game {}: bad starting FEN {fen}", game.id))
        })?,
        None => Board::default(),
    };
    let mut records = Vec::with_capacity(game.moves.len());

    for (index, token) in game.moves.iter().enumerate() {
        let ply = index + 1;
        let mover = board.side_to_move();
        let is_white = mover == chess::Color::White;
        let fen_before = board.to_string();

        let mv = san::resolve(&board, token).map_err(|e| match e {
            WorkerError::InvalidGame(msg) => {
                WorkerError::InvalidGame(format!("game {} ply {ply}: {msg}", game.id))
            }
            other => other,
        })?;
        let uci = mv.to_string();
        let board_after = board.make_move_new(mv);
        let fen_after = board_after.to_string();

        let eval_before = evaluate_cached(oracle, cache, config, &board).await?;
        let eval_after = position_eval(oracle, cache, config, &board_after).await?;

        let record = match (eval_before, eval_after) {
            (Some(before), Some(after)) => {
                let ctx = MoveContext {
                    before: &before,
                    after: &after,
                    mover,
                    played_uci: &uci,
                    board_before: &board,
                    board_after: &board_after,
                };
                let class = classify(&ctx, &config.classify)?;
                MoveRecord {
                    ply,
                    san: token.clone(),
                    uci,
                    is_white,
                    fen_before,
                    fen_after,
                    best_move: before.best_move().map(String::from),
                    eval_before: Some(before),
                    eval_after: Some(after),
                    label: class.label,
                    cpl: class.cpl,
                    win_percent_loss: class.win_percent_loss,
                    tag: class.tag,
                    is_top_choice: class.is_top_choice,
                }
            }
            _ => {
                warn!(game_id = %game.id, ply, "Ply left unanalyzed");
                MoveRecord::unanalyzed(ply, token.clone(), uci, is_white, fen_before, fen_after)
            }
        };

        records.push(record);
        board = board_after;
    }

    let white_summary = aggregate(&records, true, &config.accuracy);
    let black_summary = aggregate(&records, false, &config.accuracy);
    info!(
        game_id = %game.id,
        plies = records.len(),
        white_accuracy = white_summary.accuracy,
        black_accuracy = black_summary.accuracy,
        "Game analyzed"
    );

    Ok(GameAnalysis {
        game_id: game.id.clone(),
        white: game.white.clone(),
        black: game.black.clone(),
        moves: records,
        white_summary,
        black_summary,
    })
}

/// Evaluation for a position the game reached, including terminal ones
/// the engine cannot search.
async fn position_eval<O: Oracle>(
    oracle: &mut O,
    cache: &EvalCache,
    config: &WorkerConfig,
    board: &Board,
) -> Result<Option<Evaluation>, WorkerError> {
    match board.status() {
        BoardStatus::Ongoing => evaluate_cached(oracle, cache, config, board).await,
        BoardStatus::Checkmate => Ok(Some(terminal_eval(config.depth, Score::Mate(-1)))),
        BoardStatus::Stalemate => Ok(Some(terminal_eval(config.depth, Score::Cp(0)))),
    }
}

/// Synthetic evaluation for a game-over position; there is no move to
/// recommend, only a settled score for the side to move.
fn terminal_eval(depth: u8, score: Score) -> Evaluation {
    Evaluation {
        depth,
        lines: vec![EngineLine {
            mv: String::new(),
            score,
            pv: vec![],
        }],
    }
}

/// Fetch an evaluation through the cache, searching on a miss with
/// retries and exponential backoff. `Ok(None)` means the retry budget
/// ran out; spawn failures abort the game.
async fn evaluate_cached<O: Oracle>(
    oracle: &mut O,
    cache: &EvalCache,
    config: &WorkerConfig,
    board: &Board,
) -> Result<Option<Evaluation>, WorkerError> {
    let key = PositionKey::from_board(board, config.depth);
    let slot = match cache.begin(&key).await {
        Lookup::Hit(eval) => return Ok(Some(eval)),
        Lookup::Miss(slot) => slot,
    };

    let fen = board.to_string();
    let mut outcome = None;
    let mut attempt = 0u32;
    loop {
        match oracle.evaluate(&fen, config.depth).await {
            Ok(eval) => {
                outcome = Some(eval);
                break;
            }
            Err(e) if !e.is_retryable() => return Err(e.into()),
            Err(e) if attempt < config.oracle_retries => {
                attempt += 1;
                let delay = backoff_delay(config.oracle_backoff_ms, attempt);
                warn!(key = %key, error = %e, attempt, delay_ms = delay, "Search failed, retrying");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Search retries exhausted");
                break;
            }
        }
    }

    match outcome {
        Some(eval) => {
            slot.fill(&eval).await;
            Ok(Some(eval))
        }
        // Dropping the unfilled slot lets coalesced waiters try themselves.
        None => Ok(None),
    }
}

/// Exponential backoff with the exponent capped so a large retry budget
/// cannot overflow the shift.
fn backoff_delay(base_ms: u64, attempt: u32) -> u64 {
    let exponent = attempt.saturating_sub(1).min(16);
    base_ms.saturating_mul(1u64 << exponent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(250, 1), 250);
        assert_eq!(backoff_delay(250, 2), 500);
        assert_eq!(backoff_delay(250, 3), 1000);
    }

    #[test]
    fn test_backoff_saturates_for_large_attempts() {
        assert_eq!(backoff_delay(250, 17), 250 << 16);
        assert_eq!(backoff_delay(250, 100), 250 << 16);
        assert_eq!(backoff_delay(u64::MAX, 100), u64::MAX);
    }
}
