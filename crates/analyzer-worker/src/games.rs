//! Input game records.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::WorkerError;

/// One game to analyze: players plus the SAN move list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: String,
    pub white: String,
    pub black: String,
    /// SAN tokens in play order.
    pub moves: Vec<String>,
    /// FEN of the starting position; standard start when absent.
    #[serde(default)]
    pub starting_fen: Option<String>,
}

/// Load a JSON array of games from disk.
pub async fn load_games(path: &Path) -> Result<Vec<GameRecord>, WorkerError> {
    let payload = tokio::fs::read_to_string(path).await?;
    let games: Vec<GameRecord> = serde_json::from_str(&payload)?;
    info!(count = games.len(), path = %path.display(), "Games loaded");
    Ok(games)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_record_deserializes() {
        let payload = r#"{
            "id": "g1",
            "white": "alice",
            "black": "bob",
            "moves": ["e4", "e5", "Nf3"]
        }"#;
        let game: GameRecord = serde_json::from_str(payload).unwrap();
        assert_eq!(game.id, "g1");
        assert_eq!(game.moves.len(), 3);
        assert!(game.starting_fen.is_none());
    }

    #[test]
    fn test_custom_starting_position_accepted() {
        let payload = r#"{
            "id": "g2",
            "white": "alice",
            "black": "bob",
            "moves": [],
            "starting_fen": "8/P6k/8/8/8/8/8/K7 w - - 0 1"
        }"#;
        let game: GameRecord = serde_json::from_str(payload).unwrap();
        assert!(game.starting_fen.is_some());
    }
}
