//! Worker error types

use thiserror::Error;

use crate::engine::OracleError;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(&'static str),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] analyzer_core::error::AnalysisError),

    #[error("Invalid game: {0}")]
    InvalidGame(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
