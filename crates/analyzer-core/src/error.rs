//! Core analysis error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("invalid position: {0}")]
    InvalidPosition(String),

    #[error("evaluation depth mismatch: before={before}, after={after}")]
    IncompatibleEvaluation { before: u8, after: u8 },

    #[error("configuration error: {0}")]
    Config(&'static str),
}
