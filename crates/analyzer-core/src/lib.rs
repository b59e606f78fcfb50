//! Pure analysis core: position keys, evaluation types, move
//! classification, and accuracy aggregation.
//!
//! Nothing in this crate performs I/O; the evaluation cache and the
//! engine adapter live in `analyzer-worker`.

pub use chess;

pub mod accuracy;
pub mod classify;
pub mod config;
pub mod error;
pub mod eval;
pub mod key;
pub mod material;
pub mod record;
