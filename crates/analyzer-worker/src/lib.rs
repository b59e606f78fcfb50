//! Game analysis worker: evaluation cache, UCI engine pool, and the
//! per-game orchestration that turns move lists into analysis reports.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod games;
pub mod orchestrator;
pub mod pool;
pub mod report;
pub mod san;
