//! Worker configuration from environment variables.

use std::env;
use std::str::FromStr;

use analyzer_core::config::{AccuracyConfig, ClassifyConfig};

use crate::engine::EngineOptions;
use crate::error::WorkerError;

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Path to the UCI engine binary
    pub stockfish_path: String,

    /// Fixed search depth per position
    pub depth: u8,

    /// Ranked lines requested per search; at least 2 for uniqueness checks
    pub multipv: u32,

    /// Engine threads per process
    pub engine_threads: u32,

    /// Engine hash table size in MiB
    pub engine_hash_mb: u32,

    /// Evaluation cache file
    pub cache_path: String,

    /// Per-search timeout in seconds
    pub oracle_timeout_secs: u64,

    /// Retries after a retryable oracle failure
    pub oracle_retries: u32,

    /// Base backoff between retries, doubled per attempt
    pub oracle_backoff_ms: u64,

    /// Concurrent game analyses (and engine pool size)
    pub num_workers: usize,

    /// Player whose accuracy gets logged per game, if set
    pub target_player: Option<String>,

    pub classify: ClassifyConfig,
    pub accuracy: AccuracyConfig,
}

/// Parse an env var, falling back to the default when unset or unparsable.
fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            stockfish_path: "/usr/local/bin/stockfish".to_string(),
            depth: 18,
            multipv: 2,
            engine_threads: 1,
            engine_hash_mb: 256,
            cache_path: "eval-cache.db".to_string(),
            oracle_timeout_secs: 30,
            oracle_retries: 2,
            oracle_backoff_ms: 250,
            num_workers: 1,
            target_player: None,
            classify: ClassifyConfig::default(),
            accuracy: AccuracyConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables, validating the
    /// classification thresholds before anything runs.
    pub fn load() -> Result<Self, WorkerError> {
        let defaults = Self::default();

        let mut classify = ClassifyConfig::default();
        classify.blunder_cpl = env_parse("BLUNDER_CPL", classify.blunder_cpl);
        classify.mistake_cpl = env_parse("MISTAKE_CPL", classify.mistake_cpl);
        classify.inaccuracy_cpl = env_parse("INACCURACY_CPL", classify.inaccuracy_cpl);
        classify.best_cpl = env_parse("BEST_CPL", classify.best_cpl);
        classify.cpl_cap = env_parse("CPL_CAP", classify.cpl_cap);

        let mut accuracy = AccuracyConfig::default();
        accuracy.opening_plies = env_parse("OPENING_PLIES", accuracy.opening_plies);
        accuracy.opening_weight = env_parse("OPENING_WEIGHT", accuracy.opening_weight);

        let config = Self {
            stockfish_path: env::var("STOCKFISH_PATH").unwrap_or(defaults.stockfish_path),
            depth: env_parse("ANALYSIS_DEPTH", defaults.depth),
            multipv: env_parse("MULTIPV", defaults.multipv),
            engine_threads: env_parse("ENGINE_THREADS", defaults.engine_threads),
            engine_hash_mb: env_parse("ENGINE_HASH_MB", defaults.engine_hash_mb),
            cache_path: env::var("CACHE_PATH").unwrap_or(defaults.cache_path),
            oracle_timeout_secs: env_parse("ORACLE_TIMEOUT_SECS", defaults.oracle_timeout_secs),
            oracle_retries: env_parse("ORACLE_RETRIES", defaults.oracle_retries),
            oracle_backoff_ms: env_parse("ORACLE_BACKOFF_MS", defaults.oracle_backoff_ms),
            num_workers: env_parse("NUM_WORKERS", num_cpus::get()),
            target_player: env::var("TARGET_PLAYER").ok(),
            classify,
            accuracy,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), WorkerError> {
        if self.depth == 0 {
            return Err(WorkerError::Config("ANALYSIS_DEPTH must be at least 1"));
        }
        if self.multipv < 2 {
            return Err(WorkerError::Config(
                "MULTIPV must be at least 2 for uniqueness checks",
            ));
        }
        if self.num_workers == 0 {
            return Err(WorkerError::Config("NUM_WORKERS must be at least 1"));
        }
        self.classify.validate()?;
        self.accuracy.validate()?;
        Ok(())
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            path: self.stockfish_path.clone(),
            threads: self.engine_threads,
            hash_mb: self.engine_hash_mb,
            multipv: self.multipv,
            timeout_secs: self.oracle_timeout_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(WorkerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_single_pv_rejected() {
        let config = WorkerConfig {
            multipv: 1,
            ..WorkerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(WorkerError::Config(_))
        ));
    }

    #[test]
    fn test_zero_depth_rejected() {
        let config = WorkerConfig {
            depth: 0,
            ..WorkerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
