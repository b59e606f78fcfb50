//! Analysis report output.

use std::path::Path;

use tracing::info;

use analyzer_core::record::GameAnalysis;

use crate::cache::CacheStats;
use crate::error::WorkerError;

/// Write the full run's analyses as pretty-printed JSON.
pub async fn write_report(path: &Path, analyses: &[GameAnalysis]) -> Result<(), WorkerError> {
    let payload = serde_json::to_vec_pretty(analyses)?;
    tokio::fs::write(path, payload).await?;
    info!(path = %path.display(), games = analyses.len(), "Report written");
    Ok(())
}

/// One summary line per run; hit rate against all cache reads.
pub fn log_run_summary(stats: CacheStats, games_analyzed: usize, games_failed: usize) {
    let reads = stats.hits + stats.misses;
    let hit_rate = if reads > 0 {
        stats.hits as f64 / reads as f64 * 100.0
    } else {
        0.0
    };
    info!(
        games_analyzed,
        games_failed,
        cache_hits = stats.hits,
        cache_misses = stats.misses,
        cache_stores = stats.stores,
        hit_rate_pct = %format!("{hit_rate:.1}"),
        "Run complete"
    );
}
