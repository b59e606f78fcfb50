//! Game analysis worker
//!
//! Reads a batch of games, evaluates every position with a pool of UCI
//! engines behind a shared evaluation cache, and writes a JSON report
//! of per-move classifications and per-player accuracy.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use analyzer_core::record::GameAnalysis;
use analyzer_worker::cache::EvalCache;
use analyzer_worker::config::WorkerConfig;
use analyzer_worker::games;
use analyzer_worker::orchestrator;
use analyzer_worker::pool::EnginePool;
use analyzer_worker::report;

struct Args {
    games: PathBuf,
    out: PathBuf,
}

/// Parse --games <path> [--out <path>] from CLI args
fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = std::env::args().collect();
    let mut games = None;
    let mut out = PathBuf::from("analysis-report.json");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--games" => {
                games = args.get(i + 1).map(PathBuf::from);
                i += 2;
            }
            "--out" => {
                if let Some(path) = args.get(i + 1) {
                    out = PathBuf::from(path);
                }
                i += 2;
            }
            other => {
                anyhow::bail!("Unknown argument: {other} (usage: --games <path> [--out <path>])");
            }
        }
    }

    let games = games.ok_or_else(|| anyhow::anyhow!("--games <path> is required"))?;
    Ok(Args { games, out })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    let args = parse_args()?;
    let config = Arc::new(WorkerConfig::load()?);
    info!(
        stockfish_path = %config.stockfish_path,
        depth = config.depth,
        multipv = config.multipv,
        num_workers = config.num_workers,
        "Worker config loaded"
    );

    let games = games::load_games(&args.games).await?;
    if games.is_empty() {
        warn!("No games to analyze");
        return Ok(());
    }

    let cache = Arc::new(EvalCache::open(&config.cache_path).await);
    if !cache.is_persistent() {
        warn!("Evaluations will not survive this run");
    }
    let pool = Arc::new(EnginePool::new(
        config.engine_options(),
        config.num_workers,
    ));

    let total = games.len();
    let mut join_set: JoinSet<(usize, Result<GameAnalysis, String>)> = JoinSet::new();
    for (index, game) in games.into_iter().enumerate() {
        let config = Arc::clone(&config);
        let cache = Arc::clone(&cache);
        let pool = Arc::clone(&pool);
        join_set.spawn(async move {
            let result = async {
                let mut engine = pool.acquire().await?;
                orchestrator::analyze_game(&mut engine, &cache, &config, &game).await
            }
            .await;

            let result = match result {
                Ok(analysis) => {
                    if let Some(player) = config.target_player.as_deref() {
                        if analysis.white == player {
                            info!(game_id = %analysis.game_id, player, accuracy = analysis.white_summary.accuracy, "Target player accuracy");
                        } else if analysis.black == player {
                            info!(game_id = %analysis.game_id, player, accuracy = analysis.black_summary.accuracy, "Target player accuracy");
                        }
                    }
                    Ok(analysis)
                }
                Err(e) => Err(format!("{}: {e}", game.id)),
            };
            (index, result)
        });
    }

    let mut slots: Vec<Option<GameAnalysis>> = (0..total).map(|_| None).collect();
    let mut failed = 0usize;
    let mut interrupted = false;

    loop {
        tokio::select! {
            joined = join_set.join_next() => {
                match joined {
                    Some(Ok((index, Ok(analysis)))) => {
                        slots[index] = Some(analysis);
                    }
                    Some(Ok((_, Err(message)))) => {
                        error!(error = %message, "Game analysis failed");
                        failed += 1;
                    }
                    Some(Err(e)) => {
                        if !e.is_cancelled() {
                            error!(error = %e, "Analysis task panicked");
                            failed += 1;
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                warn!("Interrupt received, abandoning queued games");
                interrupted = true;
                join_set.abort_all();
            }
        }
    }

    let analyses: Vec<GameAnalysis> = slots.into_iter().flatten().collect();
    report::write_report(&args.out, &analyses).await?;
    report::log_run_summary(cache.stats(), analyses.len(), failed);

    pool.shutdown().await;
    Ok(())
}
