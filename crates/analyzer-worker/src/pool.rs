//! Bounded pool of UCI engine processes.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Semaphore;
use tracing::info;

use analyzer_core::eval::Evaluation;

use crate::engine::{EngineOptions, Oracle, OracleError, UciEngine};

/// Lazily-populated engine pool. Capacity bounds the number of live
/// engine processes; idle engines are reused across checkouts.
pub struct EnginePool {
    options: EngineOptions,
    idle: Mutex<Vec<UciEngine>>,
    permits: Arc<Semaphore>,
}

impl EnginePool {
    pub fn new(options: EngineOptions, capacity: usize) -> Self {
        Self {
            options,
            idle: Mutex::new(Vec::with_capacity(capacity)),
            permits: Arc::new(Semaphore::new(capacity)),
        }
    }

    /// Check out an engine, waiting if all are in use. Spawns a process
    /// only when no idle engine is available.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledEngine, OracleError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| OracleError::Protocol("Engine pool closed".into()))?;
        // The permit is returned manually when the engine goes back.
        permit.forget();

        let idle = {
            let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
            idle.pop()
        };
        let engine = match idle {
            Some(engine) => engine,
            None => {
                let engine = UciEngine::spawn(self.options.clone()).await;
                match engine {
                    Ok(engine) => engine,
                    Err(e) => {
                        self.permits.add_permits(1);
                        return Err(e);
                    }
                }
            }
        };

        Ok(PooledEngine {
            engine: Some(engine),
            pool: Arc::clone(self),
        })
    }

    /// Quit all idle engines. Checked-out engines are killed when their
    /// holders drop them.
    pub async fn shutdown(&self) {
        let engines = {
            let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *idle)
        };
        info!(count = engines.len(), "Shutting down idle engines");
        for mut engine in engines {
            engine.quit().await;
        }
    }

    fn restore(&self, engine: UciEngine) {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        idle.push(engine);
        drop(idle);
        self.permits.add_permits(1);
    }
}

/// An engine checked out of the pool; returns itself on drop.
pub struct PooledEngine {
    engine: Option<UciEngine>,
    pool: Arc<EnginePool>,
}

impl Oracle for PooledEngine {
    async fn evaluate(&mut self, fen: &str, depth: u8) -> Result<Evaluation, OracleError> {
        match self.engine.as_mut() {
            Some(engine) => engine.evaluate(fen, depth).await,
            None => Err(OracleError::Protocol("Engine already returned".into())),
        }
    }
}

impl Drop for PooledEngine {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.take() {
            self.pool.restore(engine);
        }
    }
}
