//! Persistent evaluation cache with in-flight request coalescing.
//!
//! One row per position keeps the deepest evaluation seen; a lookup is
//! satisfied by any stored depth at or above the requested one. Callers
//! that miss receive an exclusive in-flight slot for that key, so
//! concurrent requests for the same position produce a single engine
//! search.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

use analyzer_core::eval::Evaluation;
use analyzer_core::key::PositionKey;

/// Counters for observability; monotonic over the cache's lifetime.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
}

/// Result of opening a cache transaction for one key.
pub enum Lookup<'a> {
    /// A stored evaluation at sufficient depth.
    Hit(Evaluation),
    /// The caller owns the search for this key until the slot is filled
    /// or dropped.
    Miss(InflightSlot<'a>),
}

/// Exclusive right to compute one key. Filling stores the result and
/// wakes coalesced waiters; dropping without filling just wakes them, so
/// a failed search never wedges other callers.
pub struct InflightSlot<'a> {
    cache: &'a EvalCache,
    key: PositionKey,
    _guard: OwnedMutexGuard<()>,
}

impl InflightSlot<'_> {
    pub fn key(&self) -> &PositionKey {
        &self.key
    }

    /// Store the computed evaluation and release the slot.
    pub async fn fill(self, eval: &Evaluation) {
        self.cache.store(&self.key, eval).await;
    }
}

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        self.cache.release(&self.key);
    }
}

/// Two-tier evaluation cache: an in-process map in front of a SQLite
/// file, plus a per-key in-flight registry.
pub struct EvalCache {
    db: Option<SqlitePool>,
    memory: Mutex<HashMap<String, Evaluation>>,
    inflight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
}

impl EvalCache {
    /// Open (or create) the cache database at `path`. A database that
    /// cannot be opened degrades to memory-only caching rather than
    /// failing the run.
    pub async fn open(path: &str) -> Self {
        match open_pool(path).await {
            Ok(pool) => Self::with_db(Some(pool)),
            Err(e) => {
                warn!(path, error = %e, "Cache database unavailable, running memory-only");
                Self::with_db(None)
            }
        }
    }

    /// Memory-only cache, used in tests and as the degraded mode.
    pub fn in_memory() -> Self {
        Self::with_db(None)
    }

    fn with_db(db: Option<SqlitePool>) -> Self {
        Self {
            db,
            memory: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stores: AtomicU64::new(0),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.db.is_some()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
        }
    }

    /// Look the key up, or claim the in-flight slot for it.
    pub async fn begin(&self, key: &PositionKey) -> Lookup<'_> {
        if let Some(eval) = self.lookup(key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Lookup::Hit(eval);
        }

        let slot_lock = {
            let mut inflight = self
                .inflight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            inflight
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        let guard = slot_lock.lock_owned().await;

        // A coalesced waiter wakes here after the leader stored (or gave
        // up); check again before claiming the search.
        if let Some(eval) = self.lookup(key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            drop(guard);
            self.release(key);
            return Lookup::Hit(eval);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        Lookup::Miss(InflightSlot {
            cache: self,
            key: key.clone(),
            _guard: guard,
        })
    }

    /// Check both tiers for an evaluation at the key's depth or deeper.
    pub async fn lookup(&self, key: &PositionKey) -> Option<Evaluation> {
        {
            let memory = self.memory.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(eval) = memory.get(key.position()) {
                if eval.depth >= key.depth() {
                    return Some(eval.clone());
                }
            }
        }

        let db = self.db.as_ref()?;
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT evaluation FROM eval_cache WHERE position = ?1 AND depth >= ?2",
        )
        .bind(key.position())
        .bind(i64::from(key.depth()))
        .fetch_optional(db)
        .await
        .map_err(|e| {
            warn!(key = %key, error = %e, "Cache read failed");
            e
        })
        .ok()
        .flatten();

        let (payload,) = row?;
        match serde_json::from_str::<Evaluation>(&payload) {
            Ok(eval) => {
                self.remember(key.position(), &eval);
                Some(eval)
            }
            Err(e) => {
                // An unreadable row is a miss; the fresh result overwrites it.
                warn!(key = %key, error = %e, "Corrupt cache row, treating as miss");
                None
            }
        }
    }

    /// Store an evaluation, keeping only the deepest per position. A
    /// failed write costs a recomputation later, never the analysis.
    async fn store(&self, key: &PositionKey, eval: &Evaluation) {
        self.remember(key.position(), eval);
        self.stores.fetch_add(1, Ordering::Relaxed);

        if let Some(db) = self.db.as_ref() {
            let payload = match serde_json::to_string(eval) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(key = %key, error = %e, "Evaluation not serializable");
                    return;
                }
            };
            let written = sqlx::query(
                r#"INSERT INTO eval_cache (position, depth, evaluation, created_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(position) DO UPDATE SET
                    depth = excluded.depth,
                    evaluation = excluded.evaluation,
                    created_at = excluded.created_at
                WHERE excluded.depth >= eval_cache.depth"#,
            )
            .bind(key.position())
            .bind(i64::from(eval.depth))
            .bind(payload)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(db)
            .await;
            if let Err(e) = written {
                warn!(key = %key, error = %e, "Cache write failed");
            }
        }

        debug!(key = %key, "Evaluation stored");
    }

    /// Equal depth replaces, matching the SQL upsert's newest-wins tie rule.
    fn remember(&self, position: &str, eval: &Evaluation) {
        let mut memory = self.memory.lock().unwrap_or_else(PoisonError::into_inner);
        match memory.get(position) {
            Some(existing) if existing.depth > eval.depth => {}
            _ => {
                memory.insert(position.to_string(), eval.clone());
            }
        }
    }

    /// Drop the in-flight registry entry once nothing else points at it.
    fn release(&self, key: &PositionKey) {
        let mut inflight = self
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let registry_key = key.to_string();
        if let Some(entry) = inflight.get(&registry_key) {
            // Map entry plus the slot's guard-internal reference.
            if Arc::strong_count(entry) <= 2 {
                inflight.remove(&registry_key);
            }
        }
    }
}

async fn open_pool(path: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS eval_cache (
            position TEXT PRIMARY KEY,
            depth INTEGER NOT NULL,
            evaluation TEXT NOT NULL,
            created_at TEXT NOT NULL
        )"#,
    )
    .execute(&pool)
    .await?;

    Ok(pool)
}
