//! UCI engine wrapper (async I/O) and the evaluation oracle trait.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use analyzer_core::eval::{EngineLine, Evaluation, Score};

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Failed to spawn engine: {0}")]
    Spawn(String),

    #[error("Engine timed out after {0}s")]
    Timeout(u64),

    #[error("UCI protocol error: {0}")]
    Protocol(String),
}

impl OracleError {
    /// Timeouts and protocol hiccups are worth retrying; a binary that
    /// cannot spawn will not spawn on the next attempt either.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, OracleError::Spawn(_))
    }
}

/// Source of position evaluations. The engine pool implements this over
/// real UCI processes; tests substitute a scripted oracle.
pub trait Oracle {
    fn evaluate(
        &mut self,
        fen: &str,
        depth: u8,
    ) -> impl Future<Output = Result<Evaluation, OracleError>> + Send;
}

/// UCI engine launch options.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub path: String,
    pub threads: u32,
    pub hash_mb: u32,
    pub multipv: u32,
    pub timeout_secs: u64,
}

/// One UCI engine process.
///
/// A timeout leaves the process mid-search with unread output, so the
/// instance is marked poisoned and respawned before the next evaluation.
pub struct UciEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    options: EngineOptions,
    poisoned: bool,
}

impl UciEngine {
    /// Spawn the engine process and run the UCI handshake.
    pub async fn spawn(options: EngineOptions) -> Result<Self, OracleError> {
        let (process, stdin, stdout) = spawn_process(&options.path)?;

        let mut engine = Self {
            process,
            stdin,
            stdout,
            options,
            poisoned: false,
        };
        engine.handshake().await?;
        Ok(engine)
    }

    async fn handshake(&mut self) -> Result<(), OracleError> {
        self.send("uci").await?;
        self.wait_for("uciok").await?;

        let threads = self.options.threads;
        let hash = self.options.hash_mb;
        let multipv = self.options.multipv;
        self.send(&format!("setoption name Threads value {threads}")).await?;
        self.send(&format!("setoption name Hash value {hash}")).await?;
        self.send(&format!("setoption name MultiPV value {multipv}")).await?;
        self.send("setoption name UCI_AnalyseMode value true").await?;
        self.send("isready").await?;
        self.wait_for("readyok").await?;
        Ok(())
    }

    async fn send(&mut self, cmd: &str) -> Result<(), OracleError> {
        debug!(cmd, "engine <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| OracleError::Protocol(format!("Failed to write to engine: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| OracleError::Protocol(format!("Failed to flush stdin: {e}")))?;
        Ok(())
    }

    async fn read_line_trimmed(&mut self, buf: &mut String) -> Result<usize, OracleError> {
        buf.clear();
        let n = self
            .stdout
            .read_line(buf)
            .await
            .map_err(|e| OracleError::Protocol(format!("Failed to read from engine: {e}")))?;
        if n == 0 {
            return Err(OracleError::Protocol("Engine closed its stdout".into()));
        }
        Ok(n)
    }

    async fn wait_for(&mut self, expected: &str) -> Result<(), OracleError> {
        let mut line = String::new();
        loop {
            self.read_line_trimmed(&mut line).await?;
            let trimmed = line.trim();
            debug!(line = trimmed, "engine >");
            if trimmed == expected {
                return Ok(());
            }
        }
    }

    /// Kill the current process and start a fresh one.
    async fn respawn(&mut self) -> Result<(), OracleError> {
        warn!("Respawning engine after failed search");
        let _ = self.process.start_kill();
        let _ = self.process.wait().await;

        let (process, stdin, stdout) = spawn_process(&self.options.path)?;
        self.process = process;
        self.stdin = stdin;
        self.stdout = stdout;
        self.poisoned = false;
        self.handshake().await
    }

    /// Run one fixed-depth search, collecting the final info line of each
    /// ranked PV. Lines come back ordered best-first.
    async fn search(&mut self, fen: &str, depth: u8) -> Result<Evaluation, OracleError> {
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {depth}")).await?;

        let mut lines: Vec<Option<EngineLine>> = vec![None; self.options.multipv as usize];
        let mut buf = String::new();

        loop {
            self.read_line_trimmed(&mut buf).await?;
            let trimmed = buf.trim();

            if trimmed.starts_with("info") && trimmed.contains(" pv ") {
                if let Some((index, line)) = parse_info_line(trimmed) {
                    if index >= 1 && (index as usize) <= lines.len() {
                        lines[index as usize - 1] = Some(line);
                    }
                }
            } else if trimmed.starts_with("bestmove") {
                break;
            }
        }

        let lines = collect_ranked_lines(lines)
            .map_err(|reason| OracleError::Protocol(format!("{reason} for position {fen}")))?;

        Ok(Evaluation { depth, lines })
    }

    /// Send quit and wait for the process to exit.
    pub async fn quit(&mut self) {
        let _ = self.send("quit").await;
        let _ = self.process.wait().await;
    }
}

impl Oracle for UciEngine {
    async fn evaluate(&mut self, fen: &str, depth: u8) -> Result<Evaluation, OracleError> {
        if self.poisoned {
            self.respawn().await?;
        }

        let timeout = Duration::from_secs(self.options.timeout_secs);
        match tokio::time::timeout(timeout, self.search(fen, depth)).await {
            Ok(result) => {
                if result.is_err() {
                    self.poisoned = true;
                }
                result
            }
            Err(_) => {
                self.poisoned = true;
                Err(OracleError::Timeout(self.options.timeout_secs))
            }
        }
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        // Best-effort synchronous kill in drop
        let _ = self.process.start_kill();
    }
}

type ProcessHandles = (Child, ChildStdin, BufReader<ChildStdout>);

fn spawn_process(path: &str) -> Result<ProcessHandles, OracleError> {
    let mut process = Command::new(path)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| OracleError::Spawn(format!("{path}: {e}")))?;

    let stdin = process
        .stdin
        .take()
        .ok_or_else(|| OracleError::Spawn("Engine stdin not captured".into()))?;
    let stdout = process
        .stdout
        .take()
        .ok_or_else(|| OracleError::Spawn("Engine stdout not captured".into()))?;

    Ok((process, stdin, BufReader::new(stdout)))
}

/// Parse one `info ... pv ...` line into its 1-based multipv index and a
/// scored line. Lines without a score or a first PV move are skipped.
fn parse_info_line(line: &str) -> Option<(u32, EngineLine)> {
    let mut index = 1u32;
    let mut score: Option<Score> = None;
    let mut pv: Vec<String> = Vec::new();

    let mut tokens = line.split_whitespace().peekable();
    while let Some(token) = tokens.next() {
        match token {
            "multipv" => {
                if let Some(value) = tokens.next() {
                    index = value.parse().ok()?;
                }
            }
            "score" => match tokens.next() {
                Some("cp") => score = Some(Score::Cp(tokens.next()?.parse().ok()?)),
                Some("mate") => score = Some(Score::Mate(tokens.next()?.parse().ok()?)),
                _ => return None,
            },
            "pv" => {
                for mv in tokens.by_ref() {
                    if mv == "string" {
                        break;
                    }
                    pv.push(mv.to_string());
                }
            }
            _ => {}
        }
    }

    let score = score?;
    let mv = pv.first()?.clone();
    Some((index, EngineLine { mv, score, pv }))
}

/// Turn the per-rank slots into a best-first list. A filled slot after an
/// empty one means the search dropped a rank; compacting over the gap
/// would promote a worse line, so that is a protocol error instead.
fn collect_ranked_lines(slots: Vec<Option<EngineLine>>) -> Result<Vec<EngineLine>, &'static str> {
    let mut slots = slots.into_iter();
    let mut lines = Vec::new();
    for slot in slots.by_ref() {
        match slot {
            Some(line) => lines.push(line),
            None => break,
        }
    }
    if slots.any(|slot| slot.is_some()) {
        return Err("Gap in ranked lines");
    }
    if lines.is_empty() {
        return Err("No scored lines");
    }
    Ok(lines)
}
