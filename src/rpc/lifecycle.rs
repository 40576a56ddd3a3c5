//! Worker process lifecycle management.
//!
//! Every request gets its own short-lived worker: spawn, wait out the startup
//! delay, write one request, scan stdout until the correlated response
//! arrives, then terminate. The response deadline, the startup delay, worker
//! exit and external cancellation all race the stdout read in one `select!`
//! loop, so exactly one of them drives the session into its terminal state.
//! Timers still pending at that point are dropped with the loop.

use std::future::Future;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use super::codec::{self, EncodedRequest, LineDecoder};
use super::errors::RpcError;
use super::types::{ResponseEnvelope, WorkerResponse};
use crate::config::WorkerConfig;
use crate::router::Intent;

// ─── Constants ──────────────────────────────────────────────────────────────

/// Bytes read from the worker's stdout per call.
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Bytes of the worker's stderr kept for error messages.
const STDERR_TAIL_BYTES: usize = 2000;

/// How long to wait for an exited worker's output to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// How long to wait for a killed worker to be reaped.
const REAP_TIMEOUT: Duration = Duration::from_secs(2);

// ─── SessionState ───────────────────────────────────────────────────────────

/// Where a worker session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    AwaitingResponse,
    Completed,
    TimedOut,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::TimedOut | SessionState::Failed
        )
    }
}

// ─── WorkerSession ──────────────────────────────────────────────────────────

/// One spawned worker process and the state of its single request.
///
/// The process handle is owned exclusively by the session and is never
/// shared with other sessions.
pub struct WorkerSession {
    id: Uuid,
    command: String,
    process: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr_task: Option<JoinHandle<()>>,
    stderr_tail: Arc<Mutex<Vec<u8>>>,
    spawned_at: Instant,
    state: SessionState,
    terminated: bool,
    kill_signals: u32,
}

impl WorkerSession {
    /// Spawn the worker with piped stdio.
    pub fn spawn(config: &WorkerConfig) -> Result<Self, RpcError> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args);

        for (key, value) in &config.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &config.cwd {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // Backstop for a session future dropped mid-flight.
        cmd.kill_on_drop(true);

        let mut process = cmd.spawn().map_err(|e| RpcError::Spawn {
            command: config.command.clone(),
            reason: e.to_string(),
        })?;

        let stdin = process.stdin.take().ok_or(RpcError::Spawn {
            command: config.command.clone(),
            reason: "failed to capture stdin".into(),
        })?;
        let stdout = process.stdout.take().ok_or(RpcError::Spawn {
            command: config.command.clone(),
            reason: "failed to capture stdout".into(),
        })?;

        let stderr_tail = Arc::new(Mutex::new(Vec::new()));
        let stderr_task = process.stderr.take().map(|stderr| {
            tokio::spawn(pump_stderr(
                stderr,
                Arc::clone(&stderr_tail),
                config.forward_stderr,
            ))
        });

        let id = Uuid::new_v4();
        tracing::debug!(
            session = %id,
            command = %config.command,
            pid = process.id(),
            "worker spawned"
        );

        Ok(Self {
            id,
            command: config.command.clone(),
            process,
            stdin: Some(stdin),
            stdout: Some(stdout),
            stderr_task,
            stderr_tail,
            spawned_at: Instant::now(),
            state: SessionState::Starting,
            terminated: false,
            kill_signals: 0,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Kill signals actually delivered to the process (0 or 1).
    pub fn kill_signals(&self) -> u32 {
        self.kill_signals
    }

    /// Check if the worker process is still running.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.process.try_wait(), Ok(None))
    }

    /// Send the request and drive the session to a terminal state.
    ///
    /// `cancel` completing at any point fails the session with
    /// [`RpcError::Cancelled`]. Pass `std::future::pending()` for none.
    pub async fn exchange<F>(
        &mut self,
        request: &EncodedRequest,
        config: &WorkerConfig,
        cancel: F,
    ) -> Result<WorkerResponse, RpcError>
    where
        F: Future<Output = ()>,
    {
        let (Some(mut stdin), Some(mut stdout)) = (self.stdin.take(), self.stdout.take()) else {
            return Err(RpcError::Io {
                reason: "session already used".into(),
            });
        };

        let mut decoder = LineDecoder::new(request.id);
        let deadline = tokio::time::sleep_until(self.spawned_at + config.response_timeout());
        tokio::pin!(deadline);
        tokio::pin!(cancel);

        // Starting: give the worker time to initialize.
        let startup = tokio::time::sleep(config.startup_delay());
        tokio::pin!(startup);
        tokio::select! {
            _ = &mut startup => {}
            _ = &mut deadline => return self.time_out(config, &decoder).await,
            _ = &mut cancel => return self.cancelled().await,
            status = self.process.wait() => {
                let _ = drain_stdout(&mut stdout, &mut decoder).await;
                return self.exited(status, &decoder).await;
            }
        }

        self.transition(SessionState::AwaitingResponse);
        if let Err(e) = write_request(&mut stdin, &request.line).await {
            if let Ok(Some(status)) = self.process.try_wait() {
                let _ = drain_stdout(&mut stdout, &mut decoder).await;
                return self.exited(Ok(status), &decoder).await;
            }
            self.transition(SessionState::Failed);
            self.terminate().await;
            return Err(RpcError::Io {
                reason: format!("failed to write request: {e}"),
            });
        }
        tracing::debug!(
            session = %self.id,
            request_id = request.id,
            operation = %request.operation,
            "request sent"
        );

        // AwaitingResponse: stdin stays open until termination, since some
        // workers shut down as soon as their input closes.
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];
        let mut stdout_open = true;
        loop {
            tokio::select! {
                _ = &mut deadline => return self.time_out(config, &decoder).await,
                _ = &mut cancel => return self.cancelled().await,
                read = stdout.read(&mut chunk), if stdout_open => match read {
                    Ok(0) => {
                        stdout_open = false;
                        if let Some(envelope) = decoder.finish() {
                            return Ok(self.complete(envelope, config, cancel.as_mut()).await);
                        }
                    }
                    Ok(n) => {
                        decoder.feed(&chunk[..n]);
                        if let Some(envelope) = decoder.scan() {
                            return Ok(self.complete(envelope, config, cancel.as_mut()).await);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(session = %self.id, error = %e, "worker stdout read failed");
                        stdout_open = false;
                    }
                },
                // The worker may exit while a child it spawned keeps stdout
                // open, so exit is watched independently of EOF.
                status = self.process.wait() => {
                    if stdout_open {
                        if let Some(envelope) = drain_stdout(&mut stdout, &mut decoder).await {
                            return Ok(self.complete(envelope, config, cancel.as_mut()).await);
                        }
                    }
                    return self.exited(status, &decoder).await;
                }
            }
        }
    }

    /// Terminate the worker. Idempotent; only the first call does anything.
    ///
    /// Safe to call at any time, including after the worker has exited on
    /// its own, in which case no signal is sent.
    pub async fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;

        match self.process.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(session = %self.id, %status, "worker already exited");
            }
            _ => match self.process.start_kill() {
                Ok(()) => self.kill_signals += 1,
                Err(e) => tracing::debug!(session = %self.id, error = %e, "worker already gone"),
            },
        }

        match tokio::time::timeout(REAP_TIMEOUT, self.process.wait()).await {
            Ok(Ok(status)) => tracing::debug!(session = %self.id, %status, "worker reaped"),
            Ok(Err(e)) => tracing::warn!(session = %self.id, error = %e, "failed to reap worker"),
            Err(_) => tracing::warn!(
                session = %self.id,
                command = %self.command,
                "worker still running {}s after kill",
                REAP_TIMEOUT.as_secs()
            ),
        }
    }

    // ─── Terminal transitions ────────────────────────────────────────────

    /// Cancellation during the grace period only cuts the grace short; the
    /// response has already been decoded and is still returned.
    async fn complete<F>(
        &mut self,
        envelope: ResponseEnvelope,
        config: &WorkerConfig,
        cancel: Pin<&mut F>,
    ) -> WorkerResponse
    where
        F: Future<Output = ()>,
    {
        self.transition(SessionState::Completed);
        tokio::select! {
            _ = tokio::time::sleep(config.post_response_grace()) => {}
            _ = cancel => {
                tracing::debug!(session = %self.id, "grace period cut short by cancellation");
            }
        }
        self.terminate().await;
        WorkerResponse::from_envelope(envelope)
    }

    async fn time_out(
        &mut self,
        config: &WorkerConfig,
        decoder: &LineDecoder,
    ) -> Result<WorkerResponse, RpcError> {
        self.transition(SessionState::TimedOut);
        self.terminate().await;
        tracing::warn!(
            session = %self.id,
            timeout_ms = config.response_timeout_ms,
            "worker timed out"
        );
        Err(RpcError::Timeout {
            timeout_ms: config.response_timeout_ms,
            diagnostics: self.diagnostics(decoder),
        })
    }

    async fn exited(
        &mut self,
        status: std::io::Result<ExitStatus>,
        decoder: &LineDecoder,
    ) -> Result<WorkerResponse, RpcError> {
        self.transition(SessionState::Failed);
        self.terminate().await;
        self.drain_stderr().await;

        let status = match status {
            Ok(status) => status.to_string(),
            Err(e) => format!("unknown status: {e}"),
        };
        let diagnostics = self.diagnostics(decoder);
        if !diagnostics.is_empty() {
            tracing::warn!(
                session = %self.id,
                %status,
                output = %diagnostics,
                "worker output captured on exit"
            );
        }
        Err(RpcError::WorkerExited {
            status,
            diagnostics,
        })
    }

    async fn cancelled(&mut self) -> Result<WorkerResponse, RpcError> {
        self.transition(SessionState::Failed);
        self.terminate().await;
        tracing::info!(session = %self.id, "worker session cancelled");
        Err(RpcError::Cancelled)
    }

    fn transition(&mut self, next: SessionState) {
        if self.state.is_terminal() {
            tracing::warn!(
                session = %self.id,
                from = ?self.state,
                to = ?next,
                "ignored transition out of terminal state"
            );
            return;
        }
        tracing::debug!(session = %self.id, from = ?self.state, to = ?next, "session transition");
        self.state = next;
    }

    async fn drain_stderr(&mut self) {
        if let Some(task) = self.stderr_task.take() {
            let _ = tokio::time::timeout(DRAIN_TIMEOUT, task).await;
        }
    }

    /// Discarded stdout lines plus the stderr tail.
    fn diagnostics(&self, decoder: &LineDecoder) -> String {
        let stderr = self
            .stderr_tail
            .lock()
            .map(|tail| String::from_utf8_lossy(&tail).trim().to_string())
            .unwrap_or_default();
        let stdout = decoder.diagnostics();

        [stdout, stderr]
            .into_iter()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

async fn write_request(stdin: &mut ChildStdin, line: &[u8]) -> std::io::Result<()> {
    stdin.write_all(line).await?;
    stdin.flush().await
}

/// Read what an exited worker left on stdout, bounded by `DRAIN_TIMEOUT`
/// since a surviving grandchild may hold the pipe open. Returns the response
/// if the worker wrote it just before exiting.
async fn drain_stdout(
    stdout: &mut ChildStdout,
    decoder: &mut LineDecoder,
) -> Option<ResponseEnvelope> {
    let deadline = Instant::now() + DRAIN_TIMEOUT;
    let mut chunk = [0u8; 4096];
    loop {
        match tokio::time::timeout_at(deadline, stdout.read(&mut chunk)).await {
            Ok(Ok(0)) | Ok(Err(_)) | Err(_) => break,
            Ok(Ok(n)) => {
                decoder.feed(&chunk[..n]);
                if let Some(envelope) = decoder.scan() {
                    return Some(envelope);
                }
            }
        }
    }
    decoder.finish()
}

/// Copy the worker's stderr to ours, keeping a bounded tail.
async fn pump_stderr(mut stderr: ChildStderr, tail: Arc<Mutex<Vec<u8>>>, forward: bool) {
    let mut host = tokio::io::stderr();
    let mut buf = [0u8; 4096];

    loop {
        let n = match stderr.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        if forward {
            let _ = host.write_all(&buf[..n]).await;
        }
        if let Ok(mut tail) = tail.lock() {
            tail.extend_from_slice(&buf[..n]);
            if tail.len() > STDERR_TAIL_BYTES {
                let excess = tail.len() - STDERR_TAIL_BYTES;
                tail.drain(..excess);
            }
        }
    }
}

// ─── Entry points ───────────────────────────────────────────────────────────

/// Run one intent against a fresh worker.
///
/// Transport failures come back as `RpcError`; application errors reported
/// by the worker come back as `Ok(WorkerResponse::Error { .. })`. No retries.
pub async fn run(intent: &Intent, config: &WorkerConfig) -> Result<WorkerResponse, RpcError> {
    run_with_cancel(intent, config, std::future::pending()).await
}

/// Like [`run`], but fails with `RpcError::Cancelled` when `cancel` completes.
pub async fn run_with_cancel<F>(
    intent: &Intent,
    config: &WorkerConfig,
    cancel: F,
) -> Result<WorkerResponse, RpcError>
where
    F: Future<Output = ()>,
{
    let request = codec::encode(intent)?;
    let mut session = WorkerSession::spawn(config)?;

    let span = tracing::info_span!("worker", session = %session.id(), request_id = request.id);
    let started = Instant::now();
    let result = session
        .exchange(&request, config, cancel)
        .instrument(span)
        .await;

    tracing::info!(
        session = %session.id(),
        operation = %request.operation,
        state = ?session.state(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "worker session finished"
    );
    result
}

/// Run several intents concurrently, one independent session each.
///
/// Results are returned in input order.
pub async fn run_many(
    intents: &[Intent],
    config: &WorkerConfig,
) -> Vec<Result<WorkerResponse, RpcError>> {
    futures::future::join_all(intents.iter().map(|intent| run(intent, config))).await
}

// ─── Tests ──────────────────────────────────────────────────────────────────
