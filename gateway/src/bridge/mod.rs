pub mod codec;
pub mod pending;
pub mod state_mirror;

use std::process::Stdio;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::sse::broadcaster::EventBroadcaster;
use codec::{decode_line, encode_command, InboundMessage};
use pending::PendingRequests;
use state_mirror::StateMirror;

fn now_ns() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before unix epoch").as_nanos() as u64
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BridgeError {
    #[error("engine unavailable")]
    EngineUnavailable,
    #[error("engine protocol violation")]
    ProtocolViolation,
}

const STATUS_CONNECTED: u8 = 0;
const STATUS_DISCONNECTED: u8 = 1;

/// Supervises the engine child process and owns the writer/reader tasks, the
/// pending-request correlation map, and the state mirror. Outbound commands
/// are handed to the writer side over an unbounded queue so `request` never
/// blocks the caller beyond enqueue.
pub struct EngineBridge {
    command_tx: mpsc::UnboundedSender<String>,
    state: Arc<StateMirror>,
    status: Arc<AtomicU8>,
    pending: Arc<PendingRequests>,
    request_timeout: Duration,
}

impl EngineBridge {
    pub fn spawn(engine_command: String, broadcaster: Arc<EventBroadcaster>, request_timeout: Duration) -> Self {
        let pending = Arc::new(PendingRequests::new());
        let state = Arc::new(StateMirror::new());
        let status = Arc::new(AtomicU8::new(STATUS_DISCONNECTED));
        let (command_tx, command_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(supervise(engine_command, command_rx, pending.clone(), state.clone(), broadcaster, status.clone()));

        Self { command_tx, state, status, pending, request_timeout }
    }

    pub fn state(&self) -> &Arc<StateMirror> {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.status.load(Ordering::Acquire) == STATUS_CONNECTED
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Enqueues `op` with `params`, awaits the correlated reply with a
    /// timeout. Never retried internally — callers decide whether
    /// resubmission is safe (orders must not be double-submitted).
    pub async fn request(&self, op: &str, params: Value) -> Result<Value, BridgeError> {
        let (corr, rx) = self.pending.register();
        let line = encode_command(op, corr, params).map_err(|_| BridgeError::ProtocolViolation)?;
        if self.command_tx.send(line).is_err() {
            self.pending.cancel(corr);
            return Err(BridgeError::EngineUnavailable);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => Err(BridgeError::EngineUnavailable),
            Err(_) => {
                self.pending.cancel(corr);
                Err(BridgeError::EngineUnavailable)
            }
        }
    }
}

fn spawn_child(engine_command: &str) -> std::io::Result<Child> {
    Command::new(engine_command)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
}

/// Writes queued commands to the child's stdin until the channel closes
/// (bridge dropped, terminal) or a write fails (child gone, supervisor
/// should reconnect). The receiver is owned by the supervisor across
/// reconnect attempts so no command enqueued during a restart is lost.
async fn run_writer(stdin: &mut ChildStdin, command_rx: &mut mpsc::UnboundedReceiver<String>) -> bool {
    while let Some(line) = command_rx.recv().await {
        if stdin.write_all(line.as_bytes()).await.is_err() || stdin.write_all(b"\n").await.is_err() {
            return false;
        }
    }
    true
}

async fn run_reader(
    stdout: &mut ChildStdout,
    pending: &PendingRequests,
    state: &StateMirror,
    broadcaster: &EventBroadcaster,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match decode_line(&line) {
                Ok(InboundMessage::Reply { corr, payload }) => {
                    if !pending.resolve(corr, payload) {
                        warn!(corr, "late or unknown engine reply dropped");
                    }
                }
                Ok(InboundMessage::Event { event_type, payload }) => {
                    let now = now_ns();
                    state.apply_event(&event_type, &payload, now).await;
                    broadcaster.publish(&event_type, payload.to_string());
                }
                Err(err) => warn!(%err, "discarding malformed engine message"),
            },
            Ok(None) => return,
            Err(err) => {
                warn!(%err, "engine stdout read error");
                return;
            }
        }
    }
}

async fn supervise(
    engine_command: String,
    mut command_rx: mpsc::UnboundedReceiver<String>,
    pending: Arc<PendingRequests>,
    state: Arc<StateMirror>,
    broadcaster: Arc<EventBroadcaster>,
    status: Arc<AtomicU8>,
) {
    let mut backoff = Duration::from_millis(200);
    let cap = Duration::from_secs(30);
    let mut attempt = 0u32;

    loop {
        let mut child = match spawn_child(&engine_command) {
            Ok(child) => child,
            Err(err) => {
                warn!(%err, attempt, "failed to spawn engine process");
                status.store(STATUS_DISCONNECTED, Ordering::Release);
                tokio::time::sleep(backoff).await;
                backoff = next_backoff(backoff, attempt, cap);
                attempt += 1;
                continue;
            }
        };
        let mut stdin = child.stdin.take().expect("engine child spawned with piped stdin");
        let mut stdout = child.stdout.take().expect("engine child spawned with piped stdout");

        status.store(STATUS_CONNECTED, Ordering::Release);
        info!(attempt, "engine process connected");
        attempt = 0;
        backoff = Duration::from_millis(200);

        let writer_closed_terminal = tokio::select! {
            terminal = run_writer(&mut stdin, &mut command_rx) => terminal,
            _ = run_reader(&mut stdout, &pending, &state, &broadcaster) => false,
        };

        status.store(STATUS_DISCONNECTED, Ordering::Release);
        pending.fail_all();
        let _ = child.start_kill();

        if writer_closed_terminal {
            info!("engine bridge shut down (command channel closed)");
            return;
        }

        tokio::time::sleep(backoff).await;
        backoff = next_backoff(backoff, attempt, cap);
        attempt += 1;
    }
}

fn next_backoff(current: Duration, attempt: u32, cap: Duration) -> Duration {
    let jitter_ms = (attempt as u64 * 37) % 250;
    (current * 2 + Duration::from_millis(jitter_ms)).min(cap)
}
