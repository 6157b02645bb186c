//! Supervised bridge to an external advisor process.
//!
//! The helper speaks a line-oriented JSON protocol on stdin/stdout: one
//! request object per line, one reply object per line. Every request
//! carries a fresh correlation id and waits on its own reply channel, so
//! concurrent callers can never read each other's answers; replies with
//! unknown ids (stale, duplicated) are discarded. The child is
//! supervised: when it exits or its pipes close, every in-flight request
//! fails fast and the process is relaunched after a short pause.
//!
//! Wire format:
//! - request: `{"id": "<uuid>", "method": "advise", "symbol": "...", "pl_percent": 12.5}`
//! - reply: `{"id": "<uuid>", "result": "..."}` or `{"id": "<uuid>", "error": "..."}`

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::CoreError;

/// How the advisor child process is launched and supervised.
#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    /// Program to run.
    pub command: String,

    /// Arguments passed to it.
    pub args: Vec<String>,

    /// How long one request may wait for its reply.
    pub request_timeout: Duration,

    /// Pause before relaunching a dead child. Requests arriving during
    /// the pause fail fast instead of queueing against a dead process.
    pub restart_backoff: Duration,
}

impl AdvisorConfig {
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            request_timeout: Duration::from_secs(5),
            restart_backoff: Duration::from_millis(500),
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    #[must_use]
    pub fn with_restart_backoff(mut self, restart_backoff: Duration) -> Self {
        self.restart_backoff = restart_backoff;
        self
    }
}

// ── Wire format ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AdvisorRequest<'a> {
    id: Uuid,
    method: &'a str,
    symbol: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pl_percent: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct AdvisorReply {
    id: Uuid,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// One queued request traveling from a handle to the supervisor.
enum BridgeMessage {
    Request {
        id: Uuid,
        line: String,
        reply: oneshot::Sender<Result<AdvisorReply, CoreError>>,
    },
}

type PendingMap = HashMap<Uuid, oneshot::Sender<Result<AdvisorReply, CoreError>>>;

// ── Handle ──────────────────────────────────────────────────────────

/// Handle to the supervised advisor. Cheap to clone; all clones feed the
/// same serialized request channel.
#[derive(Debug, Clone)]
pub struct AdvisorBridge {
    sender: mpsc::Sender<BridgeMessage>,
    request_timeout: Duration,
}

impl AdvisorBridge {
    /// Start the supervisor task. Must be called inside a tokio runtime;
    /// the child itself is launched by the supervisor and relaunched on
    /// crash. Dropping every handle shuts the supervisor (and child) down.
    #[must_use]
    pub fn spawn(config: AdvisorConfig) -> Self {
        let (sender, receiver) = mpsc::channel(32);
        let request_timeout = config.request_timeout;
        tokio::spawn(supervise(config, receiver));
        Self {
            sender,
            request_timeout,
        }
    }

    /// Ask the advisor to comment on one holding.
    pub async fn advise(&self, symbol: &str, pl_percent: Option<f64>) -> Result<String, CoreError> {
        let id = Uuid::new_v4();
        let request = AdvisorRequest {
            id,
            method: "advise",
            symbol,
            pl_percent,
        };
        let line = serde_json::to_string(&request)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(BridgeMessage::Request {
                id,
                line,
                reply: reply_tx,
            })
            .await
            .map_err(|_| CoreError::AdvisorUnavailable("advisor supervisor is gone".to_string()))?;

        let reply = match timeout(self.request_timeout, reply_rx).await {
            Ok(Ok(outcome)) => outcome?,
            Ok(Err(_)) => {
                return Err(CoreError::AdvisorUnavailable(
                    "reply channel dropped".to_string(),
                ))
            }
            // On timeout the oneshot receiver is dropped here, so a late
            // reply is discarded by the supervisor's failed send.
            Err(_) => {
                return Err(CoreError::AdvisorUnavailable(format!(
                    "no reply within {:?}",
                    self.request_timeout
                )))
            }
        };

        if reply.id != id {
            // The supervisor routes by id; a mismatch here is a bug, not
            // an advisor hiccup.
            return Err(CoreError::Internal(format!(
                "correlation mismatch: sent {id}, got {}",
                reply.id
            )));
        }
        if let Some(err) = reply.error {
            return Err(CoreError::AdvisorUnavailable(format!("advisor error: {err}")));
        }
        reply
            .result
            .ok_or_else(|| CoreError::AdvisorUnavailable("empty reply".to_string()))
    }
}

// ── Supervisor ──────────────────────────────────────────────────────

async fn supervise(config: AdvisorConfig, mut receiver: mpsc::Receiver<BridgeMessage>) {
    loop {
        let mut child = match launch(&config) {
            Ok(child) => child,
            Err(err) => {
                error!(command = %config.command, error = %err, "failed to launch advisor");
                let reason = format!("failed to launch advisor: {err}");
                if !fail_requests_during_backoff(&mut receiver, config.restart_backoff, &reason)
                    .await
                {
                    return;
                }
                continue;
            }
        };
        info!(command = %config.command, "advisor process started");

        let channel_open = run_session(&mut child, &mut receiver).await;
        let _ = child.kill().await;
        if !channel_open {
            return;
        }

        warn!(command = %config.command, "advisor session ended; restarting");
        if !fail_requests_during_backoff(&mut receiver, config.restart_backoff, "advisor restarting")
            .await
        {
            return;
        }
    }
}

fn launch(config: &AdvisorConfig) -> std::io::Result<Child> {
    Command::new(&config.command)
        .args(&config.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
}

/// Pump requests and replies for one child lifetime. Returns `false` when
/// the request channel closed (orderly shutdown), `true` when the child
/// died and a restart is wanted. All in-flight requests are failed on the
/// way out.
async fn run_session(child: &mut Child, receiver: &mut mpsc::Receiver<BridgeMessage>) -> bool {
    let mut stdin = match child.stdin.take() {
        Some(stdin) => stdin,
        None => return true,
    };
    let stdout = match child.stdout.take() {
        Some(stdout) => stdout,
        None => return true,
    };
    let mut lines = BufReader::new(stdout).lines();
    let mut pending: PendingMap = HashMap::new();

    let channel_open = loop {
        tokio::select! {
            message = receiver.recv() => match message {
                Some(BridgeMessage::Request { id, line, reply }) => {
                    pending.insert(id, reply);
                    let write = async {
                        stdin.write_all(line.as_bytes()).await?;
                        stdin.write_all(b"\n").await?;
                        stdin.flush().await
                    };
                    if let Err(err) = write.await {
                        warn!(error = %err, "advisor stdin closed mid-request");
                        break true;
                    }
                }
                None => break false,
            },
            line = lines.next_line() => match line {
                Ok(Some(line)) => dispatch_reply(&mut pending, &line),
                Ok(None) => {
                    warn!("advisor stdout closed");
                    break true;
                }
                Err(err) => {
                    warn!(error = %err, "advisor stdout read failed");
                    break true;
                }
            },
            status = child.wait() => {
                match status {
                    Ok(status) => warn!(%status, "advisor process exited"),
                    Err(err) => warn!(error = %err, "advisor process lost"),
                }
                break true;
            }
        }
    };

    for (_, reply) in pending.drain() {
        let _ = reply.send(Err(CoreError::AdvisorUnavailable(
            "advisor process exited".to_string(),
        )));
    }
    channel_open
}

/// Route one reply line to the request that owns its correlation id.
fn dispatch_reply(pending: &mut PendingMap, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    match serde_json::from_str::<AdvisorReply>(line) {
        Ok(reply) => match pending.remove(&reply.id) {
            Some(sender) => {
                if sender.send(Ok(reply)).is_err() {
                    debug!("dropping reply for an abandoned request");
                }
            }
            None => warn!("discarding advisor reply with unknown correlation id"),
        },
        Err(err) => warn!(error = %err, "ignoring malformed advisor line"),
    }
}

/// Fail incoming requests for the duration of the restart pause. Returns
/// `false` when the request channel closed.
async fn fail_requests_during_backoff(
    receiver: &mut mpsc::Receiver<BridgeMessage>,
    backoff: Duration,
    reason: &str,
) -> bool {
    let deadline = Instant::now() + backoff;
    loop {
        match timeout_at(deadline, receiver.recv()).await {
            Ok(Some(BridgeMessage::Request { reply, .. })) => {
                let _ = reply.send(Err(CoreError::AdvisorUnavailable(reason.to_string())));
            }
            Ok(None) => return false,
            Err(_) => return true,
        }
    }
}
