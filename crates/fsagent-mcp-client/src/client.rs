// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, info, warn};

use fsagent_config::McpConfig;

use crate::error::McpError;
use crate::protocol::{
    self, CallToolResult, Incoming, InitializeResult, ListToolsResult, McpToolDef, ServerInfo,
};

type PendingMap = HashMap<u64, oneshot::Sender<Result<Value, McpError>>>;
type Pending = Arc<StdMutex<PendingMap>>;
type Writer = Arc<Mutex<Option<FramedWrite<ChildStdin, LinesCodec>>>>;

/// How to launch a stdio MCP server.
#[derive(Debug, Clone, PartialEq)]
pub struct StdioServerParams {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub cwd: Option<PathBuf>,
}

impl StdioServerParams {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into(), args: Vec::new(), env: HashMap::new(), cwd: None }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Launch parameters for the configured server, with `root` appended as
    /// the last argument (the directory the server may access).
    pub fn from_config(cfg: &McpConfig, root: &Path) -> Self {
        let mut args = cfg.args.clone();
        args.push(root.to_string_lossy().into_owned());
        Self { command: cfg.command.clone(), args, env: cfg.env.clone(), cwd: None }
    }
}

/// A live connection to one MCP server subprocess.
///
/// Requests are matched to responses by id, so several tool calls may be in
/// flight at once.  A background task reads stdout; server stderr is
/// forwarded to the log at debug level.
pub struct McpClient {
    writer: Writer,
    pending: Pending,
    next_id: AtomicU64,
    /// Set by the reader task once stdout ends.
    transport_down: Arc<AtomicBool>,
    /// Set by the first [`McpClient::close`].
    close_called: Arc<AtomicBool>,
    child: Mutex<Option<Child>>,
    pid: Option<u32>,
    reader: StdMutex<Option<JoinHandle<()>>>,
    stderr: StdMutex<Option<JoinHandle<()>>>,
    timeout: Duration,
    server_info: StdMutex<Option<ServerInfo>>,
}

impl McpClient {
    /// Spawn the server process and wire up the transport.  Does not perform
    /// the `initialize` handshake; see [`McpClient::initialize`].
    pub fn connect_stdio(params: &StdioServerParams, timeout: Duration) -> Result<Self, McpError> {
        let mut cmd = Command::new(&params.command);
        cmd.args(&params.args)
            .envs(&params.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &params.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| McpError::Spawn {
            command: params.command.clone(),
            source,
        })?;
        let pid = child.id();
        info!(command = %params.command, args = ?params.args, ?pid, "launched MCP server");

        let stdin = child.stdin.take().ok_or_else(|| McpError::Transport("no stdin".into()))?;
        let stdout = child.stdout.take().ok_or_else(|| McpError::Transport("no stdout".into()))?;
        let stderr = child.stderr.take();

        let writer: Writer = Arc::new(Mutex::new(Some(FramedWrite::new(stdin, LinesCodec::new()))));
        let pending: Pending = Arc::new(StdMutex::new(HashMap::new()));
        let transport_down = Arc::new(AtomicBool::new(false));
        let close_called = Arc::new(AtomicBool::new(false));

        let reader = tokio::spawn(read_loop(
            stdout,
            Arc::clone(&pending),
            Arc::clone(&writer),
            Arc::clone(&transport_down),
            Arc::clone(&close_called),
        ));

        let stderr = stderr.map(|err| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(err).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "mcp_server", "{line}");
                }
            })
        });

        Ok(Self {
            writer,
            pending,
            next_id: AtomicU64::new(1),
            transport_down,
            close_called,
            child: Mutex::new(Some(child)),
            pid,
            reader: StdMutex::new(Some(reader)),
            stderr: StdMutex::new(stderr),
            timeout,
            server_info: StdMutex::new(None),
        })
    }

    /// Perform the `initialize` handshake and send `notifications/initialized`.
    pub async fn initialize(&self) -> Result<ServerInfo, McpError> {
        let params = json!({
            "protocolVersion": protocol::PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }
        });
        let result: InitializeResult =
            serde_json::from_value(self.request("initialize", Some(params)).await?)?;
        info!(
            server = %result.server_info.name,
            version = %result.server_info.version,
            protocol = %result.protocol_version,
            "MCP server initialized"
        );
        self.notify("notifications/initialized", None).await?;
        if let Ok(mut info) = self.server_info.lock() {
            *info = Some(result.server_info.clone());
        }
        Ok(result.server_info)
    }

    /// Server identity reported during `initialize`, if it has completed.
    pub fn server_info(&self) -> Option<ServerInfo> {
        self.server_info.lock().ok().and_then(|i| i.clone())
    }

    /// All tools the server exposes, following `nextCursor` pagination.
    pub async fn list_tools(&self) -> Result<Vec<McpToolDef>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page: ListToolsResult =
                serde_json::from_value(self.request("tools/list", params).await?)?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        debug!(count = tools.len(), "listed MCP tools");
        Ok(tools)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
        let params = json!({ "name": name, "arguments": arguments });
        let value = self.request("tools/call", Some(params)).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Send a request and wait for the matching response.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        if self.is_closed() {
            return Err(McpError::Closed);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock_pending(&self.pending).insert(id, tx);
        // The reader may have shut down between the check above and the insert.
        if self.is_closed() {
            self.forget(id);
            return Err(McpError::Closed);
        }

        debug!(id, method, "MCP request");
        if let Err(e) = self.send(protocol::request(id, method, params)).await {
            self.forget(id);
            return Err(e);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(McpError::Closed),
            Err(_) => {
                self.forget(id);
                Err(McpError::Timeout { method: method.to_string(), timeout: self.timeout })
            }
        }
    }

    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        self.send(protocol::notification(method, params)).await
    }

    /// True once the transport is gone or [`McpClient::close`] has been called.
    /// The process may still be running until `close` has run.
    pub fn is_closed(&self) -> bool {
        self.close_called.load(Ordering::SeqCst) || self.transport_down.load(Ordering::SeqCst)
    }

    /// OS process id of the server, if it was available at spawn time.
    pub fn server_pid(&self) -> Option<u32> {
        self.pid
    }

    /// Shut the server down: close its stdin, give it `grace` to exit, then
    /// kill it.  Only the first call does anything, even when the server
    /// already closed its output.
    pub async fn close(&self, grace: Duration) -> Result<(), McpError> {
        if self.close_called.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Dropping the writer closes the server's stdin.
        self.writer.lock().await.take();

        if let Some(mut child) = self.child.lock().await.take() {
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(Ok(status)) => debug!(%status, "MCP server exited"),
                Ok(Err(e)) => warn!("waiting for MCP server failed: {e}"),
                Err(_) => {
                    warn!(?grace, "MCP server did not exit in time; killing it");
                    if let Err(e) = child.kill().await {
                        warn!("killing MCP server failed: {e}");
                    }
                }
            }
        }

        self.abort_tasks();
        fail_pending(&self.pending);
        info!("MCP server connection closed");
        Ok(())
    }

    async fn send(&self, msg: Value) -> Result<(), McpError> {
        let mut guard = self.writer.lock().await;
        let sink = guard.as_mut().ok_or(McpError::Closed)?;
        sink.send(msg.to_string()).await?;
        Ok(())
    }

    fn forget(&self, id: u64) {
        lock_pending(&self.pending).remove(&id);
    }

    fn abort_tasks(&self) {
        for slot in [&self.reader, &self.stderr] {
            if let Some(handle) = slot.lock().ok().and_then(|mut h| h.take()) {
                handle.abort();
            }
        }
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        // The child is killed by kill_on_drop; only the tasks need stopping.
        self.abort_tasks();
    }
}

/// Route everything the server writes on stdout until it goes away.
async fn read_loop(
    stdout: ChildStdout,
    pending: Pending,
    writer: Writer,
    transport_down: Arc<AtomicBool>,
    close_called: Arc<AtomicBool>,
) {
    let mut lines = FramedRead::new(stdout, LinesCodec::new());
    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!("MCP transport error: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let msg: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                warn!("ignoring malformed MCP message: {e}");
                continue;
            }
        };

        match protocol::classify(msg) {
            Incoming::Response { id, result } => {
                let tx = lock_pending(&pending).remove(&id);
                match tx {
                    Some(tx) => {
                        let _ = tx.send(result);
                    }
                    None => debug!(id, "response for unknown request id"),
                }
            }
            Incoming::Request { id, method } => {
                let reply = if method == "ping" {
                    protocol::response(id, json!({}))
                } else {
                    debug!(%method, "rejecting server request");
                    protocol::error_response(id, protocol::METHOD_NOT_FOUND, "method not found")
                };
                if let Some(sink) = writer.lock().await.as_mut() {
                    if let Err(e) = sink.send(reply.to_string()).await {
                        warn!("failed to answer MCP server request: {e}");
                    }
                }
            }
            Incoming::Notification { method, params } => {
                debug!(%method, %params, "MCP notification");
            }
            Incoming::Invalid(raw) => warn!("unrecognised MCP message: {raw}"),
        }
    }

    if !close_called.load(Ordering::SeqCst) {
        warn!("MCP server closed its output");
    }
    transport_down.store(true, Ordering::SeqCst);
    fail_pending(&pending);
}

fn lock_pending(pending: &Pending) -> MutexGuard<'_, PendingMap> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fail every outstanding request with [`McpError::Closed`].
fn fail_pending(pending: &Pending) {
    let drained: Vec<_> = lock_pending(pending).drain().map(|(_, tx)| tx).collect();
    for tx in drained {
        let _ = tx.send(Err(McpError::Closed));
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
