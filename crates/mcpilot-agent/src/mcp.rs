//! MCP client over stdio.
//!
//! Spawns the skill's server as a child process and speaks newline-delimited
//! JSON-RPC 2.0 on its stdin/stdout:
//!
//! 1. `initialize` (protocol `2024-11-05`) → `notifications/initialized`
//! 2. `tools/list` (following `nextCursor`)
//! 3. `tools/call {name, arguments}`
//!
//! The client is single-flight: one request at a time through `&mut self`,
//! so responses are matched by reading forward to the expected id. Stale
//! responses from timed-out requests and server notifications are skipped.
//! The server's stderr is forwarded to `tracing` at debug level.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use mcpilot_core::McpError;

use crate::backend::{BackendConnection, Connector, OperationSpec, ToolOutput};
use crate::skills::SkillDescriptor;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// How long a closing server gets to exit on its own before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

// ─────────────────────────────────────────────
// JSON-RPC wire types
// ─────────────────────────────────────────────

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: i64,
    method: &'a str,
    params: Value,
}

#[derive(Serialize)]
struct JsonRpcNotification<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
}

/// Any incoming message: response, notification, or server request.
#[derive(Debug, Deserialize)]
struct JsonRpcMessage {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListToolsResult {
    #[serde(default)]
    tools: Vec<McpTool>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct McpTool {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "empty_schema")]
    input_schema: Value,
}

fn empty_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallToolResult {
    #[serde(default)]
    content: Vec<ContentItem>,
    #[serde(default)]
    is_error: bool,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

// ─────────────────────────────────────────────
// McpStdioClient
// ─────────────────────────────────────────────

/// A live MCP session with one child process.
///
/// The child is spawned with `kill_on_drop`, so dropping the client without
/// calling [`BackendConnection::close`] still reaps the server.
pub struct McpStdioClient {
    skill: String,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: i64,
    timeout: Duration,
}

impl std::fmt::Debug for McpStdioClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpStdioClient")
            .field("skill", &self.skill)
            .field("pid", &self.child.id())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl McpStdioClient {
    /// Spawn the skill's server and complete the MCP handshake.
    pub async fn spawn(skill: &SkillDescriptor, timeout: Duration) -> Result<Self, McpError> {
        let mut cmd = Command::new(skill.command());
        cmd.args(skill.args())
            .envs(skill.env())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| McpError::Spawn {
            command: skill.command().to_string(),
            source,
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Protocol("child stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Protocol("child stdout not captured".into()))?;

        if let Some(stderr) = child.stderr.take() {
            let name = skill.name().to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(skill = %name, "stderr: {}", line);
                }
            });
        }

        let mut client = Self {
            skill: skill.name().to_string(),
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
            timeout,
        };
        client.initialize().await?;
        Ok(client)
    }

    async fn initialize(&mut self) -> Result<(), McpError> {
        let result = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "mcpilot",
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
            )
            .await?;

        let server_version = result
            .get("protocolVersion")
            .and_then(|v| v.as_str())
            .unwrap_or("?");
        if server_version != PROTOCOL_VERSION {
            debug!(skill = %self.skill, server_version, "Server negotiated a different protocol version");
        }

        self.notify("notifications/initialized", json!({})).await
    }

    async fn write_line(&mut self, line: String) -> Result<(), McpError> {
        let stdin = self.stdin.as_mut().ok_or(McpError::Closed)?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn notify(&mut self, method: &str, params: Value) -> Result<(), McpError> {
        let line = serde_json::to_string(&JsonRpcNotification {
            jsonrpc: "2.0",
            method,
            params,
        })?;
        self.write_line(line).await
    }

    /// Send one request and wait (bounded by the timeout) for its response.
    async fn request(&mut self, method: &str, params: Value) -> Result<Value, McpError> {
        let id = self.next_id;
        self.next_id += 1;

        let line = serde_json::to_string(&JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        })?;
        debug!(skill = %self.skill, id, method, "MCP request");
        self.write_line(line).await?;

        let timeout = self.timeout;
        match tokio::time::timeout(timeout, self.read_response(id)).await {
            Ok(result) => result,
            Err(_) => Err(McpError::Timeout(timeout)),
        }
    }

    /// Read forward until the response for `id` arrives.
    async fn read_response(&mut self, id: i64) -> Result<Value, McpError> {
        loop {
            let Some(line) = self.stdout.next_line().await? else {
                return Err(McpError::Closed);
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let message: JsonRpcMessage = match serde_json::from_str(line) {
                Ok(m) => m,
                Err(e) => {
                    warn!(skill = %self.skill, error = %e, "Ignoring non-JSON-RPC output");
                    continue;
                }
            };

            match (&message.id, &message.method) {
                // Server → client request.
                (Some(req_id), Some(method)) => {
                    let reply = if method == "ping" {
                        json!({"jsonrpc": "2.0", "id": req_id, "result": {}})
                    } else {
                        json!({
                            "jsonrpc": "2.0",
                            "id": req_id,
                            "error": {"code": -32601, "message": "Method not found"}
                        })
                    };
                    self.write_line(reply.to_string()).await?;
                }
                (None, Some(method)) => {
                    debug!(skill = %self.skill, method = %method, "MCP notification");
                }
                (Some(resp_id), None) if resp_id.as_i64() == Some(id) => {
                    if let Some(err) = message.error {
                        return Err(McpError::Server {
                            code: err.code,
                            message: err.message,
                        });
                    }
                    return Ok(message.result.unwrap_or(Value::Null));
                }
                (Some(resp_id), None) => {
                    debug!(skill = %self.skill, stale = %resp_id, expected = id, "Skipping stale response");
                }
                (None, None) => {
                    warn!(skill = %self.skill, "Ignoring JSON-RPC message without id or method");
                }
            }
        }
    }
}

#[async_trait]
impl BackendConnection for McpStdioClient {
    async fn list_operations(&mut self) -> Result<Vec<OperationSpec>, McpError> {
        let mut operations = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = match &cursor {
                Some(c) => json!({ "cursor": c }),
                None => json!({}),
            };
            let page: ListToolsResult = serde_json::from_value(self.request("tools/list", params).await?)?;
            operations.extend(page.tools.into_iter().map(|t| OperationSpec {
                name: t.name,
                description: t.description.unwrap_or_default(),
                parameters: t.input_schema,
            }));
            match page.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(operations)
    }

    async fn call(&mut self, name: &str, arguments: Value) -> Result<ToolOutput, McpError> {
        let result = self
            .request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await?;
        let result: CallToolResult = serde_json::from_value(result)?;

        let segments = result
            .content
            .into_iter()
            .filter(|c| c.kind == "text")
            .filter_map(|c| c.text)
            .collect();
        Ok(ToolOutput {
            segments,
            is_error: result.is_error,
        })
    }

    async fn close(&mut self) {
        // Closing stdin is the MCP stdio shutdown signal.
        self.stdin.take();
        match tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => debug!(skill = %self.skill, %status, "MCP server exited"),
            Ok(Err(e)) => warn!(skill = %self.skill, error = %e, "Failed to wait for MCP server"),
            Err(_) => {
                if let Err(e) = self.child.kill().await {
                    warn!(skill = %self.skill, error = %e, "Failed to kill MCP server");
                }
            }
        }
    }
}

// ─────────────────────────────────────────────
// StdioConnector
// ─────────────────────────────────────────────

/// Launches each skill's server as a stdio child process.
#[derive(Clone, Debug)]
pub struct StdioConnector {
    timeout: Duration,
}

impl StdioConnector {
    /// `timeout` bounds every request, including the handshake.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Connector for StdioConnector {
    async fn connect(&self, skill: &SkillDescriptor) -> Result<Box<dyn BackendConnection>, McpError> {
        let client = McpStdioClient::spawn(skill, self.timeout).await?;
        Ok(Box::new(client))
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
