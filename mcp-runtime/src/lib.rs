use std::io::{Error as IoError, ErrorKind};

use clap::Args;
use serde_json::{Map, Value, json};
use tokio::io::{
    self, AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};

pub mod client;
pub mod envelope;
pub mod registry;
pub mod tools;

pub use client::{ArgoCdClient, ClientError};
pub use envelope::ToolResult;
pub use registry::{AccessMode, READ_ONLY_ENV, ToolDefinition, ToolRegistry};
pub use tools::{TOOL_CATALOG, ToolError};

const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const MCP_SERVER_NAME: &str = "argocd-mcp";
/// Largest `Content-Length` body accepted on stdio.
const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// Backend connection flags shared by every subcommand that talks to Argo CD.
#[derive(Args, Clone, Debug, Default)]
pub struct BackendArgs {
    /// Argo CD base URL, e.g. https://argocd.example.com
    #[arg(long = "url", env = "ARGOCD_BASE_URL")]
    pub url: Option<String>,
    /// Argo CD API token
    #[arg(long, env = "ARGOCD_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Clone, Debug)]
pub struct McpRuntimeConfig {
    pub base_url: String,
    pub api_token: String,
    pub mode: AccessMode,
}

/// One MCP server instance: an immutable tool registry bound to a backend
/// client. Safe to share between concurrent requests.
#[derive(Debug)]
pub struct McpServer {
    client: ArgoCdClient,
    registry: ToolRegistry,
    mode: AccessMode,
}

/// Wire framing of one stdio message. Replies use the framing of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    NewlineDelimited,
    ContentLength,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: -32700,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
        }
    }
}

impl McpServer {
    pub fn new(config: McpRuntimeConfig) -> Result<Self, ClientError> {
        let client = ArgoCdClient::new(&config.base_url, config.api_token)?;
        Ok(Self {
            client,
            registry: ToolRegistry::new(TOOL_CATALOG, config.mode),
            mode: config.mode,
        })
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn serve_stdio(&self) -> io::Result<()> {
        tracing::info!(
            mode = self.mode.as_str(),
            tools = self.registry.len(),
            "serving MCP over stdio"
        );
        self.serve(BufReader::new(io::stdin()), io::stdout()).await
    }

    /// Answers messages from `reader` until EOF. Unparseable or badly framed
    /// messages get a parse error reply and the session continues.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        loop {
            let (framing, payload) = match read_message(&mut reader).await {
                Ok(Some(message)) => message,
                Ok(None) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::InvalidData => {
                    tracing::warn!(error = %err, "badly framed MCP message");
                    let reply = error_response(
                        Value::Null,
                        RpcError::parse_error(format!("Parse error: {err}")),
                    );
                    write_message(&mut writer, Framing::ContentLength, &reply).await?;
                    continue;
                }
                Err(err) => return Err(err),
            };
            let reply = match serde_json::from_slice::<Value>(&payload) {
                Ok(incoming) => self.respond(incoming).await,
                Err(err) => {
                    tracing::warn!(error = %err, "unparseable MCP message");
                    Some(parse_error_response(&err))
                }
            };
            if let Some(reply) = reply {
                write_message(&mut writer, framing, &reply).await?;
            }
        }
    }

    /// Reply to one incoming payload, keeping its shape: a batch yields an
    /// array, a single message an object. `None` when nothing needs an answer.
    pub async fn respond(&self, incoming: Value) -> Option<Value> {
        let is_batch = incoming.is_array();
        let mut responses = self.handle_incoming_message(incoming).await;
        if is_batch {
            (!responses.is_empty()).then(|| Value::Array(responses))
        } else {
            responses.pop()
        }
    }

    pub async fn handle_incoming_message(&self, incoming: Value) -> Vec<Value> {
        let mut responses = Vec::new();

        if let Value::Array(batch) = incoming {
            if batch.is_empty() {
                responses.push(error_response(
                    Value::Null,
                    RpcError::invalid_request("Batch request must not be empty"),
                ));
                return responses;
            }
            for item in batch {
                if let Some(response) = self.handle_single_message(item).await {
                    responses.push(response);
                }
            }
            return responses;
        }

        if let Some(response) = self.handle_single_message(incoming).await {
            responses.push(response);
        }
        responses
    }

    async fn handle_single_message(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            tracing::warn!("MCP message is not a JSON object");
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            tracing::warn!("MCP message without jsonrpc 2.0 marker");
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            // A client response; this server never issues requests.
            return None;
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        let id = obj.get("id").cloned()?;
        Some(match self.handle_request(method, params).await {
            Ok(payload) => success_response(id, payload),
            Err(err) => error_response(id, err),
        })
    }

    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            "resources/list" => Ok(json!({ "resources": [] })),
            "prompts/list" => Ok(json!({ "prompts": [] })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    fn initialize_payload(&self) -> Value {
        let instructions = match self.mode {
            AccessMode::ReadOnly => {
                "Inspect Argo CD applications: list and filter them, read resource trees, managed resources, events, logs and available resource actions. Mode: read_only. Tools that create, update, delete or sync applications or run resource actions are not available."
            }
            AccessMode::ReadWrite => {
                "Inspect and manage Argo CD applications: list and filter them, read resource trees, managed resources, events, logs and resource actions, and create, update, delete or sync applications. Mode: read_write. Confirm destructive operations with the user first."
            }
        };
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": {
                    "listChanged": false
                }
            },
            "serverInfo": {
                "name": MCP_SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": instructions
        })
    }

    fn tools_list_payload(&self) -> Value {
        let tools: Vec<Value> = self.registry.iter().map(ToolDefinition::to_value).collect();
        json!({ "tools": tools })
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;

        let args = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        Ok(self.call_tool(name, args).await?.to_value())
    }

    /// Dispatches one tool call. Only an unregistered name is a protocol
    /// error; every other outcome ends in a [`ToolResult`].
    pub async fn call_tool(
        &self,
        name: &str,
        args: Map<String, Value>,
    ) -> Result<ToolResult, RpcError> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| RpcError::invalid_params(format!("Unknown tool: {name}")))?;

        let outcome = match tool.validate(&args) {
            Ok(()) => self.execute_tool(tool.id, args).await,
            Err(message) => Err(ToolError::InvalidArguments {
                tool: tool.name(),
                message,
            }),
        };
        let result = ToolResult::from_outcome(outcome);
        tracing::info!(
            tool = tool.name(),
            is_error = result.is_error,
            "tool call completed"
        );
        Ok(result)
    }
}

pub fn parse_error_response(err: &serde_json::Error) -> Value {
    error_response(
        Value::Null,
        RpcError::parse_error(format!("Parse error: {err}")),
    )
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, error: RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    })
}

/// Reads the next message body. A first line opening a JSON value is taken
/// as one newline-delimited message; anything else starts a header block
/// terminated by an empty line. `None` on clean EOF. Bad headers and bodies
/// over `MAX_MESSAGE_BYTES` are `InvalidData`; an oversized body is skipped.
pub async fn read_message<R>(reader: &mut R) -> io::Result<Option<(Framing, Vec<u8>)>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with(b"{") || trimmed.starts_with(b"[") || !trimmed.contains(&b':') {
            return Ok(Some((Framing::NewlineDelimited, trimmed.to_vec())));
        }
        break;
    }

    // The whole header block is consumed before a bad header is reported so
    // the next read starts at the body.
    let mut content_length = None;
    let mut invalid_header = None;
    loop {
        match content_length_header(&line) {
            Ok(Some(length)) => content_length = Some(length),
            Ok(None) => {}
            Err(err) => invalid_header = Some(err),
        }
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Err(IoError::new(
                ErrorKind::UnexpectedEof,
                "Unexpected EOF while reading MCP headers",
            ));
        }
        if line.trim_ascii().is_empty() {
            break;
        }
    }
    if let Some(err) = invalid_header {
        return Err(err);
    }

    let content_length = content_length
        .ok_or_else(|| IoError::new(ErrorKind::InvalidData, "Missing Content-Length header"))?;
    if content_length > MAX_MESSAGE_BYTES {
        io::copy(&mut (&mut *reader).take(content_length as u64), &mut io::sink()).await?;
        return Err(IoError::new(
            ErrorKind::InvalidData,
            format!("Content-Length {content_length} exceeds the {MAX_MESSAGE_BYTES} byte limit"),
        ));
    }
    let mut payload = vec![0_u8; content_length];
    reader.read_exact(&mut payload).await?;
    Ok(Some((Framing::ContentLength, payload)))
}

fn content_length_header(line: &[u8]) -> io::Result<Option<usize>> {
    let line = String::from_utf8_lossy(line);
    let Some((name, value)) = line.split_once(':') else {
        return Ok(None);
    };
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return Ok(None);
    }
    value
        .trim()
        .parse::<usize>()
        .map(Some)
        .map_err(|_| IoError::new(ErrorKind::InvalidData, "Invalid Content-Length header"))
}

pub async fn write_message<W>(writer: &mut W, framing: Framing, value: &Value) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value).map_err(|e| {
        IoError::new(
            ErrorKind::InvalidData,
            format!("Failed to serialize JSON: {e}"),
        )
    })?;
    match framing {
        Framing::NewlineDelimited => {
            writer.write_all(&body).await?;
            writer.write_all(b"\n").await?;
        }
        Framing::ContentLength => {
            let header = format!(
                "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
                body.len()
            );
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(&body).await?;
        }
    }
    writer.flush().await
}
