use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use argocd_mcp_runtime::{McpServer, parse_error_response};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

const MCP_PATH: &str = "/mcp";
const SSE_PATH: &str = "/sse";
const MESSAGES_PATH: &str = "/messages";
/// Replies queued per SSE session before senders wait.
const SESSION_BUFFER: usize = 32;
static SESSION_ID_HEADER: HeaderName = HeaderName::from_static("mcp-session-id");

type Sessions = Arc<Mutex<HashMap<String, mpsc::Sender<Value>>>>;

#[derive(Clone)]
struct SseState {
    server: Arc<McpServer>,
    sessions: Sessions,
}

pub fn router(server: Arc<McpServer>) -> Router {
    Router::new()
        .route(MCP_PATH, post(mcp_post).get(mcp_get))
        .with_state(server)
}

/// Legacy SSE transport: `GET /sse` opens a session stream whose first
/// `endpoint` event names the `POST /messages?sessionId=` URL for requests.
/// Replies arrive on the stream as `message` events.
pub fn sse_router(server: Arc<McpServer>) -> Router {
    let state = SseState {
        server,
        sessions: Sessions::default(),
    };
    Router::new()
        .route(SSE_PATH, get(sse_connect))
        .route(MESSAGES_PATH, post(sse_message))
        .with_state(state)
}

pub async fn serve(server: Arc<McpServer>, port: u16) -> std::io::Result<()> {
    let app = router(server.clone());
    listen(app, &server, port, "HTTP").await
}

pub async fn serve_sse(server: Arc<McpServer>, port: u16) -> std::io::Result<()> {
    let app = sse_router(server.clone());
    listen(app, &server, port, "SSE").await
}

async fn listen(
    app: Router,
    server: &McpServer,
    port: u16,
    transport: &'static str,
) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        transport,
        mode = server.mode().as_str(),
        tools = server.registry().len(),
        "serving MCP"
    );
    axum::serve(listener, app).await
}

async fn mcp_get() -> Response {
    StatusCode::METHOD_NOT_ALLOWED.into_response()
}

async fn mcp_post(State(server): State<Arc<McpServer>>, body: Bytes) -> Response {
    let incoming: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(error = %err, "unparseable MCP request body");
            return (StatusCode::OK, Json(parse_error_response(&err))).into_response();
        }
    };

    let starts_session = is_initialize(&incoming);
    let Some(reply) = server.respond(incoming).await else {
        return StatusCode::ACCEPTED.into_response();
    };

    let mut response = (StatusCode::OK, Json(reply)).into_response();
    if starts_session {
        if let Ok(session_id) = HeaderValue::from_str(&Uuid::now_v7().to_string()) {
            response
                .headers_mut()
                .insert(SESSION_ID_HEADER.clone(), session_id);
        }
    }
    response
}

/// Removes its session from the map when the event stream is dropped.
struct SessionGuard {
    sessions: Sessions,
    id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
        tracing::info!(session = %self.id, "SSE session closed");
    }
}

async fn sse_connect(
    State(state): State<SseState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = Uuid::now_v7().to_string();
    let (sender, receiver) = mpsc::channel::<Value>(SESSION_BUFFER);
    state
        .sessions
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(session_id.clone(), sender);
    tracing::info!(session = %session_id, "SSE session opened");

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("{MESSAGES_PATH}?sessionId={session_id}"));
    let guard = SessionGuard {
        sessions: state.sessions.clone(),
        id: session_id,
    };
    let replies = ReceiverStream::new(receiver).map(move |reply| {
        let _session = &guard;
        Ok::<_, Infallible>(Event::default().event("message").data(reply.to_string()))
    });
    Sse::new(tokio_stream::once(Ok(endpoint)).chain(replies)).keep_alive(KeepAlive::default())
}

async fn sse_message(
    State(state): State<SseState>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let session_id = params.get("sessionId").map(String::as_str).unwrap_or_default();
    let sender = state
        .sessions
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(session_id)
        .cloned();
    let Some(sender) = sender else {
        return (
            StatusCode::BAD_REQUEST,
            format!("No transport found for sessionId: {session_id}"),
        )
            .into_response();
    };

    let incoming: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(error = %err, session = %session_id, "unparseable MCP message");
            return (StatusCode::BAD_REQUEST, format!("Invalid message: {err}")).into_response();
        }
    };

    let server = state.server.clone();
    let session_id = session_id.to_string();
    tokio::spawn(async move {
        let Some(reply) = server.respond(incoming).await else {
            return;
        };
        if sender.send(reply).await.is_err() {
            tracing::debug!(session = %session_id, "SSE session closed before reply");
        }
    });
    (StatusCode::ACCEPTED, "Accepted").into_response()
}

fn is_initialize(incoming: &Value) -> bool {
    let method_is_initialize =
        |message: &Value| message.get("method").and_then(Value::as_str) == Some("initialize");
    match incoming {
        Value::Array(batch) => batch.iter().any(method_is_initialize),
        message => method_is_initialize(message),
    }
}
