use argocd_mcp_core::{DEFAULT_TAIL_LINES, LogCollector, LogEntry, LogStreamError, ResourceRef};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use url::Url;

type Query = Vec<(&'static str, String)>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid Argo CD base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("Failed to reach Argo CD at {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Argo CD API returned HTTP {status} for {path}: {message}")]
    Status {
        status: u16,
        path: String,
        message: String,
    },
    #[error("Failed to decode Argo CD response from {path}: {message}")]
    Decode { path: String, message: String },
    #[error(transparent)]
    LogStream(#[from] LogStreamError),
}

/// Optional query filters of the managed-resources endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedResourceFilters {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub app_namespace: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
}

impl ManagedResourceFilters {
    fn query(&self) -> Query {
        let mut query = Query::new();
        push_opt(&mut query, "kind", self.kind.as_deref());
        push_opt(&mut query, "namespace", self.namespace.as_deref());
        push_opt(&mut query, "name", self.name.as_deref());
        push_opt(&mut query, "version", self.version.as_deref());
        push_opt(&mut query, "group", self.group.as_deref());
        push_opt(&mut query, "appNamespace", self.app_namespace.as_deref());
        push_opt(&mut query, "project", self.project.as_deref());
        query
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    pub app_namespace: Option<String>,
    pub cascade: Option<bool>,
    pub propagation_policy: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub app_namespace: Option<String>,
    pub dry_run: Option<bool>,
    pub prune: Option<bool>,
    pub revision: Option<String>,
    pub sync_options: Option<Vec<String>>,
}

impl SyncOptions {
    fn body(&self) -> Value {
        let mut body = json!({});
        if let Some(app_namespace) = &self.app_namespace {
            body["appNamespace"] = json!(app_namespace);
        }
        if let Some(dry_run) = self.dry_run {
            body["dryRun"] = json!(dry_run);
        }
        if let Some(prune) = self.prune {
            body["prune"] = json!(prune);
        }
        if let Some(revision) = &self.revision {
            body["revision"] = json!(revision);
        }
        if let Some(items) = &self.sync_options {
            body["syncOptions"] = json!({ "items": items });
        }
        body
    }
}

/// Query parameters of the resource events lookup.
#[derive(Debug, Clone)]
pub struct ResourceEventsQuery {
    pub app_namespace: String,
    pub resource_uid: String,
    pub resource_namespace: String,
    pub resource_name: String,
}

/// Thin typed client over the Argo CD REST API.
///
/// Holds only immutable configuration, so one instance is shared by every
/// in-flight tool call. Responses are returned as raw JSON.
#[derive(Debug, Clone)]
pub struct ArgoCdClient {
    base_url: Url,
    api_token: String,
    tail_lines: usize,
    http: reqwest::Client,
}

impl ArgoCdClient {
    pub fn new(base_url: &str, api_token: impl Into<String>) -> Result<Self, ClientError> {
        let parsed = Url::parse(base_url.trim()).map_err(|e| ClientError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "expected an http(s) URL".to_string(),
            });
        }
        Ok(Self {
            base_url: parsed,
            api_token: api_token.into(),
            tail_lines: DEFAULT_TAIL_LINES,
            http: reqwest::Client::new(),
        })
    }

    /// Overrides the per-call log line cap.
    #[cfg(test)]
    pub(crate) fn with_tail_lines(mut self, tail_lines: usize) -> Self {
        self.tail_lines = tail_lines;
        self
    }

    pub async fn list_applications(&self) -> Result<Value, ClientError> {
        self.request_json(Method::GET, &[], Query::new(), None).await
    }

    pub async fn get_application(
        &self,
        name: &str,
        app_namespace: Option<&str>,
    ) -> Result<Value, ClientError> {
        self.request_json(Method::GET, &[name], app_namespace_query(app_namespace), None)
            .await
    }

    pub async fn create_application(&self, application: &Value) -> Result<Value, ClientError> {
        self.request_json(Method::POST, &[], Query::new(), Some(application))
            .await
    }

    pub async fn update_application(
        &self,
        name: &str,
        application: &Value,
    ) -> Result<Value, ClientError> {
        self.request_json(Method::PUT, &[name], Query::new(), Some(application))
            .await
    }

    pub async fn delete_application(
        &self,
        name: &str,
        options: &DeleteOptions,
    ) -> Result<Value, ClientError> {
        let mut query = app_namespace_query(options.app_namespace.as_deref());
        if let Some(cascade) = options.cascade {
            query.push(("cascade", cascade.to_string()));
        }
        push_opt(
            &mut query,
            "propagationPolicy",
            options.propagation_policy.as_deref(),
        );
        self.request_json(Method::DELETE, &[name], query, None).await
    }

    pub async fn sync_application(
        &self,
        name: &str,
        options: &SyncOptions,
    ) -> Result<Value, ClientError> {
        let body = options.body();
        self.request_json(Method::POST, &[name, "sync"], Query::new(), Some(&body))
            .await
    }

    pub async fn get_resource_tree(
        &self,
        name: &str,
        app_namespace: Option<&str>,
    ) -> Result<Value, ClientError> {
        self.request_json(
            Method::GET,
            &[name, "resource-tree"],
            app_namespace_query(app_namespace),
            None,
        )
        .await
    }

    pub async fn get_managed_resources(
        &self,
        name: &str,
        filters: &ManagedResourceFilters,
    ) -> Result<Value, ClientError> {
        self.request_json(
            Method::GET,
            &[name, "managed-resources"],
            filters.query(),
            None,
        )
        .await
    }

    /// Finite snapshot of a workload's logs: never follows, capped at the
    /// configured tail line count.
    pub async fn get_workload_logs(
        &self,
        name: &str,
        app_namespace: &str,
        resource: &ResourceRef,
        container: Option<&str>,
    ) -> Result<Vec<LogEntry>, ClientError> {
        let mut query: Query = vec![("appNamespace", app_namespace.to_string())];
        query.extend(resource.query_pairs());
        push_opt(&mut query, "container", container);
        self.collect_logs(&[name, "logs"], query).await
    }

    pub async fn get_pod_logs(
        &self,
        name: &str,
        pod_name: &str,
        app_namespace: Option<&str>,
        container: Option<&str>,
    ) -> Result<Vec<LogEntry>, ClientError> {
        let mut query = app_namespace_query(app_namespace);
        push_opt(&mut query, "container", container);
        self.collect_logs(&[name, "pods", pod_name, "logs"], query)
            .await
    }

    pub async fn get_application_events(
        &self,
        name: &str,
        app_namespace: Option<&str>,
    ) -> Result<Value, ClientError> {
        self.request_json(
            Method::GET,
            &[name, "events"],
            app_namespace_query(app_namespace),
            None,
        )
        .await
    }

    pub async fn get_resource_events(
        &self,
        name: &str,
        lookup: &ResourceEventsQuery,
    ) -> Result<Value, ClientError> {
        let query = vec![
            ("appNamespace", lookup.app_namespace.clone()),
            ("resourceNamespace", lookup.resource_namespace.clone()),
            ("resourceUID", lookup.resource_uid.clone()),
            ("resourceName", lookup.resource_name.clone()),
        ];
        self.request_json(Method::GET, &[name, "events"], query, None)
            .await
    }

    pub async fn get_resource_actions(
        &self,
        name: &str,
        app_namespace: &str,
        resource: &ResourceRef,
    ) -> Result<Value, ClientError> {
        let mut query: Query = vec![("appNamespace", app_namespace.to_string())];
        query.extend(resource.query_pairs());
        self.request_json(Method::GET, &[name, "resource", "actions"], query, None)
            .await
    }

    pub async fn run_resource_action(
        &self,
        name: &str,
        app_namespace: &str,
        resource: &ResourceRef,
        action: &str,
    ) -> Result<Value, ClientError> {
        let mut query: Query = vec![("appNamespace", app_namespace.to_string())];
        query.extend(resource.query_pairs());
        let body = Value::String(action.to_string());
        self.request_json(
            Method::POST,
            &[name, "resource", "actions"],
            query,
            Some(&body),
        )
        .await
    }

    /// `/api/v1/applications[/<segment>...]`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str], query: &Query) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend(["api", "v1", "applications"])
                .extend(segments);
        }
        url.set_query(None);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        url
    }

    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        query: Query,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, ClientError> {
        let url = self.endpoint(segments, &query);
        let path = url.path().to_string();
        tracing::debug!(method = %method, path = %path, "argocd request");

        let mut request = self
            .http
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.api_token));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| ClientError::Connection {
            url: self.base_url.to_string(),
            source: e,
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = match response.bytes().await {
            Ok(bytes) => error_message(&bytes, status.canonical_reason()),
            Err(err) => {
                tracing::debug!(error = %err, path = %path, "failed to read error body");
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            }
        };
        Err(ClientError::Status {
            status: status.as_u16(),
            path,
            message,
        })
    }

    async fn request_json(
        &self,
        method: Method,
        segments: &[&str],
        query: Query,
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        let response = self.send(method, segments, query, body).await?;
        let path = response.url().path().to_string();
        let bytes = response.bytes().await.map_err(|e| ClientError::Decode {
            path: path.clone(),
            message: e.to_string(),
        })?;
        parse_response_body(&bytes).map_err(|message| ClientError::Decode { path, message })
    }

    async fn collect_logs(
        &self,
        segments: &[&str],
        mut query: Query,
    ) -> Result<Vec<LogEntry>, ClientError> {
        query.push(("follow", "false".to_string()));
        query.push(("tailLines", self.tail_lines.to_string()));

        let mut response = self.send(Method::GET, segments, query, None).await?;
        let mut collector = LogCollector::new(self.tail_lines);
        loop {
            let chunk = response.chunk().await.map_err(|e| ClientError::Connection {
                url: self.base_url.to_string(),
                source: e,
            })?;
            let Some(chunk) = chunk else {
                break;
            };
            if collector.push(&chunk)? {
                break;
            }
        }
        Ok(collector.finish()?)
    }
}

fn push_opt(query: &mut Query, key: &'static str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        query.push((key, value.to_string()));
    }
}

fn app_namespace_query(app_namespace: Option<&str>) -> Query {
    let mut query = Query::new();
    push_opt(&mut query, "appNamespace", app_namespace);
    query
}

fn parse_response_body(bytes: &[u8]) -> Result<Value, String> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|e| e.to_string())
}

/// Prefers the backend's `message`/`error` field, falling back to the raw body.
fn error_message(bytes: &[u8], reason: Option<&str>) -> String {
    if let Ok(body) = serde_json::from_slice::<Value>(bytes) {
        for key in ["message", "error"] {
            if let Some(text) = body.get(key).and_then(Value::as_str) {
                if !text.is_empty() {
                    return text.to_string();
                }
            }
        }
    }
    let text = String::from_utf8_lossy(bytes).trim().to_string();
    if text.is_empty() {
        reason.unwrap_or("request failed").to_string()
    } else {
        text
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use axum::Router;
    use axum::body::Bytes;
    use axum::extract::{RawQuery, State};
    use axum::http::{HeaderMap, Method as HttpMethod, StatusCode, Uri};
    use axum::response::IntoResponse;

    use super::*;

    /// Request seen by the fake backend.
    #[derive(Debug, Clone)]
    pub(crate) struct Recorded {
        pub method: String,
        pub path: String,
        pub query: String,
        pub authorization: String,
        pub body: String,
    }

    pub(crate) type Log = Arc<Mutex<Vec<Recorded>>>;

    /// Serves canned responses keyed by path and records every request.
    pub(crate) async fn spawn_backend(
        routes: Vec<(&'static str, StatusCode, String)>,
    ) -> (String, Log) {
        let log: Log = Arc::default();
        let routes = Arc::new(routes);
        let app = Router::new().fallback({
            let routes = routes.clone();
            move |State(log): State<Log>,
                  method: HttpMethod,
                  uri: Uri,
                  RawQuery(query): RawQuery,
                  headers: HeaderMap,
                  body: Bytes| {
                let routes = routes.clone();
                async move {
                    log.lock().unwrap().push(Recorded {
                        method: method.to_string(),
                        path: uri.path().to_string(),
                        query: query.unwrap_or_default(),
                        authorization: headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string(),
                        body: String::from_utf8_lossy(&body).to_string(),
                    });
                    match routes.iter().find(|(path, _, _)| *path == uri.path()) {
                        Some((_, status, body)) => (*status, body.clone()).into_response(),
                        None => (StatusCode::NOT_FOUND, "{\"message\":\"no route\"}".to_string())
                            .into_response(),
                    }
                }
            }
        });
        let app = app.with_state(log.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), log)
    }

    fn ok(path: &'static str, body: Value) -> (&'static str, StatusCode, String) {
        (path, StatusCode::OK, body.to_string())
    }

    fn resource() -> ResourceRef {
        ResourceRef {
            uid: None,
            kind: "Deployment".into(),
            namespace: "web".into(),
            name: "frontend".into(),
            version: "v1".into(),
            group: "apps".into(),
        }
    }

    #[test]
    fn new_rejects_non_http_urls() {
        assert!(matches!(
            ArgoCdClient::new("not a url", "t"),
            Err(ClientError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            ArgoCdClient::new("mailto:ops@example.com", "t"),
            Err(ClientError::InvalidBaseUrl { .. })
        ));
        assert!(ArgoCdClient::new("https://argocd.example.com", "t").is_ok());
    }

    #[test]
    fn endpoint_encodes_segments_and_keeps_base_path() {
        let client = ArgoCdClient::new("https://example.com/argocd/", "t").unwrap();
        let url = client.endpoint(&["my app", "logs"], &vec![("follow", "false".into())]);
        assert_eq!(
            url.as_str(),
            "https://example.com/argocd/api/v1/applications/my%20app/logs?follow=false"
        );
    }

    #[test]
    fn error_message_prefers_backend_message() {
        assert_eq!(
            error_message(br#"{"error":"x","message":"app not found"}"#, Some("Not Found")),
            "app not found"
        );
        assert_eq!(error_message(b"plain failure", None), "plain failure");
        assert_eq!(error_message(b"", Some("Forbidden")), "Forbidden");
    }

    #[tokio::test]
    async fn get_application_sends_bearer_token_and_namespace() {
        let (url, log) = spawn_backend(vec![ok(
            "/api/v1/applications/guestbook",
            json!({ "metadata": { "name": "guestbook" } }),
        )])
        .await;
        let client = ArgoCdClient::new(&url, "secret-token").unwrap();

        let app = client
            .get_application("guestbook", Some("argocd"))
            .await
            .unwrap();

        assert_eq!(app["metadata"]["name"], "guestbook");
        let seen = log.lock().unwrap()[0].clone();
        assert_eq!(seen.method, "GET");
        assert_eq!(seen.authorization, "Bearer secret-token");
        assert_eq!(seen.query, "appNamespace=argocd");
    }

    #[tokio::test]
    async fn http_failures_become_status_errors() {
        let (url, _log) = spawn_backend(vec![(
            "/api/v1/applications/missing",
            StatusCode::NOT_FOUND,
            json!({ "error": "not found", "code": 5, "message": "applications.argoproj.io \"missing\" not found" }).to_string(),
        )])
        .await;
        let client = ArgoCdClient::new(&url, "t").unwrap();

        let err = client.get_application("missing", None).await.unwrap_err();
        match &err {
            ClientError::Status { status, message, .. } => {
                assert_eq!(*status, 404);
                assert_eq!(message, "applications.argoproj.io \"missing\" not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("HTTP 404"));
    }

    #[tokio::test]
    async fn non_json_success_body_is_a_decode_error() {
        let (url, _log) = spawn_backend(vec![(
            "/api/v1/applications",
            StatusCode::OK,
            "<html>login</html>".to_string(),
        )])
        .await;
        let client = ArgoCdClient::new(&url, "t").unwrap();
        let err = client.list_applications().await.unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }));
    }

    #[tokio::test]
    async fn connection_failures_are_reported() {
        let client = ArgoCdClient::new("http://127.0.0.1:9", "t").unwrap();
        let err = client.list_applications().await.unwrap_err();
        assert!(matches!(err, ClientError::Connection { .. }));
    }

    #[tokio::test]
    async fn managed_resources_pass_filters_as_query() {
        let (url, log) = spawn_backend(vec![ok(
            "/api/v1/applications/guestbook/managed-resources",
            json!({ "items": [] }),
        )])
        .await;
        let client = ArgoCdClient::new(&url, "t").unwrap();
        let filters = ManagedResourceFilters {
            kind: Some("Deployment".into()),
            group: Some("apps".into()),
            project: Some("default".into()),
            ..Default::default()
        };

        client
            .get_managed_resources("guestbook", &filters)
            .await
            .unwrap();

        assert_eq!(
            log.lock().unwrap()[0].query,
            "kind=Deployment&group=apps&project=default"
        );
    }

    #[tokio::test]
    async fn workload_logs_are_capped_and_never_follow() {
        let stream: String = (0..150)
            .map(|i| format!("{{\"result\":{{\"content\":\"line {i}\"}}}}\n"))
            .collect();
        let (url, log) = spawn_backend(vec![(
            "/api/v1/applications/guestbook/logs",
            StatusCode::OK,
            stream,
        )])
        .await;
        let client = ArgoCdClient::new(&url, "t").unwrap();

        let entries = client
            .get_workload_logs("guestbook", "argocd", &resource(), Some("app"))
            .await
            .unwrap();

        assert_eq!(entries.len(), DEFAULT_TAIL_LINES);
        assert_eq!(entries[0].content, "line 0");
        let query = log.lock().unwrap()[0].query.clone();
        assert_eq!(
            query,
            "appNamespace=argocd&namespace=web&resourceName=frontend&group=apps&kind=Deployment&version=v1&container=app&follow=false&tailLines=100"
        );
    }

    #[tokio::test]
    async fn pod_logs_honor_custom_tail_lines() {
        let stream: String = (0..5)
            .map(|i| format!("{{\"result\":{{\"content\":\"pod {i}\"}}}}\n"))
            .collect();
        let (url, log) = spawn_backend(vec![(
            "/api/v1/applications/guestbook/pods/web-0/logs",
            StatusCode::OK,
            stream,
        )])
        .await;
        let client = ArgoCdClient::new(&url, "t").unwrap().with_tail_lines(2);

        let entries = client
            .get_pod_logs("guestbook", "web-0", None, None)
            .await
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(log.lock().unwrap()[0].query, "follow=false&tailLines=2");
    }

    #[tokio::test]
    async fn sync_posts_options_body() {
        let (url, log) = spawn_backend(vec![ok(
            "/api/v1/applications/guestbook/sync",
            json!({ "metadata": { "name": "guestbook" } }),
        )])
        .await;
        let client = ArgoCdClient::new(&url, "t").unwrap();
        let options = SyncOptions {
            app_namespace: Some("argocd".into()),
            dry_run: Some(true),
            prune: None,
            revision: Some("main".into()),
            sync_options: Some(vec!["CreateNamespace=true".into()]),
        };

        client.sync_application("guestbook", &options).await.unwrap();

        let seen = log.lock().unwrap()[0].clone();
        assert_eq!(seen.method, "POST");
        let body: Value = serde_json::from_str(&seen.body).unwrap();
        assert_eq!(
            body,
            json!({
                "appNamespace": "argocd",
                "dryRun": true,
                "revision": "main",
                "syncOptions": { "items": ["CreateNamespace=true"] }
            })
        );
    }

    #[tokio::test]
    async fn delete_passes_cascade_and_policy() {
        let (url, log) = spawn_backend(vec![ok("/api/v1/applications/guestbook", json!({}))]).await;
        let client = ArgoCdClient::new(&url, "t").unwrap();
        let options = DeleteOptions {
            app_namespace: None,
            cascade: Some(false),
            propagation_policy: Some("background".into()),
        };

        client.delete_application("guestbook", &options).await.unwrap();

        let seen = log.lock().unwrap()[0].clone();
        assert_eq!(seen.method, "DELETE");
        assert_eq!(seen.query, "cascade=false&propagationPolicy=background");
    }

    #[tokio::test]
    async fn run_resource_action_posts_action_name() {
        let (url, log) = spawn_backend(vec![ok(
            "/api/v1/applications/guestbook/resource/actions",
            json!({}),
        )])
        .await;
        let client = ArgoCdClient::new(&url, "t").unwrap();

        client
            .run_resource_action("guestbook", "argocd", &resource(), "restart")
            .await
            .unwrap();

        let seen = log.lock().unwrap()[0].clone();
        assert_eq!(seen.method, "POST");
        assert_eq!(seen.body, "\"restart\"");
        assert!(seen.query.starts_with("appNamespace=argocd&namespace=web"));
    }

    #[tokio::test]
    async fn truncated_error_body_falls_back_to_status_reason() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0_u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 502 Bad Gateway\r\nContent-Length: 100\r\n\r\n{\"mes")
                .await
                .unwrap();
        });
        let client = ArgoCdClient::new(&format!("http://{addr}"), "t").unwrap();

        let err = client.get_application("guestbook", None).await.unwrap_err();

        match err {
            ClientError::Status {
                status, message, ..
            } => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn resource_actions_are_listed_with_get() {
        let (url, log) = spawn_backend(vec![ok(
            "/api/v1/applications/guestbook/resource/actions",
            json!({ "actions": [{ "name": "restart" }] }),
        )])
        .await;
        let client = ArgoCdClient::new(&url, "t").unwrap();

        let actions = client
            .get_resource_actions("guestbook", "argocd", &resource())
            .await
            .unwrap();

        assert_eq!(actions["actions"][0]["name"], "restart");
        let seen = log.lock().unwrap()[0].clone();
        assert_eq!(seen.method, "GET");
        assert_eq!(seen.path, "/api/v1/applications/guestbook/resource/actions");
        assert_eq!(
            seen.query,
            "appNamespace=argocd&namespace=web&resourceName=frontend&group=apps&kind=Deployment&version=v1"
        );
        assert!(seen.body.is_empty());
    }

    #[tokio::test]
    async fn resource_tree_passes_app_namespace() {
        let (url, log) = spawn_backend(vec![ok(
            "/api/v1/applications/guestbook/resource-tree",
            json!({ "nodes": [{ "kind": "Pod" }] }),
        )])
        .await;
        let client = ArgoCdClient::new(&url, "t").unwrap();

        let tree = client
            .get_resource_tree("guestbook", Some("argocd"))
            .await
            .unwrap();
        client.get_resource_tree("guestbook", Some("  ")).await.unwrap();

        assert_eq!(tree["nodes"][0]["kind"], "Pod");
        let recorded = log.lock().unwrap();
        assert_eq!(recorded[0].method, "GET");
        assert_eq!(recorded[0].query, "appNamespace=argocd");
        assert_eq!(recorded[1].query, "");
    }

    #[tokio::test]
    async fn application_events_hit_events_endpoint() {
        let (url, log) = spawn_backend(vec![ok(
            "/api/v1/applications/guestbook/events",
            json!({ "items": [{ "reason": "Synced" }] }),
        )])
        .await;
        let client = ArgoCdClient::new(&url, "t").unwrap();

        let events = client
            .get_application_events("guestbook", Some("argocd"))
            .await
            .unwrap();
        client.get_application_events("guestbook", None).await.unwrap();

        assert_eq!(events["items"][0]["reason"], "Synced");
        let recorded = log.lock().unwrap();
        assert_eq!(recorded[0].method, "GET");
        assert_eq!(recorded[0].path, "/api/v1/applications/guestbook/events");
        assert_eq!(recorded[0].query, "appNamespace=argocd");
        assert_eq!(recorded[1].query, "");
    }

    #[tokio::test]
    async fn resource_events_send_lookup_parameters() {
        let (url, log) = spawn_backend(vec![ok(
            "/api/v1/applications/guestbook/events",
            json!({ "items": [] }),
        )])
        .await;
        let client = ArgoCdClient::new(&url, "t").unwrap();
        let lookup = ResourceEventsQuery {
            app_namespace: "argocd".into(),
            resource_uid: "abc-123".into(),
            resource_namespace: "web".into(),
            resource_name: "frontend".into(),
        };

        client.get_resource_events("guestbook", &lookup).await.unwrap();

        assert_eq!(
            log.lock().unwrap()[0].query,
            "appNamespace=argocd&resourceNamespace=web&resourceUID=abc-123&resourceName=frontend"
        );
    }

    #[tokio::test]
    async fn empty_success_body_is_null() {
        let (url, _log) = spawn_backend(vec![(
            "/api/v1/applications/guestbook",
            StatusCode::OK,
            String::new(),
        )])
        .await;
        let client = ArgoCdClient::new(&url, "t").unwrap();
        let value = client
            .delete_application("guestbook", &DeleteOptions::default())
            .await
            .unwrap();
        assert_eq!(value, Value::Null);
    }
}
