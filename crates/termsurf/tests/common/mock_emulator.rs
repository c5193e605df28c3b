//! Mock emulator endpoint for testing client behavior without a real
//! terminal.
//!
//! Listens on a Unix socket with the real frame format (4-byte
//! little-endian length prefix + JSON) and responds per configured
//! handlers. Designed to catch real regressions:
//! 1. Validates exact JSON field names (catches serialization bugs)
//! 2. Returns realistic responses (catches parsing bugs)
//! 3. Can simulate failures, delays, and disconnects
//! 4. Records all requests for verification

#![allow(dead_code)]

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::oneshot;

#[derive(Debug, Deserialize)]
struct Request {
    version: u32,
    id: u64,
    method: String,
    params: Option<Value>,
}

#[derive(Debug, Serialize)]
struct Response {
    id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<WireError>,
}

#[derive(Debug, Serialize)]
struct WireError {
    code: String,
    message: String,
}

/// Recorded request for test verification.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub params: Option<Value>,
}

/// How the mock responds to a method.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return a successful result.
    Success(Value),
    /// Return a wire error.
    Error { code: String, message: String },
    /// Return different responses per call, cycling through the list.
    Sequence(Vec<MockResponse>),
    /// Delay before returning the inner response.
    Delayed(Duration, Box<MockResponse>),
    /// Never respond (for timeout tests).
    Hang,
    /// Close the connection without responding.
    Disconnect,
}

pub struct MockEmulator {
    _temp_dir: TempDir,
    socket_path: PathBuf,
    shutdown_tx: Option<oneshot::Sender<()>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handlers: Arc<Mutex<HashMap<String, MockResponse>>>,
    sequence_counters: Arc<Mutex<HashMap<String, usize>>>,
}

impl MockEmulator {
    /// Create and start a mock emulator on a fresh socket with permissions
    /// that pass client-side validation.
    pub async fn start() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let socket_path = temp_dir.path().join("emulator.sock");

        let requests = Arc::new(Mutex::new(Vec::new()));
        let handlers = Arc::new(Mutex::new(default_handlers()));
        let sequence_counters = Arc::new(Mutex::new(HashMap::new()));

        let listener = UnixListener::bind(&socket_path).expect("bind socket");
        // The client rejects sockets writable by group or other.
        std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o600))
            .expect("chmod socket");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let server_requests = requests.clone();
        let server_handlers = handlers.clone();
        let server_counters = sequence_counters.clone();
        tokio::spawn(async move {
            run_server(
                listener,
                server_requests,
                server_handlers,
                server_counters,
                shutdown_rx,
            )
            .await;
        });

        Self {
            _temp_dir: temp_dir,
            socket_path,
            shutdown_tx: Some(shutdown_tx),
            requests,
            handlers,
            sequence_counters,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Loosen the socket permissions, for validation tests.
    pub fn chmod_socket(&self, mode: u32) {
        std::fs::set_permissions(&self.socket_path, std::fs::Permissions::from_mode(mode))
            .expect("chmod socket");
    }

    pub fn set_response(&self, method: &str, response: MockResponse) {
        self.handlers
            .lock()
            .unwrap()
            .insert(method.to_string(), response);
    }

    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request_for(&self, method: &str) -> Option<RecordedRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.method == method)
            .cloned()
    }

    pub fn call_count_for(&self, method: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method)
            .count()
    }

    pub fn nth_call_for(&self, method: &str, n: usize) -> Option<RecordedRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method)
            .nth(n)
            .cloned()
    }
}

impl Drop for MockEmulator {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn default_handlers() -> HashMap<String, MockResponse> {
    let mut h = HashMap::new();
    h.insert(
        "list_surfaces".to_string(),
        MockResponse::Success(json!({
            "windows": [{ "tabs": [{ "surfaces": [{
                "id": super::TEST_SURFACE_ID,
                "title": "zsh",
                "pwd": "/home/dev",
                "focused": true,
                "rows": 24,
                "cols": 80,
            }] }] }]
        })),
    );
    h.insert(
        "get_screen".to_string(),
        MockResponse::Success(json!({
            "content": "$ ",
            "cursor_row": 0,
            "cursor_col": 2,
        })),
    );
    for method in [
        "new_window",
        "new_tab",
        "send_text",
        "send_key",
        "send_mouse",
        "send_scroll",
        "focus_surface",
        "close_surface",
        "resize_surface",
        "screenshot_surface",
    ] {
        h.insert(method.to_string(), MockResponse::Success(json!({})));
    }
    h
}

async fn run_server(
    listener: UnixListener,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handlers: Arc<Mutex<HashMap<String, MockResponse>>>,
    sequence_counters: Arc<Mutex<HashMap<String, usize>>>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _)) => {
                        let requests = requests.clone();
                        let handlers = handlers.clone();
                        let counters = sequence_counters.clone();
                        tokio::spawn(async move {
                            handle_connection(stream, requests, handlers, counters).await;
                        });
                    }
                    Err(e) => {
                        eprintln!("mock emulator accept error: {e}");
                        break;
                    }
                }
            }
            _ = &mut shutdown_rx => break,
        }
    }
}

async fn handle_connection(
    stream: UnixStream,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handlers: Arc<Mutex<HashMap<String, MockResponse>>>,
    sequence_counters: Arc<Mutex<HashMap<String, usize>>>,
) {
    let (mut reader, mut writer) = stream.into_split();

    loop {
        let Some(payload) = read_frame(&mut reader).await else {
            return;
        };
        let request: Request = match serde_json::from_slice(&payload) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("mock emulator parse error: {e}");
                continue;
            }
        };
        assert_eq!(request.version, 1, "unexpected protocol version");

        requests.lock().unwrap().push(RecordedRequest {
            method: request.method.clone(),
            params: request.params.clone(),
        });

        let handler = handlers.lock().unwrap().get(&request.method).cloned();
        let handler = resolve_handler(handler, &request.method, &sequence_counters);

        // Responses go out in arrival order; a Delayed handler holds up the
        // whole connection, which is what the timeout tests want.
        let Some(response) = generate_response(handler, request.id, &request.method).await else {
            return;
        };
        if write_frame(&mut writer, &response).await.is_err() {
            return;
        }
    }
}

async fn read_frame(reader: &mut (impl AsyncReadExt + Unpin)) -> Option<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await.ok()?;
    let len = u32::from_le_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.ok()?;
    Some(payload)
}

async fn write_frame(
    writer: &mut (impl AsyncWriteExt + Unpin),
    response: &Response,
) -> std::io::Result<()> {
    let payload = serde_json::to_vec(response).unwrap();
    writer.write_all(&(payload.len() as u32).to_le_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await
}

fn resolve_handler(
    handler: Option<MockResponse>,
    method: &str,
    sequence_counters: &Arc<Mutex<HashMap<String, usize>>>,
) -> Option<MockResponse> {
    match handler {
        Some(MockResponse::Sequence(responses)) if !responses.is_empty() => {
            let next = {
                let mut counters = sequence_counters.lock().unwrap();
                let index = counters.entry(method.to_string()).or_insert(0);
                let response = responses[(*index).min(responses.len() - 1)].clone();
                *index += 1;
                response
            };
            resolve_handler(Some(next), method, sequence_counters)
        }
        other => other,
    }
}

async fn generate_response(
    handler: Option<MockResponse>,
    request_id: u64,
    method: &str,
) -> Option<Response> {
    match handler {
        Some(MockResponse::Success(result)) => Some(Response {
            id: request_id,
            result: Some(result),
            error: None,
        }),
        Some(MockResponse::Error { code, message }) => Some(Response {
            id: request_id,
            result: None,
            error: Some(WireError { code, message }),
        }),
        Some(MockResponse::Delayed(duration, inner)) => {
            tokio::time::sleep(duration).await;
            Box::pin(generate_response(Some(*inner), request_id, method)).await
        }
        Some(MockResponse::Hang) => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            None
        }
        Some(MockResponse::Disconnect) => None,
        Some(MockResponse::Sequence(_)) => {
            unreachable!("sequence resolved before generate_response")
        }
        None => Some(Response {
            id: request_id,
            result: None,
            error: Some(WireError {
                code: "method-not-found".to_string(),
                message: format!("unknown method: {method}"),
            }),
        }),
    }
}
