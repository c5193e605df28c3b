//! Shared test support for the integration suites.

#![allow(dead_code)]

pub mod mock_emulator;

use std::time::Duration;

use serde_json::{json, Value};

use termsurf::{ConnectOptions, Session};

pub use mock_emulator::{MockEmulator, MockResponse};

pub const TEST_SURFACE_ID: &str = "surf-1";

/// A surface entry as the emulator reports it inside `list_surfaces`.
pub fn surface(id: &str) -> Value {
    json!({
        "id": id,
        "title": "zsh",
        "pwd": "/home/dev",
        "focused": false,
        "rows": 24,
        "cols": 80,
    })
}

/// Wrap surfaces into the windows/tabs/surfaces envelope, one tab per
/// window.
pub fn surfaces_result(surfaces: Vec<Value>) -> Value {
    json!({
        "windows": [{ "tabs": [{ "surfaces": surfaces }] }]
    })
}

pub fn screen_result(content: &str) -> Value {
    json!({ "content": content, "cursor_row": 0, "cursor_col": 0 })
}

/// Connect to a mock with a short request timeout so failure-path tests
/// stay fast.
pub async fn connect(mock: &MockEmulator) -> Session {
    Session::connect_with(
        ConnectOptions::default()
            .socket_path(mock.socket_path())
            .request_timeout(Duration::from_secs(2)),
    )
    .await
    .expect("connect to mock emulator")
}
