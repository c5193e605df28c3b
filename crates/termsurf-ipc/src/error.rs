use std::path::PathBuf;

use thiserror::Error;

use crate::frame::MAX_MESSAGE_SIZE;

/// Errors produced by the transport and dispatcher layers.
///
/// Connect-time failures (`NotFound`, `PermissionDenied`,
/// `InsecurePermissions`) are fatal to the attempt and never retried here;
/// retries belong to the caller.
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("emulator socket not found: {0}")]
    NotFound(PathBuf),

    #[error("permission denied connecting to emulator socket: {0}")]
    PermissionDenied(PathBuf),

    #[error("emulator socket failed validation: {detail}: {path} (disable socket validation to skip checks)")]
    InsecurePermissions { path: PathBuf, detail: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode request: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("remote error ({code}): {message}")]
    Remote { code: String, message: String },

    #[error("request '{method}' timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    #[error("transport closed")]
    TransportClosed,

    #[error("invalid response from emulator: {0}")]
    InvalidResponse(String),

    #[error("message of {0} bytes exceeds the {MAX_MESSAGE_SIZE} byte limit")]
    MessageTooLarge(usize),
}
