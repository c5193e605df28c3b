use thiserror::Error;

pub use termsurf_ipc::IpcError;

/// Client-level errors layered over the transport taxonomy.
///
/// Nothing here aborts the process and nothing is retried automatically;
/// every operation returns a typed outcome and the caller decides.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Ipc(#[from] IpcError),

    #[error("no surface matched: {0}")]
    SurfaceNotFound(String),

    #[error("expected exactly one focused surface, found {0}")]
    AmbiguousFocus(usize),

    #[error("unknown key name: {0:?}")]
    UnknownKey(String),

    #[error("unknown modifier: {0:?} (expected ctrl, shift, alt or super)")]
    UnknownModifier(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{message}\n\nActual content:\n{screen}")]
    AssertionFailure { message: String, screen: String },
}

impl Error {
    /// Whether this error came from a wait/read deadline. Always safe to
    /// retry from the caller's side.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Ipc(IpcError::Timeout { .. }))
    }
}

/// Map `terminal-not-found`-class remote errors to [`Error::SurfaceNotFound`]
/// so callers can match on them without inspecting wire codes. Everything
/// else passes through verbatim.
pub(crate) fn map_surface_error(err: IpcError, surface_id: &str) -> Error {
    match err {
        IpcError::Remote { ref code, .. }
            if code == "terminal-not-found" || code == "surface-not-found" =>
        {
            Error::SurfaceNotFound(surface_id.to_string())
        }
        other => Error::Ipc(other),
    }
}
