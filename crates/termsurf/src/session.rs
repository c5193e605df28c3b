//! Connection and surface discovery.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use termsurf_ipc::{socket_path, validate_socket, Dispatcher, IpcError, Transport};

use crate::error::Error;
use crate::surface::{Surface, SurfaceHandle};
use crate::wait::POLL_INTERVAL;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How long `new_window`/`new_tab` poll discovery for the created surface.
const SURFACE_SPAWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for [`Session::connect_with`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub socket_path: Option<PathBuf>,
    pub validate_socket: bool,
    pub request_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            socket_path: None,
            validate_socket: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ConnectOptions {
    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = Some(path.into());
        self
    }

    /// Skip endpoint ownership/permission checks. The checks exist because
    /// any principal that can write to the socket controls the terminal;
    /// bypass deliberately.
    pub fn validate_socket(mut self, validate: bool) -> Self {
        self.validate_socket = validate;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

struct SessionInner {
    dispatcher: Dispatcher,
    request_timeout: Duration,
}

/// A connection to the emulator's automation endpoint.
///
/// One `Session` owns one transport and its dispatcher; handles cloned from
/// it share both. Surfaces are a live mirror of remote state: every
/// discovery call re-reads the remote set, nothing is cached.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Connect using the default address resolution and full socket
    /// validation.
    pub async fn connect() -> Result<Self, Error> {
        Self::connect_with(ConnectOptions::default()).await
    }

    pub async fn connect_with(options: ConnectOptions) -> Result<Self, Error> {
        let path = socket_path(options.socket_path.as_deref());
        if !path.exists() {
            return Err(IpcError::NotFound(path).into());
        }
        if options.validate_socket {
            validate_socket(&path)?;
        }

        let (reader, writer) = Transport::open(&path).await?;
        debug!(socket = %path.display(), "session connected");
        Ok(Self {
            inner: Arc::new(SessionInner {
                dispatcher: Dispatcher::new(reader, writer),
                request_timeout: options.request_timeout,
            }),
        })
    }

    pub(crate) async fn call(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, IpcError> {
        self.inner
            .dispatcher
            .call(method, params, self.inner.request_timeout)
            .await
    }

    /// Close the transport. Every pending and future call on this session
    /// resolves with `TransportClosed`.
    pub async fn close(&self) {
        self.inner.dispatcher.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.dispatcher.is_closed()
    }

    // === Discovery ===

    /// One discovery call returning the current remote surface set.
    pub async fn list_surfaces(&self) -> Result<Vec<Surface>, Error> {
        let result = self.call("list_surfaces", None).await?;
        extract_surfaces(result)
    }

    /// The first surface in discovery order.
    pub async fn first(&self) -> Result<SurfaceHandle, Error> {
        let mut surfaces = self.list_surfaces().await?;
        if surfaces.is_empty() {
            return Err(Error::SurfaceNotFound("no surfaces open".to_string()));
        }
        Ok(SurfaceHandle::new(self.clone(), surfaces.remove(0)))
    }

    /// The single focused surface. Fails if none or more than one claims
    /// focus at the query instant; focus is advisory and can change between
    /// query and use.
    pub async fn focused(&self) -> Result<SurfaceHandle, Error> {
        let focused: Vec<Surface> = self
            .list_surfaces()
            .await?
            .into_iter()
            .filter(|s| s.focused)
            .collect();
        let n = focused.len();
        match focused.into_iter().next() {
            Some(surface) if n == 1 => Ok(SurfaceHandle::new(self.clone(), surface)),
            Some(_) => Err(Error::AmbiguousFocus(n)),
            None => Err(Error::SurfaceNotFound("no focused surface".to_string())),
        }
    }

    /// First surface whose title contains `title` (case-sensitive).
    pub async fn by_title(&self, title: &str) -> Result<SurfaceHandle, Error> {
        self.find(|s| s.title.contains(title), || {
            format!("no surface with title containing {title:?}")
        })
        .await
    }

    /// First surface whose working directory contains `path`
    /// (case-sensitive).
    pub async fn by_pwd(&self, path: &str) -> Result<SurfaceHandle, Error> {
        self.find(|s| s.pwd.contains(path), || {
            format!("no surface with pwd containing {path:?}")
        })
        .await
    }

    async fn find<P, M>(&self, predicate: P, missing: M) -> Result<SurfaceHandle, Error>
    where
        P: Fn(&Surface) -> bool,
        M: FnOnce() -> String,
    {
        let surface = self
            .list_surfaces()
            .await?
            .into_iter()
            .find(|s| predicate(s))
            .ok_or_else(|| Error::SurfaceNotFound(missing()))?;
        Ok(SurfaceHandle::new(self.clone(), surface))
    }

    // === Window management ===

    /// Open a new window, optionally running `command` in it, and return the
    /// new surface once discovery reports it.
    pub async fn new_window(&self, command: Option<&[String]>) -> Result<SurfaceHandle, Error> {
        self.create_surface("new_window", command).await
    }

    /// Open a new tab, optionally running `command` in it.
    pub async fn new_tab(&self, command: Option<&[String]>) -> Result<SurfaceHandle, Error> {
        self.create_surface("new_tab", command).await
    }

    async fn create_surface(
        &self,
        method: &str,
        command: Option<&[String]>,
    ) -> Result<SurfaceHandle, Error> {
        let before: HashSet<String> = self
            .list_surfaces()
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();

        let params = command.map(|args| json!({ "arguments": args }));
        self.call(method, params).await?;

        // The creation call returns before the surface exists; poll
        // discovery for an id that was not present before.
        let deadline = Instant::now() + SURFACE_SPAWN_TIMEOUT;
        loop {
            tokio::time::sleep(POLL_INTERVAL).await;
            if let Some(surface) = self
                .list_surfaces()
                .await?
                .into_iter()
                .find(|s| !before.contains(&s.id))
            {
                return Ok(SurfaceHandle::new(self.clone(), surface));
            }
            if Instant::now() >= deadline {
                return Err(IpcError::Timeout {
                    method: method.to_string(),
                    timeout_ms: SURFACE_SPAWN_TIMEOUT.as_millis() as u64,
                }
                .into());
            }
        }
    }
}

// The emulator reports windows containing tabs containing surfaces; the
// client flattens to surfaces in discovery order.

#[derive(Deserialize)]
struct WindowDto {
    #[serde(default)]
    tabs: Vec<TabDto>,
}

#[derive(Deserialize)]
struct TabDto {
    #[serde(default)]
    surfaces: Vec<Surface>,
}

#[derive(Deserialize)]
struct ListSurfacesDto {
    #[serde(default)]
    windows: Vec<WindowDto>,
}

fn extract_surfaces(result: Value) -> Result<Vec<Surface>, Error> {
    let dto: ListSurfacesDto = serde_json::from_value(result)
        .map_err(|err| IpcError::InvalidResponse(format!("list_surfaces payload: {err}")))?;
    Ok(dto
        .windows
        .into_iter()
        .flat_map(|w| w.tabs)
        .flat_map(|t| t.surfaces)
        .collect())
}
