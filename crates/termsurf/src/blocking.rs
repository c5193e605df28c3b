//! Synchronous mirror of the async API for non-async callers.
//!
//! Each [`Session`] owns a multi-thread tokio runtime; every call blocks the
//! calling thread on the async implementation while the dispatcher's reader
//! keeps running on the runtime's workers. Handles cloned from one session
//! share the runtime. Must not be used from inside an async context, where
//! blocking would deadlock the executor.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Runtime;

use crate::error::Error;
use crate::screen::{Screen, ScreenCells, ScreenMode};
use crate::session::ConnectOptions;
use crate::surface::MouseButton;
use crate::wait::WaitOutcome;

pub struct Session {
    runtime: Arc<Runtime>,
    inner: crate::Session,
}

impl Session {
    pub fn connect() -> Result<Self, Error> {
        Self::connect_with(ConnectOptions::default())
    }

    pub fn connect_with(options: ConnectOptions) -> Result<Self, Error> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .worker_threads(2)
            .thread_name("termsurf-blocking")
            .build()
            .map_err(termsurf_ipc::IpcError::Io)?;
        let inner = runtime.block_on(crate::Session::connect_with(options))?;
        Ok(Self {
            runtime: Arc::new(runtime),
            inner,
        })
    }

    pub fn close(&self) {
        self.runtime.block_on(self.inner.close());
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn list_surfaces(&self) -> Result<Vec<crate::Surface>, Error> {
        self.runtime.block_on(self.inner.list_surfaces())
    }

    pub fn first(&self) -> Result<SurfaceHandle, Error> {
        self.wrap(self.runtime.block_on(self.inner.first()))
    }

    pub fn focused(&self) -> Result<SurfaceHandle, Error> {
        self.wrap(self.runtime.block_on(self.inner.focused()))
    }

    pub fn by_title(&self, title: &str) -> Result<SurfaceHandle, Error> {
        self.wrap(self.runtime.block_on(self.inner.by_title(title)))
    }

    pub fn by_pwd(&self, path: &str) -> Result<SurfaceHandle, Error> {
        self.wrap(self.runtime.block_on(self.inner.by_pwd(path)))
    }

    pub fn new_window(&self, command: Option<&[String]>) -> Result<SurfaceHandle, Error> {
        self.wrap(self.runtime.block_on(self.inner.new_window(command)))
    }

    pub fn new_tab(&self, command: Option<&[String]>) -> Result<SurfaceHandle, Error> {
        self.wrap(self.runtime.block_on(self.inner.new_tab(command)))
    }

    fn wrap(
        &self,
        handle: Result<crate::SurfaceHandle, Error>,
    ) -> Result<SurfaceHandle, Error> {
        Ok(SurfaceHandle {
            runtime: Arc::clone(&self.runtime),
            inner: handle?,
        })
    }
}

#[derive(Clone)]
pub struct SurfaceHandle {
    runtime: Arc<Runtime>,
    inner: crate::SurfaceHandle,
}

impl SurfaceHandle {
    pub fn id(&self) -> &str {
        self.inner.id()
    }

    pub fn surface(&self) -> &crate::Surface {
        self.inner.surface()
    }

    pub fn refresh(&mut self) -> Result<(), Error> {
        self.runtime.clone().block_on(self.inner.refresh())
    }

    pub fn send(&self, text: &str) -> Result<(), Error> {
        self.runtime.block_on(self.inner.send(text))
    }

    pub fn type_text(&self, text: &str, delay: Duration) -> Result<(), Error> {
        self.runtime.block_on(self.inner.type_text(text, delay))
    }

    pub fn key(&self, key: &str, mods: Option<&str>) -> Result<(), Error> {
        self.runtime.block_on(self.inner.key(key, mods))
    }

    pub fn key_down(&self, key: &str, mods: Option<&str>) -> Result<(), Error> {
        self.runtime.block_on(self.inner.key_down(key, mods))
    }

    pub fn key_up(&self, key: &str, mods: Option<&str>) -> Result<(), Error> {
        self.runtime.block_on(self.inner.key_up(key, mods))
    }

    pub fn click(
        &self,
        x: f64,
        y: f64,
        button: MouseButton,
        mods: Option<&str>,
    ) -> Result<(), Error> {
        self.runtime.block_on(self.inner.click(x, y, button, mods))
    }

    pub fn double_click(
        &self,
        x: f64,
        y: f64,
        button: MouseButton,
        mods: Option<&str>,
    ) -> Result<(), Error> {
        self.runtime
            .block_on(self.inner.double_click(x, y, button, mods))
    }

    pub fn scroll(&self, delta_y: f64, delta_x: f64, mods: Option<&str>) -> Result<(), Error> {
        self.runtime
            .block_on(self.inner.scroll(delta_y, delta_x, mods))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn drag(
        &self,
        from_x: f64,
        from_y: f64,
        to_x: f64,
        to_y: f64,
        button: MouseButton,
        steps: u32,
        mods: Option<&str>,
    ) -> Result<(), Error> {
        self.runtime
            .block_on(self.inner.drag(from_x, from_y, to_x, to_y, button, steps, mods))
    }

    pub fn screen(&self, mode: ScreenMode) -> Result<Screen, Error> {
        self.runtime.block_on(self.inner.screen(mode))
    }

    pub fn text(&self) -> Result<String, Error> {
        self.runtime.block_on(self.inner.text())
    }

    pub fn cells(&self, mode: ScreenMode) -> Result<ScreenCells, Error> {
        self.runtime.block_on(self.inner.cells(mode))
    }

    pub fn focus(&self) -> Result<(), Error> {
        self.runtime.block_on(self.inner.focus())
    }

    pub fn close(&self) -> Result<(), Error> {
        self.runtime.block_on(self.inner.close())
    }

    pub fn resize(&self, rows: Option<u32>, cols: Option<u32>) -> Result<(), Error> {
        self.runtime.block_on(self.inner.resize(rows, cols))
    }

    pub fn screenshot(&self, path: impl AsRef<Path>) -> Result<PathBuf, Error> {
        self.runtime.block_on(self.inner.screenshot(path))
    }

    pub fn wait_for_text(&self, pattern: &str, timeout: Duration) -> Result<WaitOutcome, Error> {
        self.runtime
            .block_on(self.inner.wait_for_text(pattern, timeout))
    }

    pub fn wait_for_regex(&self, pattern: &str, timeout: Duration) -> Result<WaitOutcome, Error> {
        self.runtime
            .block_on(self.inner.wait_for_regex(pattern, timeout))
    }

    pub fn wait_for_prompt(&self, timeout: Duration) -> Result<WaitOutcome, Error> {
        self.runtime.block_on(self.inner.wait_for_prompt(timeout))
    }

    pub fn wait_for_idle(
        &self,
        stable: Duration,
        timeout: Duration,
    ) -> Result<WaitOutcome, Error> {
        self.runtime
            .block_on(self.inner.wait_for_idle(stable, timeout))
    }

    pub fn expect_text(&self, text: &str, timeout: Duration) -> Result<WaitOutcome, Error> {
        self.runtime.block_on(self.inner.expect_text(text, timeout))
    }

    pub fn expect_no_text(&self, text: &str, timeout: Duration) -> Result<WaitOutcome, Error> {
        self.runtime
            .block_on(self.inner.expect_no_text(text, timeout))
    }

    pub fn expect_match(&self, pattern: &str, timeout: Duration) -> Result<WaitOutcome, Error> {
        self.runtime
            .block_on(self.inner.expect_match(pattern, timeout))
    }

    pub fn expect_prompt(&self, timeout: Duration) -> Result<WaitOutcome, Error> {
        self.runtime.block_on(self.inner.expect_prompt(timeout))
    }

    pub fn expect_title(&self, title: &str, timeout: Duration) -> Result<(), Error> {
        self.runtime
            .block_on(self.inner.expect_title(title, timeout))
    }

    pub fn expect_pwd(&self, path: &str, timeout: Duration) -> Result<(), Error> {
        self.runtime.block_on(self.inner.expect_pwd(path, timeout))
    }

    pub fn expect_focused(&self, timeout: Duration) -> Result<(), Error> {
        self.runtime.block_on(self.inner.expect_focused(timeout))
    }
}
