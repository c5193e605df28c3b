//! Surface metadata and the per-surface operation handle.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{map_surface_error, Error};
use crate::keys;
use crate::screen::{Screen, ScreenCells, ScreenMode};
use crate::session::Session;
use crate::wait::{self, WaitOutcome};

fn default_rows() -> u32 {
    24
}

fn default_cols() -> u32 {
    80
}

/// One terminal window or tab as reported by the emulator.
///
/// This is a mirror of remote state at query time, not an owned object; at
/// most one surface is focused at a query instant and that can change
/// between query and use.
#[derive(Debug, Clone, Deserialize)]
pub struct Surface {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub pwd: String,
    #[serde(default)]
    pub focused: bool,
    #[serde(default = "default_rows")]
    pub rows: u32,
    #[serde(default = "default_cols")]
    pub cols: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    fn as_str(self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        }
    }
}

/// Spacing between the interpolated events of a drag gesture.
const DRAG_STEP_DELAY: Duration = Duration::from_millis(10);

/// A surface bound to the session it was discovered through. All operations
/// route through the session's dispatcher.
#[derive(Clone)]
pub struct SurfaceHandle {
    session: Session,
    surface: Surface,
}

impl SurfaceHandle {
    pub(crate) fn new(session: Session, surface: Surface) -> Self {
        Self { session, surface }
    }

    pub fn id(&self) -> &str {
        &self.surface.id
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Re-read this surface's metadata from the emulator.
    pub async fn refresh(&mut self) -> Result<(), Error> {
        self.surface = self.fetch_surface().await?;
        Ok(())
    }

    /// Current remote metadata for this surface, without mutating the
    /// handle.
    pub(crate) async fn fetch_surface(&self) -> Result<Surface, Error> {
        let id = &self.surface.id;
        self.session
            .list_surfaces()
            .await?
            .into_iter()
            .find(|s| &s.id == id)
            .ok_or_else(|| Error::SurfaceNotFound(id.clone()))
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, Error> {
        self.session
            .call(method, Some(params))
            .await
            .map_err(|err| map_surface_error(err, &self.surface.id))
    }

    // === Input ===

    /// Send text and press Enter. The carriage return goes out as a
    /// distinct trailing event so a partial failure is distinguishable from
    /// a failure of the text itself.
    pub async fn send(&self, text: &str) -> Result<(), Error> {
        self.request("send_text", json!({ "surface_id": self.id(), "text": text }))
            .await?;
        self.request("send_text", json!({ "surface_id": self.id(), "text": "\r" }))
            .await?;
        Ok(())
    }

    /// Type text without a trailing Enter. A non-zero `delay` emits one
    /// timed event per character, preserving ordering for interactive
    /// prompts that debounce input.
    pub async fn type_text(&self, text: &str, delay: Duration) -> Result<(), Error> {
        if delay.is_zero() {
            self.request("send_text", json!({ "surface_id": self.id(), "text": text }))
                .await?;
            return Ok(());
        }
        for ch in text.chars() {
            self.request(
                "send_text",
                json!({ "surface_id": self.id(), "text": ch.to_string() }),
            )
            .await?;
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    /// Press and release a key. Accepts a key name from the fixed table
    /// (`"Enter"`, `"F5"`, `"ArrowUp"`/`"Up"`, `"KeyC"`, `"c"`, ...) or the
    /// compound `"Ctrl+C"` form; `mods` is a comma-separated set drawn from
    /// ctrl, shift, alt, super.
    pub async fn key(&self, key: &str, mods: Option<&str>) -> Result<(), Error> {
        let chord = keys::resolve(key, mods)?;
        self.send_key_event(&chord, "press").await?;
        self.send_key_event(&chord, "release").await?;
        Ok(())
    }

    /// Press a key down without releasing, for held-key sequences.
    pub async fn key_down(&self, key: &str, mods: Option<&str>) -> Result<(), Error> {
        let chord = keys::resolve(key, mods)?;
        self.send_key_event(&chord, "press").await
    }

    pub async fn key_up(&self, key: &str, mods: Option<&str>) -> Result<(), Error> {
        let chord = keys::resolve(key, mods)?;
        self.send_key_event(&chord, "release").await
    }

    async fn send_key_event(&self, chord: &keys::KeyChord, action: &str) -> Result<(), Error> {
        let mut params = json!({
            "surface_id": self.id(),
            "key": chord.key,
            "action": action,
        });
        if let Some(mods) = chord.mods_param() {
            params["mods"] = Value::String(mods);
        }
        self.request("send_key", params).await?;
        Ok(())
    }

    // === Pointer ===

    /// Click at a pixel position. Coordinates pass through uninterpreted;
    /// the emulator owns cell-coordinate mapping.
    pub async fn click(
        &self,
        x: f64,
        y: f64,
        button: MouseButton,
        mods: Option<&str>,
    ) -> Result<(), Error> {
        let mods = canonical_mods(mods)?;
        self.send_mouse(x, y, Some(button), Some("press"), mods.as_deref())
            .await?;
        self.send_mouse(x, y, Some(button), Some("release"), mods.as_deref())
            .await?;
        Ok(())
    }

    pub async fn double_click(
        &self,
        x: f64,
        y: f64,
        button: MouseButton,
        mods: Option<&str>,
    ) -> Result<(), Error> {
        self.click(x, y, button, mods).await?;
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.click(x, y, button, mods).await?;
        Ok(())
    }

    /// Scroll the surface. Positive `delta_y` scrolls content down (toward
    /// more recent output), positive `delta_x` scrolls right.
    pub async fn scroll(
        &self,
        delta_y: f64,
        delta_x: f64,
        mods: Option<&str>,
    ) -> Result<(), Error> {
        let mut params = json!({
            "surface_id": self.id(),
            "x": delta_x,
            "y": delta_y,
        });
        if let Some(mods) = canonical_mods(mods)? {
            params["mods"] = Value::String(mods);
        }
        self.request("send_scroll", params).await?;
        Ok(())
    }

    /// Drag from one position to another: button-down at the origin,
    /// `steps` linearly interpolated moves ending exactly at the
    /// destination, button-up at the destination.
    pub async fn drag(
        &self,
        from_x: f64,
        from_y: f64,
        to_x: f64,
        to_y: f64,
        button: MouseButton,
        steps: u32,
        mods: Option<&str>,
    ) -> Result<(), Error> {
        if steps == 0 {
            return Err(Error::InvalidArgument(
                "drag requires at least one interpolation step".to_string(),
            ));
        }
        let mods = canonical_mods(mods)?;

        self.send_mouse(from_x, from_y, Some(button), Some("press"), mods.as_deref())
            .await?;
        tokio::time::sleep(DRAG_STEP_DELAY).await;

        for i in 1..=steps {
            let t = f64::from(i) / f64::from(steps);
            let x = from_x + (to_x - from_x) * t;
            let y = from_y + (to_y - from_y) * t;
            self.send_mouse(x, y, None, None, mods.as_deref()).await?;
            tokio::time::sleep(DRAG_STEP_DELAY).await;
        }

        self.send_mouse(to_x, to_y, Some(button), Some("release"), mods.as_deref())
            .await?;
        Ok(())
    }

    async fn send_mouse(
        &self,
        x: f64,
        y: f64,
        button: Option<MouseButton>,
        action: Option<&str>,
        mods: Option<&str>,
    ) -> Result<(), Error> {
        let mut params = json!({ "surface_id": self.id(), "x": x, "y": y });
        if let Some(button) = button {
            params["button"] = Value::String(button.as_str().to_string());
        }
        if let Some(action) = action {
            params["button_action"] = Value::String(action.to_string());
        }
        if let Some(mods) = mods {
            params["mods"] = Value::String(mods.to_string());
        }
        self.request("send_mouse", params).await?;
        Ok(())
    }

    // === Reading ===

    /// Read the rendered content for the requested row range.
    pub async fn screen(&self, mode: ScreenMode) -> Result<Screen, Error> {
        let result = self
            .request(
                "get_screen",
                json!({ "surface_id": self.id(), "screen": mode.as_str() }),
            )
            .await?;
        Screen::from_result(result)
    }

    /// Shorthand for the viewport's styled text.
    pub async fn text(&self) -> Result<String, Error> {
        Ok(self.screen(ScreenMode::Viewport).await?.text)
    }

    /// Read the full cell grid with per-cell styling.
    pub async fn cells(&self, mode: ScreenMode) -> Result<ScreenCells, Error> {
        let result = self
            .request(
                "get_screen",
                json!({
                    "surface_id": self.id(),
                    "screen": mode.as_str(),
                    "format": "cells",
                }),
            )
            .await?;
        ScreenCells::from_result(result)
    }

    // === Actions ===

    /// Bring this surface's window to the front.
    pub async fn focus(&self) -> Result<(), Error> {
        self.request("focus_surface", json!({ "surface_id": self.id() }))
            .await?;
        Ok(())
    }

    /// Close this surface.
    pub async fn close(&self) -> Result<(), Error> {
        self.request("close_surface", json!({ "surface_id": self.id() }))
            .await?;
        Ok(())
    }

    pub async fn resize(&self, rows: Option<u32>, cols: Option<u32>) -> Result<(), Error> {
        let mut params = json!({ "surface_id": self.id() });
        if let Some(rows) = rows {
            params["rows"] = json!(rows);
        }
        if let Some(cols) = cols {
            params["cols"] = json!(cols);
        }
        self.request("resize_surface", params).await?;
        Ok(())
    }

    /// Ask the emulator to capture this surface to `path`. Returns the
    /// resolved absolute path the capture was written to.
    pub async fn screenshot(&self, path: impl AsRef<Path>) -> Result<PathBuf, Error> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(termsurf_ipc::IpcError::Io)?
                .join(path)
        };
        self.request(
            "screenshot_surface",
            json!({
                "surface_id": self.id(),
                "output_path": absolute.to_string_lossy(),
            }),
        )
        .await?;
        Ok(absolute)
    }

    // === Waiting & assertions ===

    /// Poll the viewport until `pattern` appears in the plain text.
    pub async fn wait_for_text(
        &self,
        pattern: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome, Error> {
        wait::wait_for_text(self, pattern, timeout).await
    }

    /// Poll until a regex matches the plain text.
    pub async fn wait_for_regex(
        &self,
        pattern: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome, Error> {
        wait::wait_for_regex(self, pattern, timeout).await
    }

    /// Poll until a shell prompt terminator is visible.
    pub async fn wait_for_prompt(&self, timeout: Duration) -> Result<WaitOutcome, Error> {
        wait::wait_for_prompt(self, wait::DEFAULT_PROMPT_PATTERN, timeout).await
    }

    pub async fn wait_for_prompt_matching(
        &self,
        prompt_pattern: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome, Error> {
        wait::wait_for_prompt(self, prompt_pattern, timeout).await
    }

    /// Poll until the content fingerprint has been unchanged for a
    /// continuous `stable` window.
    pub async fn wait_for_idle(
        &self,
        stable: Duration,
        timeout: Duration,
    ) -> Result<WaitOutcome, Error> {
        wait::wait_for_idle(self, stable, timeout).await
    }

    /// Like [`wait_for_text`](Self::wait_for_text), but an unsatisfied wait
    /// is an assertion failure carrying the last observed screen.
    pub async fn expect_text(&self, text: &str, timeout: Duration) -> Result<WaitOutcome, Error> {
        wait::expect_text(self, text, timeout).await
    }

    /// Assert `text` never appears during the window. Fails the instant it
    /// is observed; succeeds only after polling the entire window.
    pub async fn expect_no_text(
        &self,
        text: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome, Error> {
        wait::expect_no_text(self, text, timeout).await
    }

    /// Like [`wait_for_regex`](Self::wait_for_regex), but an unsatisfied
    /// wait is an assertion failure.
    pub async fn expect_match(
        &self,
        pattern: &str,
        timeout: Duration,
    ) -> Result<WaitOutcome, Error> {
        wait::expect_match(self, pattern, timeout).await
    }

    /// Assert a shell prompt becomes visible within the window.
    pub async fn expect_prompt(&self, timeout: Duration) -> Result<WaitOutcome, Error> {
        wait::expect_prompt(self, timeout).await
    }

    /// Assert the surface title comes to contain `title`, polling refreshed
    /// metadata. The failure carries the last observed title.
    pub async fn expect_title(&self, title: &str, timeout: Duration) -> Result<(), Error> {
        wait::expect_title(self, title, timeout).await
    }

    /// Assert the surface working directory comes to contain `path`.
    pub async fn expect_pwd(&self, path: &str, timeout: Duration) -> Result<(), Error> {
        wait::expect_pwd(self, path, timeout).await
    }

    /// Assert this surface gains focus within the window.
    pub async fn expect_focused(&self, timeout: Duration) -> Result<(), Error> {
        wait::expect_focused(self, timeout).await
    }
}

fn canonical_mods(mods: Option<&str>) -> Result<Option<String>, Error> {
    let Some(raw) = mods else { return Ok(None) };
    let parsed = keys::parse_mods(raw)?;
    if parsed.is_empty() {
        return Ok(None);
    }
    Ok(Some(
        parsed
            .iter()
            .map(|m| match m {
                keys::Modifier::Ctrl => "ctrl",
                keys::Modifier::Shift => "shift",
                keys::Modifier::Alt => "alt",
                keys::Modifier::Super => "super",
            })
            .collect::<Vec<_>>()
            .join(","),
    ))
}
