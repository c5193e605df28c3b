//! Programmatic control of a terminal emulator over its local automation
//! socket: open windows and tabs, send keyboard and mouse input, read
//! rendered screen content, and wait on it.
//!
//! A [`Session`] holds one connection to the emulator and multiplexes
//! concurrent requests over it. Surfaces (windows and tabs) are discovered
//! through the session and operated on through [`SurfaceHandle`]s:
//!
//! ```no_run
//! use std::time::Duration;
//! use termsurf::Session;
//!
//! # async fn run() -> Result<(), termsurf::Error> {
//! let session = Session::connect().await?;
//! let surface = session.new_window(None).await?;
//!
//! surface.wait_for_prompt(Duration::from_secs(5)).await?;
//! surface.send("echo hello").await?;
//! surface.expect_text("hello", Duration::from_secs(5)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Synchronous callers use the mirror API in [`blocking`].

pub mod blocking;
mod error;
pub mod keys;
mod screen;
mod session;
mod surface;
mod telemetry;
mod wait;

pub use error::{Error, IpcError};
pub use screen::{Cell, Screen, ScreenCells, ScreenMode};
pub use session::{ConnectOptions, Session, DEFAULT_REQUEST_TIMEOUT};
pub use surface::{MouseButton, Surface, SurfaceHandle};
pub use telemetry::init_tracing;
pub use wait::{WaitOutcome, DEFAULT_PROMPT_PATTERN};
