//! Framed automation protocol for terminal emulator surfaces.
//!
//! This crate owns the low-level half of the client: socket resolution and
//! permission validation, length-prefixed framing over a Unix stream, the
//! request/response wire types, and the [`Dispatcher`] that multiplexes
//! concurrent in-flight requests over one shared transport.
//!
//! The high-level surface API lives in the `termsurf` crate.

pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod protocol;
pub mod socket;
pub mod transport;

pub use dispatcher::Dispatcher;
pub use error::IpcError;
pub use frame::MAX_MESSAGE_SIZE;
pub use protocol::PROTOCOL_VERSION;
pub use socket::{socket_path, validate_socket};
pub use transport::{FrameReader, FrameWriter, Transport};
