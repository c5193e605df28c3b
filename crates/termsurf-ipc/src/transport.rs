//! One duplex framed channel to the emulator socket.

use std::path::Path;

use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tracing::debug;

use crate::error::IpcError;
use crate::frame;

pub struct Transport;

impl Transport {
    /// Connect to the emulator socket and split the stream into framed
    /// halves. The caller is expected to have validated the path first.
    pub async fn open(path: &Path) -> Result<(FrameReader, FrameWriter), IpcError> {
        debug!(socket = %path.display(), "connecting to emulator socket");
        let stream = UnixStream::connect(path).await.map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => IpcError::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => IpcError::PermissionDenied(path.to_path_buf()),
            _ => IpcError::Io(err),
        })?;
        Ok(Self::from_stream(stream))
    }

    pub fn from_stream(stream: UnixStream) -> (FrameReader, FrameWriter) {
        let (read_half, write_half) = stream.into_split();
        (
            FrameReader { inner: read_half },
            FrameWriter { inner: write_half },
        )
    }
}

pub struct FrameReader {
    inner: OwnedReadHalf,
}

impl FrameReader {
    /// Suspend until one complete frame arrives. `None` means the emulator
    /// closed the connection cleanly.
    pub async fn receive(&mut self) -> Result<Option<Vec<u8>>, IpcError> {
        frame::read_frame(&mut self.inner).await
    }
}

pub struct FrameWriter {
    inner: OwnedWriteHalf,
}

impl FrameWriter {
    pub async fn send(&mut self, payload: &[u8]) -> Result<(), IpcError> {
        frame::write_frame(&mut self.inner, payload).await
    }

    pub async fn shutdown(&mut self) {
        use tokio::io::AsyncWriteExt;
        let _ = self.inner.shutdown().await;
    }
}
