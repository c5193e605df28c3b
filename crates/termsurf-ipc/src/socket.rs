//! Emulator socket resolution and permission validation.
//!
//! Anyone who can write to the automation socket controls the terminal, so
//! the connect path refuses sockets that are reachable by other principals
//! unless the caller explicitly opts out of validation.

use std::path::{Path, PathBuf};

use crate::error::IpcError;

const SOCKET_NAME: &str = "emulator.sock";

/// Resolve the emulator socket path.
///
/// Order: explicit path, `TERMSURF_SOCKET`, `$XDG_RUNTIME_DIR/termsurf/`,
/// `$TMPDIR/termsurf-<uid>/`, `/tmp/termsurf-<uid>/`.
pub fn socket_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Ok(custom) = std::env::var("TERMSURF_SOCKET") {
        return PathBuf::from(custom);
    }

    let uid = unsafe { libc::geteuid() };

    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join("termsurf").join(SOCKET_NAME);
    }

    if let Ok(tmpdir) = std::env::var("TMPDIR") {
        return PathBuf::from(tmpdir)
            .join(format!("termsurf-{uid}"))
            .join(SOCKET_NAME);
    }

    PathBuf::from(format!("/tmp/termsurf-{uid}")).join(SOCKET_NAME)
}

/// Reject endpoints another local user could read or write.
///
/// The socket must exist, be a Unix socket owned by the current effective
/// uid with no group/world bits, and live in a directory owned by the user
/// that is not group/world-writable.
pub fn validate_socket(path: &Path) -> Result<(), IpcError> {
    use std::os::unix::fs::{FileTypeExt, MetadataExt};

    let metadata = std::fs::symlink_metadata(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => IpcError::NotFound(path.to_path_buf()),
        std::io::ErrorKind::PermissionDenied => IpcError::PermissionDenied(path.to_path_buf()),
        _ => IpcError::Io(err),
    })?;

    if !metadata.file_type().is_socket() {
        return Err(insecure(path, "not a unix socket"));
    }

    let uid = unsafe { libc::geteuid() };
    if metadata.uid() != uid {
        return Err(insecure(path, "not owned by the current user"));
    }
    if metadata.mode() & 0o077 != 0 {
        return Err(insecure(path, "accessible by group or others"));
    }

    if let Some(parent) = path.parent() {
        let parent_meta = std::fs::symlink_metadata(parent).map_err(IpcError::Io)?;
        if parent_meta.uid() != uid {
            return Err(insecure(path, "socket directory not owned by the current user"));
        }
        if parent_meta.mode() & 0o022 != 0 {
            return Err(insecure(path, "socket directory writable by others"));
        }
    }

    Ok(())
}

fn insecure(path: &Path, detail: &str) -> IpcError {
    IpcError::InsecurePermissions {
        path: path.to_path_buf(),
        detail: detail.to_string(),
    }
}
