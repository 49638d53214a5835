//! OS specific functionalities.

use std::{
    ffi::{OsStr, OsString},
    fs::File,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use serde::{Deserialize, Serialize};

use crate::error::{InstallerError, InstallerErrorKind};

#[cfg(unix)]
pub(crate) mod unix;
#[cfg(windows)]
pub(crate) mod windows;

/// OS specific error wrapper.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum OsError {
    /// Standard IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Error type provided by the Windows crates by Microsoft.
    #[cfg(windows)]
    #[error(transparent)]
    Windows(#[from] windows_result::Error),

    /// Any other error.
    #[error("{0}")]
    Other(&'static str),
}

impl From<OsError> for InstallerError {
    fn from(value: OsError) -> Self {
        InstallerError::new(InstallerErrorKind::Io).with_source(value)
    }
}

/// Specifies who can use the application on a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccessScope {
    /// For the current user only.
    #[default]
    User,
    /// For all users.
    System,
}

impl AccessScope {
    /// Picks the scope for the current process.
    ///
    /// An elevated process installs for all users unless `force_user` is set.
    pub fn detect(force_user: bool) -> Self {
        if !force_user && is_elevated() {
            Self::System
        } else {
            Self::User
        }
    }
}

/// Returns whether the process runs with administrator privileges.
///
/// Always `false` on platforms where this is not detected.
pub fn is_elevated() -> bool {
    #[cfg(unix)]
    {
        unix::is_root()
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Information returned by [`file_checksum`].
#[derive(Debug, Clone, PartialEq)]
pub struct FileChecksum {
    /// CRC32C checksum of the file.
    pub crc32c: u32,
    /// Size of the file.
    pub len: u64,
}

/// Computes a checksum for a file.
pub fn file_checksum<P: AsRef<Path>>(path: P) -> std::io::Result<FileChecksum> {
    let path = path.as_ref();
    tracing::trace!(?path, "file checksum");
    let len = path.metadata()?.len();

    let mut file = File::open(path)?;
    let mut compute = crc32c::Crc32cWriter::new(std::io::empty());

    std::io::copy(&mut file, &mut compute)?;

    Ok(FileChecksum {
        crc32c: compute.crc32c(),
        len,
    })
}

/// Marks a file as executable for everyone allowed by the umask.
///
/// Does nothing on platforms without POSIX permissions.
pub fn set_executable(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mode = unix::get_effective_posix_permission(true);
        tracing::debug!(mode, ?path, "set POSIX permissions");
        unix::set_posix_permission(path, mode)?;
    }

    let _ = path;

    Ok(())
}

/// Returns whether a file looks runnable: non-empty and, on unix, with an
/// execute bit set.
pub fn is_executable_file(path: &Path) -> bool {
    let Ok(metadata) = path.metadata() else {
        return false;
    };

    if !metadata.is_file() || metadata.len() == 0 {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

pub(crate) fn env_var<A: AsRef<OsStr>>(key: A) -> Result<OsString, InstallerError> {
    tracing::trace!(key = ?key.as_ref(), "env_var");
    std::env::var_os(key.as_ref()).ok_or_else(|| {
        InstallerError::new(InstallerErrorKind::InvalidEnvironmentVariable)
            .with_context(key.as_ref().to_string_lossy())
    })
}

/// Shared flag raised when the process receives an interrupt signal.
///
/// Long running steps poll it and stop at the next safe point.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    /// Creates a flag that is never raised unless [`Self::raise`] is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a flag raised by Ctrl-C.
    ///
    /// Only one handler may be installed per process.
    pub fn with_ctrlc_handler() -> Result<Self, InstallerError> {
        let interrupt = Self::new();
        let flag = interrupt.flag.clone();

        ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
        })
        .map_err(|error| InstallerError::new(InstallerErrorKind::Other).with_source(error))?;

        Ok(interrupt)
    }

    /// Raises the flag.
    pub fn raise(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns whether the flag was raised.
    pub fn is_raised(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Returns an error if the flag was raised.
    pub fn check(&self) -> Result<(), InstallerError> {
        if self.is_raised() {
            Err(InstallerErrorKind::Interrupted.into())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_file_checksum() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        file.flush().unwrap();

        let checksum = file_checksum(file.path()).unwrap();

        assert_eq!(checksum.len, 11);
        assert_eq!(checksum.crc32c, crc32c::crc32c(b"hello world"));
    }

    #[test]
    fn test_interrupt() {
        let interrupt = Interrupt::new();
        let clone = interrupt.clone();

        assert!(interrupt.check().is_ok());

        clone.raise();

        assert!(interrupt.is_raised());
        assert!(matches!(
            interrupt.check().unwrap_err().kind(),
            InstallerErrorKind::Interrupted
        ));
    }

    #[test]
    fn test_is_executable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tool");

        assert!(!is_executable_file(&path));

        std::fs::write(&path, b"").unwrap();
        assert!(!is_executable_file(&path));

        std::fs::write(&path, b"#!/bin/sh\n").unwrap();
        set_executable(&path).unwrap();
        assert!(is_executable_file(&path));
    }
}
