//! PID-file bookkeeping and the per-service advisory lock.
//!
//! The PID file is the supervisor's only record of a running service. Writes
//! go through a temporary file that is renamed into place, so concurrent
//! readers never observe a partially written PID. Mutating operations hold an
//! exclusive `flock(2)` on a sibling `<pid file>.lock`, which is never deleted
//! so that every invocation contends on the same inode.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use nix::fcntl::{Flock, FlockArg};
use tempfile::Builder;
use tracing::{debug, info};

use crate::PROCESS_TARGET;
use crate::error::ControlError;

/// A PID recorded on disk together with when it was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidRecord {
    /// Recorded process identifier.
    pub pid: u32,
    /// Modification time of the PID file, when the filesystem reports one.
    pub recorded_at: Option<SystemTime>,
}

/// What the PID file currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PidEntry {
    /// No PID file exists.
    Absent,
    /// The file holds a positive integer.
    Recorded(PidRecord),
    /// The file exists but does not hold a usable PID.
    Unreadable {
        /// Raw file contents, trimmed.
        content: String,
    },
}

/// Handle on one service's PID file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidFile {
    path: PathBuf,
    lock_path: PathBuf,
}

impl PidFile {
    /// Wraps the PID file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = OsString::from(path.as_os_str());
        lock_name.push(".lock");
        Self {
            lock_path: PathBuf::from(lock_name),
            path,
        }
    }

    /// PID file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock file location.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Reads the current PID entry.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::ReadPid`] when the file exists but cannot be
    /// read.
    pub fn read(&self) -> Result<PidEntry, ControlError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(PidEntry::Absent),
            Err(source) => return Err(self.read_error(source)),
        };
        let trimmed = content.trim();
        let Some(pid) = trimmed.parse::<u32>().ok().filter(|pid| *pid != 0) else {
            return Ok(PidEntry::Unreadable {
                content: trimmed.to_owned(),
            });
        };
        let recorded_at = fs::metadata(&self.path)
            .and_then(|metadata| metadata.modified())
            .ok();
        Ok(PidEntry::Recorded(PidRecord { pid, recorded_at }))
    }

    /// Atomically replaces the PID file with `pid`.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::WritePid`] when the directory cannot be
    /// prepared or the file cannot be persisted.
    pub fn write(&self, pid: u32) -> Result<(), ControlError> {
        atomic_write(&self.path, format!("{pid}\n").as_bytes()).map_err(|source| {
            ControlError::WritePid {
                path: self.path.clone(),
                source,
            }
        })?;
        info!(
            target: PROCESS_TARGET,
            pid,
            file = %self.path.display(),
            "pid file written"
        );
        Ok(())
    }

    /// Deletes the PID file; a missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::RemovePid`] for any other removal failure.
    pub fn remove(&self) -> Result<(), ControlError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(
                    target: PROCESS_TARGET,
                    file = %self.path.display(),
                    "pid file removed"
                );
                Ok(())
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ControlError::RemovePid {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Blocks until this invocation holds the service's exclusive lock.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::OpenLock`] or [`ControlError::Lock`] when the
    /// lock file cannot be opened or locked.
    pub fn lock(&self) -> Result<PidLock, ControlError> {
        ensure_parent(&self.lock_path).map_err(|source| self.open_lock_error(source))?;
        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true).truncate(false);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options
            .open(&self.lock_path)
            .map_err(|source| self.open_lock_error(source))?;
        let lock = Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, source)| {
            ControlError::Lock {
                path: self.lock_path.clone(),
                source,
            }
        })?;
        debug!(
            target: PROCESS_TARGET,
            file = %self.lock_path.display(),
            "acquired service lock"
        );
        Ok(PidLock { _lock: lock })
    }

    fn read_error(&self, source: io::Error) -> ControlError {
        ControlError::ReadPid {
            path: self.path.clone(),
            source,
        }
    }

    fn open_lock_error(&self, source: io::Error) -> ControlError {
        ControlError::OpenLock {
            path: self.lock_path.clone(),
            source,
        }
    }
}

/// Exclusive lock on a service; released when dropped.
#[derive(Debug)]
pub struct PidLock {
    _lock: Flock<File>,
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    ensure_parent(path)?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut builder = Builder::new();
    builder.prefix(
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("conductor"),
    );
    #[cfg(unix)]
    {
        use std::fs::Permissions;
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(Permissions::from_mode(0o600));
    }

    let mut file = builder.tempfile_in(directory)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}
