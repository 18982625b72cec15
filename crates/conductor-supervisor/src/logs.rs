//! Reading service logs: the last N lines, and following appended output.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::registry::ServiceDescriptor;

const CHUNK_SIZE: u64 = 8 * 1024;

/// Which of a service's logs to read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogStream {
    /// The primary log (stdout, and stderr unless split).
    #[default]
    Main,
    /// The separate stderr log.
    Errors,
}

/// Errors raised while reading logs.
#[derive(Debug, Error)]
pub enum LogError {
    /// The log file does not exist yet.
    #[error("log file '{}' does not exist", path.display())]
    Missing {
        /// Expected log path.
        path: PathBuf,
    },
    /// The service writes no separate error log.
    #[error("{service} has no separate error log")]
    NoErrorLog {
        /// Service name.
        service: String,
    },
    /// Reading the log failed.
    #[error("failed to read log file '{}': {source}", path.display())]
    Read {
        /// Log path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing followed output failed.
    #[error("failed to write log output: {source}")]
    Write {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Resolves the log file behind `stream` for `service`.
///
/// # Errors
///
/// Returns [`LogError::NoErrorLog`] when [`LogStream::Errors`] is requested
/// for a service that does not split stderr.
pub fn log_path(service: &ServiceDescriptor, stream: LogStream) -> Result<&Path, LogError> {
    match stream {
        LogStream::Main => Ok(service.stdout_log()),
        LogStream::Errors => service.stderr_log().ok_or_else(|| LogError::NoErrorLog {
            service: service.name().to_owned(),
        }),
    }
}

/// Returns the last `count` lines of the file at `path`.
///
/// The file is read backwards in fixed-size chunks, so large logs cost only
/// as much IO as the requested tail. A trailing newline does not produce an
/// empty final line.
///
/// # Errors
///
/// Returns [`LogError::Missing`] when the file does not exist and
/// [`LogError::Read`] for other IO failures.
pub fn tail(path: &Path, count: usize) -> Result<Vec<String>, LogError> {
    let mut file = open(path)?;
    let read_error = |source| LogError::Read {
        path: path.to_path_buf(),
        source,
    };
    let length = file.metadata().map_err(read_error)?.len();
    if count == 0 || length == 0 {
        return Ok(Vec::new());
    }

    let mut buffer: Vec<u8> = Vec::new();
    let mut position = length;
    while position > 0 && newline_count(&buffer) <= count {
        let step = CHUNK_SIZE.min(position);
        position -= step;
        let mut chunk = vec![0_u8; usize::try_from(step).unwrap_or(usize::MAX)];
        file.seek(SeekFrom::Start(position)).map_err(read_error)?;
        file.read_exact(&mut chunk).map_err(read_error)?;
        chunk.extend_from_slice(&buffer);
        buffer = chunk;
    }

    let text = String::from_utf8_lossy(&buffer);
    let lines: Vec<&str> = text.lines().collect();
    let skip = lines.len().saturating_sub(count);
    Ok(lines
        .into_iter()
        .skip(skip)
        .map(str::to_owned)
        .collect())
}

fn newline_count(buffer: &[u8]) -> usize {
    buffer.iter().filter(|byte| **byte == b'\n').count()
}

fn open(path: &Path) -> Result<File, LogError> {
    File::open(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            LogError::Missing {
                path: path.to_path_buf(),
            }
        } else {
            LogError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Incrementally copies bytes appended to a log file.
#[derive(Debug)]
pub struct LogFollower {
    path: PathBuf,
    offset: u64,
}

impl LogFollower {
    /// Starts following at the current end of the file.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Missing`] when the file does not exist.
    pub fn from_end(path: impl Into<PathBuf>) -> Result<Self, LogError> {
        let path = path.into();
        let file = open(&path)?;
        let offset = file
            .metadata()
            .map_err(|source| LogError::Read {
                path: path.clone(),
                source,
            })?
            .len();
        Ok(Self { path, offset })
    }

    /// Byte offset the next poll reads from.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Copies anything appended since the last poll into `out`.
    ///
    /// A file that shrank was truncated or rotated; reading restarts from
    /// its beginning. Returns the number of bytes copied.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Read`] or [`LogError::Write`] on IO failure.
    pub fn poll<W: Write>(&mut self, out: &mut W) -> Result<u64, LogError> {
        let read_error = |source| LogError::Read {
            path: self.path.clone(),
            source,
        };
        let mut file = match open(&self.path) {
            Ok(file) => file,
            // Rotation may briefly leave no file behind.
            Err(LogError::Missing { .. }) => return Ok(0),
            Err(error) => return Err(error),
        };
        let length = file.metadata().map_err(read_error)?.len();
        if length < self.offset {
            self.offset = 0;
        }
        if length == self.offset {
            return Ok(0);
        }
        file.seek(SeekFrom::Start(self.offset)).map_err(read_error)?;
        let copied = io::copy(&mut file.take(length - self.offset), out).map_err(|source| {
            LogError::Write { source }
        })?;
        self.offset += copied;
        Ok(copied)
    }

    /// Polls forever, flushing `out` after each batch.
    ///
    /// # Errors
    ///
    /// Returns the first IO failure; otherwise never returns.
    pub fn follow<W: Write>(&mut self, out: &mut W, interval: Duration) -> Result<(), LogError> {
        loop {
            if self.poll(out)? > 0 {
                out.flush().map_err(|source| LogError::Write { source })?;
            }
            thread::sleep(interval);
        }
    }
}
