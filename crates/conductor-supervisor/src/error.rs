//! Defines the unified error surface for service lifecycle control.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use nix::errno::Errno;
use thiserror::Error;

/// Errors surfaced while starting, stopping, or inspecting a service.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The service executable does not exist yet.
    #[error("{service}: executable '{}' is not available", path.display())]
    ExecutableMissing {
        /// Service name.
        service: String,
        /// Expected executable location.
        path: PathBuf,
    },
    /// The spawned process exited before the settle window elapsed.
    #[error(
        "{service}: process {pid} exited during startup ({}); check '{}'",
        describe_exit(*exit_code),
        log.display()
    )]
    StartupCrash {
        /// Service name.
        service: String,
        /// PID of the process that exited.
        pid: u32,
        /// Exit code, when the process exited normally.
        exit_code: Option<i32>,
        /// Log file holding the crash output.
        log: PathBuf,
    },
    /// Spawning the service process failed.
    #[error("{service}: failed to launch '{program}': {source}")]
    Launch {
        /// Service name.
        service: String,
        /// Program that was executed.
        program: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A service log file could not be opened for appending.
    #[error("failed to open log file '{}': {source}", path.display())]
    OpenLog {
        /// Log file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Reading the PID file failed.
    #[error("failed to read pid file '{}': {source}", path.display())]
    ReadPid {
        /// PID file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing the PID file failed.
    #[error("failed to write pid file '{}': {source}", path.display())]
    WritePid {
        /// PID file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Removing the PID file failed.
    #[error("failed to remove pid file '{}': {source}", path.display())]
    RemovePid {
        /// PID file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The per-service lock file could not be opened.
    #[error("failed to open lock file '{}': {source}", path.display())]
    OpenLock {
        /// Lock file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Acquiring the per-service lock failed.
    #[error("failed to lock '{}': {source}", path.display())]
    Lock {
        /// Lock file path.
        path: PathBuf,
        /// Underlying OS error.
        source: Errno,
    },
    /// The PID cannot be addressed by a signal.
    #[error("invalid pid {pid}: {reason}")]
    InvalidPid {
        /// Rejected PID.
        pid: u32,
        /// Why the PID was rejected.
        reason: &'static str,
    },
    /// Delivering a signal failed.
    #[error("failed to send {signal} to process {pid}: {source}")]
    Signal {
        /// Target PID.
        pid: u32,
        /// Signal name.
        signal: &'static str,
        /// Underlying OS error.
        source: Errno,
    },
    /// Probing a PID for liveness failed.
    #[error("failed to check process {pid}: {source}")]
    CheckProcess {
        /// Probed PID.
        pid: u32,
        /// Underlying OS error.
        source: Errno,
    },
    /// Waiting on a freshly spawned child failed.
    #[error("failed to monitor process {pid}: {source}")]
    MonitorChild {
        /// Child PID.
        pid: u32,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The process survived forced termination.
    #[error(
        "{service}: process {pid} is still alive {waited:?} after SIGKILL; pid file kept at '{}'",
        pid_file.display()
    )]
    ShutdownTimeout {
        /// Service name.
        service: String,
        /// PID that refused to exit.
        pid: u32,
        /// Time spent waiting after SIGKILL.
        waited: Duration,
        /// PID file left in place.
        pid_file: PathBuf,
    },
}

fn describe_exit(code: Option<i32>) -> String {
    code.map_or_else(
        || String::from("terminated by signal"),
        |value| format!("exit code {value}"),
    )
}
