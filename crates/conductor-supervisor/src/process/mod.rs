//! Access to the operating system process table.
//!
//! [`ProcessTable`] is the seam between lifecycle control and the kernel.
//! Production code uses [`SystemProcessTable`]; tests substitute doubles that
//! simulate stubborn or vanishing processes.

use std::fmt;
use std::time::SystemTime;

use nix::sys::signal::Signal;
use nix::unistd::Pid;

use crate::error::ControlError;

mod spawning;
mod system;

pub(crate) use spawning::spawn_service;
pub use system::SystemProcessTable;

/// Termination request sent to a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Termination {
    /// Ask the process to exit (`SIGTERM`).
    Graceful,
    /// Kill the process outright (`SIGKILL`).
    Forceful,
}

impl Termination {
    /// Signal delivered for this request.
    #[must_use]
    pub const fn signal(self) -> Signal {
        match self {
            Self::Graceful => Signal::SIGTERM,
            Self::Forceful => Signal::SIGKILL,
        }
    }

    /// Conventional signal name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Graceful => "SIGTERM",
            Self::Forceful => "SIGKILL",
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Point-in-time resource usage of one process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceUsage {
    /// Resident memory in bytes.
    pub memory_bytes: u64,
    /// CPU usage in percent of one core.
    pub cpu_percent: f32,
    /// Process start time.
    pub started_at: Option<SystemTime>,
}

/// Operations the supervisor needs from the process table.
pub trait ProcessTable {
    /// Whether `pid` names a live, non-zombie process.
    ///
    /// Processes owned by another user count as alive.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::InvalidPid`] for unaddressable PIDs and
    /// [`ControlError::CheckProcess`] when the kernel rejects the probe.
    fn is_alive(&self, pid: u32) -> Result<bool, ControlError>;

    /// Delivers a termination request. A process that has already exited is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Signal`] when delivery fails.
    fn terminate(&self, pid: u32, request: Termination) -> Result<(), ControlError>;

    /// Start time of `pid`, when the table exposes it.
    fn started_at(&self, pid: u32) -> Option<SystemTime>;

    /// Samples resource usage; `None` when the process cannot be inspected.
    fn usage(&self, pid: u32) -> Option<ResourceUsage>;
}

impl<T: ProcessTable + ?Sized> ProcessTable for &T {
    fn is_alive(&self, pid: u32) -> Result<bool, ControlError> {
        (**self).is_alive(pid)
    }

    fn terminate(&self, pid: u32, request: Termination) -> Result<(), ControlError> {
        (**self).terminate(pid, request)
    }

    fn started_at(&self, pid: u32) -> Option<SystemTime> {
        (**self).started_at(pid)
    }

    fn usage(&self, pid: u32) -> Option<ResourceUsage> {
        (**self).usage(pid)
    }
}

/// Converts a PID into the signed form `kill(2)` expects.
///
/// Zero and values beyond `i32::MAX` would address process groups, so both
/// are rejected.
pub(crate) fn to_nix_pid(pid: u32) -> Result<Pid, ControlError> {
    if pid == 0 {
        return Err(ControlError::InvalidPid {
            pid,
            reason: "pid 0 addresses the caller's process group",
        });
    }
    let raw = i32::try_from(pid).map_err(|_| ControlError::InvalidPid {
        pid,
        reason: "pid exceeds i32::MAX",
    })?;
    Ok(Pid::from_raw(raw))
}
