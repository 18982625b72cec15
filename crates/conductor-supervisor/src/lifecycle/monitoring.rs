//! Liveness classification of PID records and startup settling.

use std::process::Child;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use tracing::warn;

use crate::PROCESS_TARGET;
use crate::error::ControlError;
use crate::pid_file::{PidEntry, PidFile, PidRecord};
use crate::process::ProcessTable;

/// Slack between a process start time and its PID file timestamp.
///
/// Start times are reported at whole-second resolution, so a process that
/// wrote nothing itself can still appear to start slightly after its record.
const IDENTITY_TOLERANCE: Duration = Duration::from_secs(2);

/// Reconciled view of a service's PID file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecordState {
    /// No PID file.
    Absent,
    /// The recorded process is alive and is the one that was recorded.
    Live(u32),
    /// The PID file is garbage, names a dead process, or names a recycled PID.
    Stale(Option<u32>),
}

/// Classifies the PID file of a service without modifying it.
pub(crate) fn inspect_record<T: ProcessTable>(
    table: &T,
    pid_file: &PidFile,
) -> Result<RecordState, ControlError> {
    match pid_file.read()? {
        PidEntry::Absent => Ok(RecordState::Absent),
        PidEntry::Unreadable { content } => {
            warn!(
                target: PROCESS_TARGET,
                file = %pid_file.path().display(),
                content = %content,
                "pid file does not hold a pid"
            );
            Ok(RecordState::Stale(None))
        }
        PidEntry::Recorded(record) => {
            if record_is_live(table, &record)? {
                Ok(RecordState::Live(record.pid))
            } else {
                Ok(RecordState::Stale(Some(record.pid)))
            }
        }
    }
}

fn record_is_live<T: ProcessTable>(table: &T, record: &PidRecord) -> Result<bool, ControlError> {
    if !table.is_alive(record.pid)? {
        return Ok(false);
    }
    if is_recycled(record, table.started_at(record.pid)) {
        warn!(
            target: PROCESS_TARGET,
            pid = record.pid,
            "pid now belongs to a process started after the record was written"
        );
        return Ok(false);
    }
    Ok(true)
}

/// Whether the live process started after its PID was recorded.
pub(super) fn is_recycled(record: &PidRecord, started_at: Option<SystemTime>) -> bool {
    match (record.recorded_at, started_at) {
        (Some(recorded), Some(started)) => started > recorded + IDENTITY_TOLERANCE,
        _ => false,
    }
}

/// How a freshly spawned child fared during its settle window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Settled {
    /// Still running when the window closed.
    Alive,
    /// Exited early with the given code (`None` when killed by a signal).
    Exited(Option<i32>),
}

/// Watches `child` until it exits or `window` elapses.
pub(super) fn await_settle(
    child: &mut Child,
    window: Duration,
    poll_interval: Duration,
) -> Result<Settled, ControlError> {
    let pid = child.id();
    let deadline = Instant::now() + window;
    let interval = poll_interval.max(Duration::from_millis(1));
    loop {
        let status = child
            .try_wait()
            .map_err(|source| ControlError::MonitorChild { pid, source })?;
        if let Some(status) = status {
            return Ok(Settled::Exited(status.code()));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(Settled::Alive);
        }
        thread::sleep(interval.min(deadline - now));
    }
}
