//! Service status reporting with resource metrics and health probing.

use std::time::SystemTime;

use serde::{Serialize, Serializer};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};

use crate::PROCESS_TARGET;
use crate::error::ControlError;
use crate::lifecycle::{ProcessController, RecordState, inspect_record};
use crate::pid_file::PidFile;
use crate::probe;
use crate::process::ProcessTable;
use crate::registry::ServiceDescriptor;

/// Metrics sampled from a running service process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProcessSnapshot {
    /// Process identifier.
    pub pid: u32,
    /// Resident memory in bytes, when it could be sampled.
    pub memory_bytes: Option<u64>,
    /// CPU usage in percent of one core, when it could be sampled.
    pub cpu_percent: Option<f32>,
    /// Process start time.
    #[serde(serialize_with = "serialize_timestamp")]
    pub started_at: Option<SystemTime>,
}

impl ProcessSnapshot {
    /// Samples `pid` through `table`. Missing metrics are left empty.
    pub fn capture<T: ProcessTable>(table: &T, pid: u32) -> Self {
        match table.usage(pid) {
            Some(usage) => Self {
                pid,
                memory_bytes: Some(usage.memory_bytes),
                cpu_percent: Some(usage.cpu_percent),
                started_at: usage.started_at,
            },
            None => {
                debug!(target: PROCESS_TARGET, pid, "process metrics unavailable");
                Self {
                    pid,
                    memory_bytes: None,
                    cpu_percent: None,
                    started_at: None,
                }
            }
        }
    }

    /// Resident memory in mebibytes.
    #[must_use]
    pub fn memory_mib(&self) -> Option<f64> {
        self.memory_bytes.map(|bytes| bytes as f64 / 1_048_576.0)
    }

    /// Start time formatted as RFC 3339.
    #[must_use]
    pub fn started_at_rfc3339(&self) -> Option<String> {
        self.started_at.and_then(format_timestamp)
    }
}

/// Reported state of one service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ServiceStatus {
    /// No live process is recorded.
    Stopped {
        /// PID of a stale record removed while checking, if any.
        reconciled_pid: Option<u32>,
    },
    /// The process is alive and, when probed, healthy.
    Running {
        /// Sampled process metrics.
        #[serde(flatten)]
        process: ProcessSnapshot,
    },
    /// The process is alive but its health probe failed.
    Degraded {
        /// Sampled process metrics.
        #[serde(flatten)]
        process: ProcessSnapshot,
        /// Why the probe failed.
        probe_error: String,
    },
}

impl ServiceStatus {
    /// Whether a live process backs the service.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        !matches!(self, Self::Stopped { .. })
    }

    /// Snapshot of the live process, if any.
    #[must_use]
    pub const fn process(&self) -> Option<&ProcessSnapshot> {
        match self {
            Self::Stopped { .. } => None,
            Self::Running { process } | Self::Degraded { process, .. } => Some(process),
        }
    }

    /// Lower-case state label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Stopped { .. } => "stopped",
            Self::Running { .. } => "running",
            Self::Degraded { .. } => "degraded",
        }
    }
}

impl<T: ProcessTable> ProcessController<T> {
    /// Reports whether `service` is running and, if so, how it is doing.
    ///
    /// A stale PID file is removed while checking. Services with a health
    /// endpoint are probed once; a failed probe reports
    /// [`ServiceStatus::Degraded`] rather than an error.
    ///
    /// # Errors
    ///
    /// Returns PID-file, lock or process-table errors.
    pub fn status(&self, service: &ServiceDescriptor) -> Result<ServiceStatus, ControlError> {
        let pid_file = PidFile::new(service.pid_file());
        let lock = pid_file.lock()?;
        let pid = match inspect_record(self.table(), &pid_file)? {
            RecordState::Live(pid) => pid,
            RecordState::Stale(stale) => {
                warn!(
                    target: PROCESS_TARGET,
                    service = service.name(),
                    pid = stale,
                    "removing stale pid file"
                );
                pid_file.remove()?;
                return Ok(ServiceStatus::Stopped {
                    reconciled_pid: stale,
                });
            }
            RecordState::Absent => {
                return Ok(ServiceStatus::Stopped {
                    reconciled_pid: None,
                });
            }
        };
        // Sampling and probing only read, so other invocations may proceed.
        drop(lock);

        let process = ProcessSnapshot::capture(self.table(), pid);
        let Some(url) = service.health_url() else {
            return Ok(ServiceStatus::Running { process });
        };
        match probe::check(&url, self.policy().probe_timeout) {
            Ok(()) => Ok(ServiceStatus::Running { process }),
            Err(error) => {
                warn!(
                    target: PROCESS_TARGET,
                    service = service.name(),
                    url = %url,
                    error = %error,
                    "health probe failed"
                );
                Ok(ServiceStatus::Degraded {
                    process,
                    probe_error: error.to_string(),
                })
            }
        }
    }
}

/// Formats `time` as RFC 3339 in UTC.
#[must_use]
pub fn format_timestamp(time: SystemTime) -> Option<String> {
    OffsetDateTime::from(time).format(&Rfc3339).ok()
}

fn serialize_timestamp<S: Serializer>(
    time: &Option<SystemTime>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match time.and_then(format_timestamp) {
        Some(formatted) => serializer.serialize_some(&formatted),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn snapshot() -> ProcessSnapshot {
        ProcessSnapshot {
            pid: 4242,
            memory_bytes: Some(50 * 1_048_576),
            cpu_percent: Some(1.5),
            started_at: Some(UNIX_EPOCH + Duration::from_secs(1_700_000_000)),
        }
    }

    #[test]
    fn running_status_serialises_flat() {
        let status = ServiceStatus::Running {
            process: snapshot(),
        };
        let value = serde_json::to_value(&status).expect("serialise");
        assert_eq!(value["state"], "running");
        assert_eq!(value["pid"], 4242);
        assert_eq!(value["started_at"], "2023-11-14T22:13:20Z");
    }

    #[test]
    fn degraded_status_carries_probe_error() {
        let status = ServiceStatus::Degraded {
            process: snapshot(),
            probe_error: String::from("health endpoint returned HTTP 503"),
        };
        let value = serde_json::to_value(&status).expect("serialise");
        assert_eq!(value["state"], "degraded");
        assert_eq!(value["probe_error"], "health endpoint returned HTTP 503");
        assert!(status.is_alive());
    }

    #[test]
    fn memory_is_reported_in_mebibytes() {
        let mib = snapshot().memory_mib().expect("memory");
        assert!((mib - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stopped_status_has_no_process() {
        let status = ServiceStatus::Stopped {
            reconciled_pid: Some(7),
        };
        assert!(status.process().is_none());
        assert_eq!(status.label(), "stopped");
    }
}
