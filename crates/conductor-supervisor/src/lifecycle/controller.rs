//! Drives start, stop and restart for a single service.

use std::path::Path;
use std::process::Child;
use std::thread;

use tracing::{info, warn};

use super::monitoring::{RecordState, Settled, await_settle, inspect_record};
use super::shutdown::{Shutdown, terminate};
use super::{LifecyclePolicy, RestartOutcome, StartOutcome, StopOutcome};
use crate::PROCESS_TARGET;
use crate::error::ControlError;
use crate::pid_file::PidFile;
use crate::process::{ProcessTable, SystemProcessTable, spawn_service};
use crate::registry::ServiceDescriptor;

/// Controls service processes through a [`ProcessTable`].
#[derive(Debug, Clone)]
pub struct ProcessController<T = SystemProcessTable> {
    table: T,
    policy: LifecyclePolicy,
}

impl ProcessController<SystemProcessTable> {
    /// Controller over the live process table.
    #[must_use]
    pub const fn system(policy: LifecyclePolicy) -> Self {
        Self::new(SystemProcessTable::new(), policy)
    }
}

impl<T: ProcessTable> ProcessController<T> {
    /// Creates a controller over `table`.
    #[must_use]
    pub const fn new(table: T, policy: LifecyclePolicy) -> Self {
        Self { table, policy }
    }

    /// Timing policy in force.
    #[must_use]
    pub const fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    pub(crate) const fn table(&self) -> &T {
        &self.table
    }

    /// Starts `service` unless a live process already owns its PID file.
    ///
    /// Stale PID files are removed first. The new process must survive the
    /// settle window; otherwise its PID file is removed again and the crash
    /// is reported.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::ExecutableMissing`] when the executable does
    /// not exist, [`ControlError::StartupCrash`] when the process exits during
    /// the settle window, and IO or lock errors otherwise.
    pub fn start(&self, service: &ServiceDescriptor) -> Result<StartOutcome, ControlError> {
        let pid_file = PidFile::new(service.pid_file());
        let _lock = pid_file.lock()?;

        match inspect_record(&self.table, &pid_file)? {
            RecordState::Live(pid) => {
                info!(
                    target: PROCESS_TARGET,
                    service = service.name(),
                    pid,
                    "service already running"
                );
                return Ok(StartOutcome::AlreadyRunning { pid });
            }
            RecordState::Stale(pid) => discard_stale(service, &pid_file, pid)?,
            RecordState::Absent => {}
        }

        let executable = service.executable_path();
        if !executable.is_file() {
            return Err(ControlError::ExecutableMissing {
                service: service.name().to_owned(),
                path: executable,
            });
        }

        let mut child = spawn_service(service)?;
        let pid = child.id();
        if let Err(error) = pid_file.write(pid) {
            abandon(service, &mut child);
            return Err(error);
        }

        let settled = match await_settle(
            &mut child,
            self.policy.settle_window,
            self.policy.shutdown.poll_interval,
        ) {
            Ok(settled) => settled,
            Err(error) => {
                abandon(service, &mut child);
                pid_file.remove()?;
                return Err(error);
            }
        };
        match settled {
            Settled::Alive => {
                info!(
                    target: PROCESS_TARGET,
                    service = service.name(),
                    pid,
                    "service started"
                );
                Ok(StartOutcome::Running { pid })
            }
            Settled::Exited(exit_code) => {
                pid_file.remove()?;
                warn!(
                    target: PROCESS_TARGET,
                    service = service.name(),
                    pid,
                    exit_code,
                    "service exited during startup"
                );
                Err(ControlError::StartupCrash {
                    service: service.name().to_owned(),
                    pid,
                    exit_code,
                    log: crash_log(service).to_path_buf(),
                })
            }
        }
    }

    /// Stops the recorded process of `service`.
    ///
    /// Sends `SIGTERM`, waits the grace period, then escalates to `SIGKILL`.
    /// The PID file is removed only once the process is gone.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::ShutdownTimeout`] when the process survives
    /// `SIGKILL`, and signal, IO or lock errors otherwise.
    pub fn stop(&self, service: &ServiceDescriptor) -> Result<StopOutcome, ControlError> {
        let pid_file = PidFile::new(service.pid_file());
        let _lock = pid_file.lock()?;

        let pid = match inspect_record(&self.table, &pid_file)? {
            RecordState::Live(pid) => pid,
            RecordState::Stale(stale_pid) => {
                discard_stale(service, &pid_file, stale_pid)?;
                return Ok(StopOutcome::NotRunning { stale_pid });
            }
            RecordState::Absent => return Ok(StopOutcome::NotRunning { stale_pid: None }),
        };

        info!(
            target: PROCESS_TARGET,
            service = service.name(),
            pid,
            "stopping service"
        );
        let escalated = match terminate(&self.table, pid, &self.policy.shutdown)? {
            Shutdown::Graceful => false,
            Shutdown::Escalated => true,
            Shutdown::Survived => {
                return Err(ControlError::ShutdownTimeout {
                    service: service.name().to_owned(),
                    pid,
                    waited: self.policy.shutdown.kill_wait,
                    pid_file: pid_file.path().to_path_buf(),
                });
            }
        };
        pid_file.remove()?;
        info!(
            target: PROCESS_TARGET,
            service = service.name(),
            pid,
            escalated,
            "service stopped"
        );
        Ok(StopOutcome::Stopped { pid, escalated })
    }

    /// Stops `service` if running, pauses, then starts it again.
    ///
    /// # Errors
    ///
    /// Propagates the first failure of either half; a failed stop skips the
    /// start.
    pub fn restart(&self, service: &ServiceDescriptor) -> Result<RestartOutcome, ControlError> {
        let stop = self.stop(service)?;
        thread::sleep(self.policy.restart_pause);
        let start = self.start(service)?;
        Ok(RestartOutcome { stop, start })
    }
}

fn discard_stale(
    service: &ServiceDescriptor,
    pid_file: &PidFile,
    pid: Option<u32>,
) -> Result<(), ControlError> {
    warn!(
        target: PROCESS_TARGET,
        service = service.name(),
        pid,
        file = %pid_file.path().display(),
        "removing stale pid file"
    );
    pid_file.remove()
}

/// Log most likely to explain a startup crash.
fn crash_log(service: &ServiceDescriptor) -> &Path {
    service.stderr_log().unwrap_or_else(|| service.stdout_log())
}

fn abandon(service: &ServiceDescriptor, child: &mut Child) {
    if let Err(error) = child.kill() {
        warn!(
            target: PROCESS_TARGET,
            service = service.name(),
            pid = child.id(),
            error = %error,
            "failed to kill abandoned child"
        );
    }
    if let Err(error) = child.wait() {
        warn!(
            target: PROCESS_TARGET,
            service = service.name(),
            pid = child.id(),
            error = %error,
            "failed to reap abandoned child"
        );
    }
}
