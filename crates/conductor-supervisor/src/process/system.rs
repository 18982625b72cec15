//! Process table backed by `kill(2)`, `waitpid(2)` and `sysinfo`.

use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use sysinfo::{Pid as SysPid, ProcessStatus, ProcessesToUpdate, System};
use tracing::debug;

use super::{ProcessTable, ResourceUsage, Termination, to_nix_pid};
use crate::PROCESS_TARGET;
use crate::error::ControlError;

/// The live operating-system process table.
#[derive(Debug, Clone, Copy)]
pub struct SystemProcessTable {
    cpu_sample: Duration,
}

impl SystemProcessTable {
    /// Creates a table that samples CPU usage over the minimum interval
    /// `sysinfo` supports.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cpu_sample: sysinfo::MINIMUM_CPU_UPDATE_INTERVAL,
        }
    }
}

impl Default for SystemProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SystemProcessTable {
    fn is_alive(&self, pid: u32) -> Result<bool, ControlError> {
        let target = to_nix_pid(pid)?;
        match kill(target, None) {
            Ok(()) | Err(Errno::EPERM) => {}
            Err(Errno::ESRCH) => return Ok(false),
            Err(source) => return Err(ControlError::CheckProcess { pid, source }),
        }
        // A child of this process lingers as a zombie until reaped; waiting
        // here keeps `kill(pid, 0)` from reporting it alive forever.
        if reap_exited_child(target) {
            return Ok(false);
        }
        Ok(!is_zombie(pid))
    }

    fn terminate(&self, pid: u32, request: Termination) -> Result<(), ControlError> {
        let target = to_nix_pid(pid)?;
        match kill(target, request.signal()) {
            Ok(()) => Ok(()),
            Err(Errno::ESRCH) => {
                debug!(
                    target: PROCESS_TARGET,
                    pid,
                    signal = request.name(),
                    "process already gone before signal"
                );
                Ok(())
            }
            Err(source) => Err(ControlError::Signal {
                pid,
                signal: request.name(),
                source,
            }),
        }
    }

    fn started_at(&self, pid: u32) -> Option<SystemTime> {
        let system = snapshot(pid);
        let process = system.process(SysPid::from_u32(pid))?;
        Some(UNIX_EPOCH + Duration::from_secs(process.start_time()))
    }

    fn usage(&self, pid: u32) -> Option<ResourceUsage> {
        let sys_pid = SysPid::from_u32(pid);
        let mut system = snapshot(pid);
        system.process(sys_pid)?;
        // CPU usage is a delta, so it needs two refreshes spaced apart.
        thread::sleep(self.cpu_sample);
        system.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);
        let process = system.process(sys_pid)?;
        Some(ResourceUsage {
            memory_bytes: process.memory(),
            cpu_percent: process.cpu_usage(),
            started_at: Some(UNIX_EPOCH + Duration::from_secs(process.start_time())),
        })
    }
}

fn snapshot(pid: u32) -> System {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[SysPid::from_u32(pid)]), true);
    system
}

fn reap_exited_child(target: Pid) -> bool {
    matches!(
        waitpid(target, Some(WaitPidFlag::WNOHANG)),
        Ok(WaitStatus::Exited(..) | WaitStatus::Signaled(..))
    )
}

fn is_zombie(pid: u32) -> bool {
    snapshot(pid)
        .process(SysPid::from_u32(pid))
        .is_some_and(|process| matches!(process.status(), ProcessStatus::Zombie))
}
