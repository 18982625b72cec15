//! Shared helpers for supervisor tests.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

use crate::error::ControlError;
use crate::lifecycle::{LifecyclePolicy, ShutdownPolicy};
use crate::process::{ProcessTable, ResourceUsage, Termination};
use crate::registry::ServiceDescriptor;

/// Timings short enough for tests yet long enough for `sh` to exec.
pub(crate) fn test_policy() -> LifecyclePolicy {
    LifecyclePolicy {
        settle_window: Duration::from_millis(250),
        shutdown: ShutdownPolicy {
            grace: Duration::from_secs(2),
            poll_interval: Duration::from_millis(20),
            kill_wait: Duration::from_secs(1),
        },
        restart_pause: Duration::from_millis(50),
        probe_timeout: Duration::from_secs(1),
    }
}

/// Writes `body` as `<name>.sh` under `dir` and describes it as a service
/// launched through `sh`.
///
/// Going through `sh` keeps the freshly written file from being exec'd
/// directly, which can fail with `ETXTBSY` while other test threads fork.
pub(crate) fn script_service(dir: &Path, name: &str, body: &str) -> ServiceDescriptor {
    let file = format!("{name}.sh");
    fs::write(dir.join(&file), format!("{body}\n")).expect("write service script");
    ServiceDescriptor::new(name, file, dir).with_launcher("sh")
}

/// A service whose process stays up until signalled.
pub(crate) fn long_running(dir: &Path, name: &str) -> ServiceDescriptor {
    script_service(dir, name, "exec sleep 30")
}

/// How a simulated process reacts to termination requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FakeProcess {
    /// Exits on `SIGTERM`.
    Cooperative,
    /// Exits only on `SIGKILL`.
    IgnoresTerm,
    /// Never exits.
    Unkillable,
}

#[derive(Debug)]
struct FakeEntry {
    behaviour: FakeProcess,
    alive: bool,
    started_at: Option<SystemTime>,
    requests: Vec<(Termination, Instant)>,
}

/// In-memory process table for scenarios real processes cannot stage.
#[derive(Debug, Default)]
pub(crate) struct FakeProcessTable {
    processes: Mutex<HashMap<u32, FakeEntry>>,
}

impl FakeProcessTable {
    pub(crate) fn with(pid: u32, behaviour: FakeProcess) -> Self {
        let table = Self::default();
        table.add(pid, behaviour, None);
        table
    }

    pub(crate) fn add(&self, pid: u32, behaviour: FakeProcess, started_at: Option<SystemTime>) {
        self.lock().insert(
            pid,
            FakeEntry {
                behaviour,
                alive: true,
                started_at,
                requests: Vec::new(),
            },
        );
    }

    pub(crate) fn requests(&self, pid: u32) -> Vec<Termination> {
        self.lock()
            .get(&pid)
            .map(|entry| entry.requests.iter().map(|(request, _)| *request).collect())
            .unwrap_or_default()
    }

    /// Time between the first `SIGTERM` and the first `SIGKILL`.
    pub(crate) fn escalation_gap(&self, pid: u32) -> Option<Duration> {
        let processes = self.lock();
        let requests = &processes.get(&pid)?.requests;
        let sent = |kind| {
            requests
                .iter()
                .find(|(request, _)| *request == kind)
                .map(|(_, at)| *at)
        };
        Some(sent(Termination::Forceful)? - sent(Termination::Graceful)?)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u32, FakeEntry>> {
        self.processes.lock().expect("fake process table lock")
    }
}

impl ProcessTable for FakeProcessTable {
    fn is_alive(&self, pid: u32) -> Result<bool, ControlError> {
        Ok(self.lock().get(&pid).is_some_and(|entry| entry.alive))
    }

    fn terminate(&self, pid: u32, request: Termination) -> Result<(), ControlError> {
        if let Some(entry) = self.lock().get_mut(&pid) {
            entry.requests.push((request, Instant::now()));
            let exits = match entry.behaviour {
                FakeProcess::Cooperative => true,
                FakeProcess::IgnoresTerm => request == Termination::Forceful,
                FakeProcess::Unkillable => false,
            };
            if exits {
                entry.alive = false;
            }
        }
        Ok(())
    }

    fn started_at(&self, pid: u32) -> Option<SystemTime> {
        self.lock().get(&pid).and_then(|entry| entry.started_at)
    }

    fn usage(&self, pid: u32) -> Option<ResourceUsage> {
        let processes = self.lock();
        let entry = processes.get(&pid).filter(|entry| entry.alive)?;
        Some(ResourceUsage {
            memory_bytes: 10 * 1_048_576,
            cpu_percent: 0.5,
            started_at: entry.started_at,
        })
    }
}
