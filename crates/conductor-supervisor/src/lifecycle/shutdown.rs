//! Two-phase termination: `SIGTERM`, a grace period, then `SIGKILL`.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::ShutdownPolicy;
use crate::PROCESS_TARGET;
use crate::error::ControlError;
use crate::process::{ProcessTable, Termination};

/// How a termination attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Shutdown {
    /// Exited within the grace period.
    Graceful,
    /// Exited only after `SIGKILL`.
    Escalated,
    /// Still alive after the post-kill wait.
    Survived,
}

/// Terminates `pid`, escalating once the grace period has fully elapsed.
pub(super) fn terminate<T: ProcessTable>(
    table: &T,
    pid: u32,
    policy: &ShutdownPolicy,
) -> Result<Shutdown, ControlError> {
    table.terminate(pid, Termination::Graceful)?;
    if wait_for_exit(table, pid, policy.grace, policy.poll_interval)? {
        info!(target: PROCESS_TARGET, pid, "process exited after SIGTERM");
        return Ok(Shutdown::Graceful);
    }

    warn!(
        target: PROCESS_TARGET,
        pid,
        grace_ms = u64::try_from(policy.grace.as_millis()).unwrap_or(u64::MAX),
        "process ignored SIGTERM; sending SIGKILL"
    );
    table.terminate(pid, Termination::Forceful)?;
    if wait_for_exit(table, pid, policy.kill_wait, policy.poll_interval)? {
        return Ok(Shutdown::Escalated);
    }
    Ok(Shutdown::Survived)
}

/// Polls until `pid` is gone or `budget` elapses. Returns whether it exited.
fn wait_for_exit<T: ProcessTable>(
    table: &T,
    pid: u32,
    budget: Duration,
    poll_interval: Duration,
) -> Result<bool, ControlError> {
    let deadline = Instant::now() + budget;
    let interval = poll_interval.max(Duration::from_millis(1));
    loop {
        if !table.is_alive(pid)? {
            return Ok(true);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }
        thread::sleep(interval.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::{FakeProcess, FakeProcessTable};

    fn policy(grace_ms: u64) -> ShutdownPolicy {
        ShutdownPolicy {
            grace: Duration::from_millis(grace_ms),
            poll_interval: Duration::from_millis(10),
            kill_wait: Duration::from_millis(100),
        }
    }

    #[test]
    fn cooperative_process_stops_without_escalation() {
        let table = FakeProcessTable::with(42, FakeProcess::Cooperative);
        let outcome = terminate(&table, 42, &policy(200)).expect("terminate");
        assert_eq!(outcome, Shutdown::Graceful);
        assert_eq!(table.requests(42), vec![Termination::Graceful]);
    }

    #[test]
    fn stubborn_process_is_killed_after_full_grace_period() {
        let table = FakeProcessTable::with(42, FakeProcess::IgnoresTerm);
        let grace = Duration::from_millis(150);
        let outcome = terminate(&table, 42, &policy(150)).expect("terminate");
        assert_eq!(outcome, Shutdown::Escalated);
        assert_eq!(
            table.requests(42),
            vec![Termination::Graceful, Termination::Forceful]
        );
        let gap = table.escalation_gap(42).expect("both signals recorded");
        assert!(gap >= grace, "escalated after only {gap:?}");
    }

    #[test]
    fn unkillable_process_survives() {
        let table = FakeProcessTable::with(42, FakeProcess::Unkillable);
        let outcome = terminate(&table, 42, &policy(20)).expect("terminate");
        assert_eq!(outcome, Shutdown::Survived);
    }
}
