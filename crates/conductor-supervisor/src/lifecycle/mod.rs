//! Per-service lifecycle control: start, stop, restart.
//!
//! Every mutating operation takes the service's advisory lock first, then
//! reconciles the PID file against the process table before acting.

mod controller;
mod monitoring;
mod shutdown;

use std::time::Duration;

use serde::Serialize;

use conductor_config::Config;

pub use controller::ProcessController;
pub(crate) use monitoring::{RecordState, inspect_record};

/// Bounded wait after `SIGKILL` before a stop is declared failed.
const KILL_WAIT: Duration = Duration::from_secs(5);

/// Timing rules for graceful shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownPolicy {
    /// Time granted after `SIGTERM` before escalating.
    pub grace: Duration,
    /// Interval between liveness polls.
    pub poll_interval: Duration,
    /// Time granted after `SIGKILL` before giving up.
    pub kill_wait: Duration,
}

/// Timing rules applied by [`ProcessController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// How long a new process must survive to count as started.
    pub settle_window: Duration,
    /// Shutdown timings.
    pub shutdown: ShutdownPolicy,
    /// Pause between the stop and start halves of a restart.
    pub restart_pause: Duration,
    /// Budget for one health probe.
    pub probe_timeout: Duration,
}

impl LifecyclePolicy {
    /// Derives the policy from loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            settle_window: config.settle_window(),
            shutdown: ShutdownPolicy {
                grace: config.stop_timeout(),
                poll_interval: config.poll_interval(),
                kill_wait: KILL_WAIT,
            },
            restart_pause: config.restart_pause(),
            probe_timeout: config.probe_timeout(),
        }
    }
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Result of a successful start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    /// A new process was spawned and survived the settle window.
    Running {
        /// PID of the new process.
        pid: u32,
    },
    /// A live process already owned the PID file; nothing was spawned.
    AlreadyRunning {
        /// PID of the existing process.
        pid: u32,
    },
}

impl StartOutcome {
    /// PID of the process now serving the service.
    #[must_use]
    pub const fn pid(self) -> u32 {
        match self {
            Self::Running { pid } | Self::AlreadyRunning { pid } => pid,
        }
    }
}

/// Result of a successful stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StopOutcome {
    /// The recorded process was terminated and its PID file removed.
    Stopped {
        /// PID that was terminated.
        pid: u32,
        /// Whether `SIGKILL` was needed.
        escalated: bool,
    },
    /// No live process was recorded.
    NotRunning {
        /// PID from a stale PID file that was cleaned up, if any.
        stale_pid: Option<u32>,
    },
}

/// Result of a restart: the stop half followed by the start half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RestartOutcome {
    /// Outcome of stopping the previous process.
    pub stop: StopOutcome,
    /// Outcome of starting the new process.
    pub start: StartOutcome,
}
