//! Process supervision for the conductor fleet.
//!
//! The crate owns everything that touches the managed services: the static
//! service registry, PID-file bookkeeping, the per-service lifecycle
//! controller, status and health reporting, log viewing, and the fleet-wide
//! restart orchestrator. It never introspects a service beyond its PID,
//! process-table entry, log files, and optional health endpoint.
//!
//! All operations are synchronous and block the caller while they poll.

mod error;
pub mod lifecycle;
pub mod logs;
pub mod orchestrator;
mod pid_file;
pub mod probe;
pub mod process;
pub mod registry;
pub mod status;
pub mod telemetry;

pub use error::ControlError;
pub use lifecycle::{
    LifecyclePolicy, ProcessController, RestartOutcome, ShutdownPolicy, StartOutcome, StopOutcome,
};
pub use logs::{LogError, LogFollower, LogStream};
pub use orchestrator::{CycleReport, Orchestrator, PhaseResult, ServiceControl};
pub use pid_file::{PidEntry, PidFile, PidLock, PidRecord};
pub use probe::ProbeError;
pub use process::{ProcessTable, ResourceUsage, SystemProcessTable, Termination};
pub use registry::{RegistryError, ServiceDescriptor, ServiceRegistry};
pub use status::{ProcessSnapshot, ServiceStatus};

/// Tracing target for process lifecycle events.
pub(crate) const PROCESS_TARGET: &str = "conductor::process";
/// Tracing target for fleet orchestration events.
pub(crate) const ORCHESTRATOR_TARGET: &str = "conductor::orchestrator";

#[cfg(test)]
mod tests;
