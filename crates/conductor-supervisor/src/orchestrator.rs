//! Fleet-wide restart: stop every service, settle, start every service.
//!
//! Each phase visits every service in registry order regardless of earlier
//! failures. The cycle succeeds only when every service ends up freshly
//! started.

use std::thread;
use std::time::Duration;

use serde::Serialize;
use serde::ser::SerializeStruct;
use tracing::{info, warn};

use crate::ORCHESTRATOR_TARGET;
use crate::error::ControlError;
use crate::lifecycle::{ProcessController, StartOutcome, StopOutcome};
use crate::process::ProcessTable;
use crate::registry::{ServiceDescriptor, ServiceRegistry};

/// Lifecycle operations the orchestrator drives.
#[cfg_attr(test, mockall::automock)]
pub trait ServiceControl {
    /// Stops one service.
    ///
    /// # Errors
    ///
    /// Returns the underlying lifecycle failure.
    fn stop(&self, service: &ServiceDescriptor) -> Result<StopOutcome, ControlError>;

    /// Starts one service.
    ///
    /// # Errors
    ///
    /// Returns the underlying lifecycle failure.
    fn start(&self, service: &ServiceDescriptor) -> Result<StartOutcome, ControlError>;
}

impl<C: ServiceControl + ?Sized> ServiceControl for &C {
    fn stop(&self, service: &ServiceDescriptor) -> Result<StopOutcome, ControlError> {
        (**self).stop(service)
    }

    fn start(&self, service: &ServiceDescriptor) -> Result<StartOutcome, ControlError> {
        (**self).start(service)
    }
}

impl<T: ProcessTable> ServiceControl for ProcessController<T> {
    fn stop(&self, service: &ServiceDescriptor) -> Result<StopOutcome, ControlError> {
        Self::stop(self, service)
    }

    fn start(&self, service: &ServiceDescriptor) -> Result<StartOutcome, ControlError> {
        Self::start(self, service)
    }
}

/// Outcome of one phase for one service.
#[derive(Debug)]
pub struct PhaseResult<T> {
    /// Service name.
    pub service: String,
    /// Operator-facing URL, for services with a port.
    pub access_url: Option<String>,
    /// What happened.
    pub result: Result<T, ControlError>,
}

impl<T> PhaseResult<T> {
    fn new(service: &ServiceDescriptor, result: Result<T, ControlError>) -> Self {
        Self {
            service: service.name().to_owned(),
            access_url: service.access_url(),
            result,
        }
    }
}

impl<T: Serialize> Serialize for PhaseResult<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PhaseResult", 3)?;
        state.serialize_field("service", &self.service)?;
        state.serialize_field("access_url", &self.access_url)?;
        match &self.result {
            Ok(outcome) => state.serialize_field("result", outcome)?,
            Err(error) => state.serialize_field("error", &error.to_string())?,
        }
        state.end()
    }
}

/// Everything that happened during one cycle.
#[derive(Debug, Serialize)]
pub struct CycleReport {
    /// Stop-phase results in registry order.
    pub stopped: Vec<PhaseResult<StopOutcome>>,
    /// Start-phase results in registry order.
    pub started: Vec<PhaseResult<StartOutcome>>,
}

impl CycleReport {
    /// Whether every service was freshly started.
    ///
    /// A service found already running during the start phase survived its
    /// stop and therefore counts as a failure.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.started
            .iter()
            .all(|phase| matches!(phase.result, Ok(StartOutcome::Running { .. })))
    }

    /// Process exit status for the cycle: 0 on success, 1 otherwise.
    #[must_use]
    pub fn exit_status(&self) -> u8 {
        u8::from(!self.succeeded())
    }

    /// Services that were not freshly started.
    #[must_use]
    pub fn failed_services(&self) -> Vec<&str> {
        self.started
            .iter()
            .filter(|phase| !matches!(phase.result, Ok(StartOutcome::Running { .. })))
            .map(|phase| phase.service.as_str())
            .collect()
    }
}

/// Runs stop-all, settle, start-all over a registry.
#[derive(Debug)]
pub struct Orchestrator<C> {
    control: C,
    settle: Duration,
}

impl<C: ServiceControl> Orchestrator<C> {
    /// Creates an orchestrator that pauses `settle` between phases.
    #[must_use]
    pub const fn new(control: C, settle: Duration) -> Self {
        Self { control, settle }
    }

    /// Runs one full cycle. Individual failures are recorded, never raised.
    pub fn run(&self, registry: &ServiceRegistry) -> CycleReport {
        info!(
            target: ORCHESTRATOR_TARGET,
            services = registry.len(),
            "stopping all services"
        );
        let stopped = registry
            .iter()
            .map(|service| {
                let result = self.control.stop(service);
                log_phase("stop", service, result.as_ref().err());
                PhaseResult::new(service, result)
            })
            .collect();

        thread::sleep(self.settle);

        info!(target: ORCHESTRATOR_TARGET, "starting all services");
        let started = registry
            .iter()
            .map(|service| {
                let result = self.control.start(service);
                log_phase("start", service, result.as_ref().err());
                PhaseResult::new(service, result)
            })
            .collect();

        let report = CycleReport { stopped, started };
        if report.succeeded() {
            info!(target: ORCHESTRATOR_TARGET, "all services restarted");
        } else {
            warn!(
                target: ORCHESTRATOR_TARGET,
                failed = ?report.failed_services(),
                "restart cycle incomplete"
            );
        }
        report
    }
}

fn log_phase(phase: &str, service: &ServiceDescriptor, error: Option<&ControlError>) {
    match error {
        None => info!(
            target: ORCHESTRATOR_TARGET,
            phase,
            service = service.name(),
            "phase complete"
        ),
        Some(error) => warn!(
            target: ORCHESTRATOR_TARGET,
            phase,
            service = service.name(),
            error = %error,
            "phase failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use mockall::Sequence;
    use mockall::predicate::function;

    fn registry() -> ServiceRegistry {
        ServiceRegistry::new(vec![
            ServiceDescriptor::new("a", "a.sh", "/work"),
            ServiceDescriptor::new("b", "b.sh", "/work").with_port(Some(8080)),
            ServiceDescriptor::new("c", "c.sh", "/work"),
        ])
        .expect("registry")
    }

    fn missing(name: &str) -> ControlError {
        ControlError::ExecutableMissing {
            service: name.to_owned(),
            path: PathBuf::from(format!("/work/{name}.sh")),
        }
    }

    fn named(expected: &'static str) -> impl Fn(&ServiceDescriptor) -> bool {
        move |service| service.name() == expected
    }

    #[test]
    fn stop_phase_completes_before_start_phase_in_registry_order() {
        let mut control = MockServiceControl::new();
        let mut sequence = Sequence::new();
        for name in ["a", "b", "c"] {
            control
                .expect_stop()
                .with(function(named(name)))
                .times(1)
                .in_sequence(&mut sequence)
                .returning(|_| Ok(StopOutcome::NotRunning { stale_pid: None }));
        }
        for (pid, name) in [(11, "a"), (12, "b"), (13, "c")] {
            control
                .expect_start()
                .with(function(named(name)))
                .times(1)
                .in_sequence(&mut sequence)
                .returning(move |_| Ok(StartOutcome::Running { pid }));
        }

        let report = Orchestrator::new(control, Duration::ZERO).run(&registry());

        assert!(report.succeeded());
        assert_eq!(report.exit_status(), 0);
        assert_eq!(
            report.started.get(1).and_then(|phase| phase.access_url.as_deref()),
            Some("http://localhost:8080")
        );
    }

    #[test]
    fn one_failing_start_does_not_block_the_others() {
        let mut control = MockServiceControl::new();
        control
            .expect_stop()
            .times(3)
            .returning(|_| Ok(StopOutcome::NotRunning { stale_pid: None }));
        control
            .expect_start()
            .with(function(named("b")))
            .times(1)
            .returning(|_| Err(missing("b")));
        control
            .expect_start()
            .times(2)
            .returning(|_| Ok(StartOutcome::Running { pid: 7 }));

        let report = Orchestrator::new(control, Duration::ZERO).run(&registry());

        assert!(!report.succeeded());
        assert_eq!(report.exit_status(), 1);
        assert_eq!(report.failed_services(), vec!["b"]);
        assert_eq!(report.started.len(), 3);
    }

    #[test]
    fn stop_failures_are_recorded_and_start_still_runs() {
        let mut control = MockServiceControl::new();
        let mut sequence = Sequence::new();
        control
            .expect_stop()
            .with(function(named("a")))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| {
                Err(ControlError::ShutdownTimeout {
                    service: String::from("a"),
                    pid: 9,
                    waited: Duration::from_secs(5),
                    pid_file: PathBuf::from("/work/logs/a.pid"),
                })
            });
        for (pid, name) in [(1, "b"), (2, "c")] {
            control
                .expect_stop()
                .with(function(named(name)))
                .times(1)
                .in_sequence(&mut sequence)
                .returning(move |_| Ok(StopOutcome::Stopped { pid, escalated: false }));
        }
        control
            .expect_start()
            .with(function(named("a")))
            .times(1)
            .returning(|_| Ok(StartOutcome::AlreadyRunning { pid: 9 }));
        control
            .expect_start()
            .times(2)
            .returning(|_| Ok(StartOutcome::Running { pid: 2 }));

        let report = Orchestrator::new(control, Duration::ZERO).run(&registry());

        assert_eq!(report.stopped.len(), 3);
        assert!(report.stopped.first().is_some_and(|phase| phase.result.is_err()));
        assert!(
            report
                .stopped
                .iter()
                .skip(1)
                .all(|phase| matches!(phase.result, Ok(StopOutcome::Stopped { .. })))
        );
        assert_eq!(report.failed_services(), vec!["a"]);
    }

    #[test]
    fn report_serialises_errors_as_messages() {
        let report = CycleReport {
            stopped: Vec::new(),
            started: vec![PhaseResult {
                service: String::from("b"),
                access_url: None,
                result: Err(missing("b")),
            }],
        };
        let value = serde_json::to_value(&report).expect("serialise");
        assert_eq!(
            value["started"][0]["error"],
            "b: executable '/work/b.sh' is not available"
        );
    }
}
