//! Behavioural tests covering service supervision end to end.

use std::cell::RefCell;
use std::thread;
use std::time::Duration;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

use crate::error::ControlError;
use crate::lifecycle::{ProcessController, StartOutcome, StopOutcome};
use crate::orchestrator::{CycleReport, Orchestrator};
use crate::pid_file::{PidEntry, PidFile};
use crate::registry::{ServiceDescriptor, ServiceRegistry};
use crate::status::ServiceStatus;
use crate::tests::support::{long_running, test_policy};

type StepResult = Result<(), String>;

struct LifecycleWorld {
    dir: TempDir,
    controller: ProcessController,
    services: Vec<ServiceDescriptor>,
    last_start: Option<Result<StartOutcome, ControlError>>,
    last_stop: Option<Result<StopOutcome, ControlError>>,
    first_pid: Option<u32>,
    cycle: Option<CycleReport>,
}

impl LifecycleWorld {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
            controller: ProcessController::new(Default::default(), test_policy()),
            services: Vec::new(),
            last_start: None,
            last_stop: None,
            first_pid: None,
            cycle: None,
        }
    }

    fn service(&self, name: &str) -> Result<&ServiceDescriptor, String> {
        self.services
            .iter()
            .find(|service| service.name() == name)
            .ok_or_else(|| format!("no service named {name}"))
    }

    fn recorded_pid(&self, name: &str) -> Result<Option<u32>, String> {
        let service = self.service(name)?;
        match PidFile::new(service.pid_file())
            .read()
            .map_err(|error| error.to_string())?
        {
            PidEntry::Recorded(record) => Ok(Some(record.pid)),
            _ => Ok(None),
        }
    }
}

impl Drop for LifecycleWorld {
    fn drop(&mut self) {
        for service in &self.services {
            if let Err(error) = self.controller.stop(service) {
                eprintln!("cleanup of {} failed: {error}", service.name());
            }
        }
    }
}

#[fixture]
fn world() -> RefCell<LifecycleWorld> {
    RefCell::new(LifecycleWorld::new())
}

#[given("a project with a long-running service named alpha")]
fn given_alpha(world: &RefCell<LifecycleWorld>) {
    let mut world = world.borrow_mut();
    let alpha = long_running(world.dir.path(), "alpha");
    world.services.push(alpha);
}

#[given("a service named beta whose executable is missing")]
fn given_missing_beta(world: &RefCell<LifecycleWorld>) {
    let mut world = world.borrow_mut();
    let beta = ServiceDescriptor::new("beta", "beta.sh", world.dir.path()).with_launcher("sh");
    world.services.push(beta);
}

#[when("alpha is started")]
fn when_alpha_started(world: &RefCell<LifecycleWorld>) -> StepResult {
    let mut world = world.borrow_mut();
    let outcome = world.controller.start(world.service("alpha")?);
    if let Ok(started) = &outcome {
        world.first_pid = Some(started.pid());
    }
    world.last_start = Some(outcome);
    Ok(())
}

#[when("alpha is started again")]
fn when_alpha_started_again(world: &RefCell<LifecycleWorld>) -> StepResult {
    let mut world = world.borrow_mut();
    let outcome = world.controller.start(world.service("alpha")?);
    world.last_start = Some(outcome);
    Ok(())
}

#[when("the alpha process is killed from outside")]
fn when_alpha_killed(world: &RefCell<LifecycleWorld>) -> StepResult {
    let pid = world
        .borrow()
        .first_pid
        .ok_or("alpha was never started")?;
    let raw = i32::try_from(pid).map_err(|error| error.to_string())?;
    kill(Pid::from_raw(raw), Signal::SIGKILL).map_err(|error| error.to_string())?;
    thread::sleep(Duration::from_millis(100));
    Ok(())
}

#[when("alpha is stopped")]
fn when_alpha_stopped(world: &RefCell<LifecycleWorld>) -> StepResult {
    let mut world = world.borrow_mut();
    let outcome = world.controller.stop(world.service("alpha")?);
    world.last_stop = Some(outcome);
    Ok(())
}

#[when("every service is restarted")]
fn when_cycle_runs(world: &RefCell<LifecycleWorld>) -> StepResult {
    let mut world = world.borrow_mut();
    let registry =
        ServiceRegistry::new(world.services.clone()).map_err(|error| error.to_string())?;
    let report = Orchestrator::new(&world.controller, Duration::from_millis(50)).run(&registry);
    if let Some(alpha) = report
        .started
        .iter()
        .find(|phase| phase.service == "alpha")
        && let Ok(started) = &alpha.result
    {
        world.first_pid = Some(started.pid());
    }
    world.cycle = Some(report);
    Ok(())
}

#[then("alpha is running under the recorded pid")]
fn then_alpha_running(world: &RefCell<LifecycleWorld>) -> StepResult {
    let world = world.borrow();
    let expected = world.first_pid.ok_or("alpha has no pid")?;
    assert_eq!(world.recorded_pid("alpha")?, Some(expected));
    let status = world
        .controller
        .status(world.service("alpha")?)
        .map_err(|error| error.to_string())?;
    assert_eq!(status.process().map(|process| process.pid), Some(expected));
    Ok(())
}

#[then("the start reports the existing pid")]
fn then_start_reports_existing(world: &RefCell<LifecycleWorld>) {
    let world = world.borrow();
    let outcome = world.last_start.as_ref().expect("start attempted");
    let expected = world.first_pid.expect("first pid");
    assert!(
        matches!(outcome, Ok(StartOutcome::AlreadyRunning { pid }) if *pid == expected),
        "unexpected outcome {outcome:?}"
    );
}

#[then("alpha is reported stopped and its pid file is gone")]
fn then_alpha_reconciled(world: &RefCell<LifecycleWorld>) -> StepResult {
    let world = world.borrow();
    let alpha = world.service("alpha")?;
    let status = world
        .controller
        .status(alpha)
        .map_err(|error| error.to_string())?;
    assert_eq!(
        status,
        ServiceStatus::Stopped {
            reconciled_pid: world.first_pid
        }
    );
    assert!(!alpha.pid_file().exists());
    Ok(())
}

#[then("the stop reports alpha was not running")]
fn then_stop_not_running(world: &RefCell<LifecycleWorld>) {
    let world = world.borrow();
    let outcome = world.last_stop.as_ref().expect("stop attempted");
    assert!(
        matches!(outcome, Ok(StopOutcome::NotRunning { stale_pid: None })),
        "unexpected outcome {outcome:?}"
    );
}

#[then("the cycle reports beta as failed")]
fn then_beta_failed(world: &RefCell<LifecycleWorld>) {
    let world = world.borrow();
    let report = world.cycle.as_ref().expect("cycle ran");
    assert_eq!(report.failed_services(), vec!["beta"]);
}

#[then("the cycle exit status is 1")]
fn then_cycle_exit_status(world: &RefCell<LifecycleWorld>) {
    let world = world.borrow();
    let report = world.cycle.as_ref().expect("cycle ran");
    assert_eq!(report.exit_status(), 1);
}

#[scenario(
    path = "tests/features/service_lifecycle.feature",
    name = "A service is started, found running, killed and reconciled"
)]
fn service_lifecycle(world: RefCell<LifecycleWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/service_lifecycle.feature",
    name = "A restart cycle isolates a service that cannot start"
)]
fn restart_cycle(world: RefCell<LifecycleWorld>) {
    drop(world);
}
