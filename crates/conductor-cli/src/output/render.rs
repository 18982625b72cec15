//! Human-readable rendering of supervisor results.

use conductor_supervisor::{
    ControlError, CycleReport, ProcessSnapshot, ServiceDescriptor, ServiceRegistry,
    ServiceStatus, StartOutcome, StopOutcome,
};

const OK: &str = "✓";
const FAILED: &str = "✗";
const WARNING: &str = "⚠";
const IDLE: &str = "○";
const RUNNING: &str = "●";
const DEGRADED: &str = "▲";

/// Line reporting a start outcome, with the access URL when known.
pub(crate) fn start_line(service: &str, access_url: Option<&str>, outcome: StartOutcome) -> String {
    match outcome {
        StartOutcome::Running { pid } => {
            with_url(format!("{OK} {service} started (PID {pid})"), access_url)
        }
        StartOutcome::AlreadyRunning { pid } => {
            with_url(format!("{IDLE} {service} is already running (PID {pid})"), access_url)
        }
    }
}

/// Line reporting a stop outcome.
pub(crate) fn stop_line(service: &str, outcome: StopOutcome) -> String {
    match outcome {
        StopOutcome::Stopped {
            pid,
            escalated: false,
        } => format!("{OK} {service} stopped (PID {pid})"),
        StopOutcome::Stopped {
            pid,
            escalated: true,
        } => format!("{WARNING} {service} killed after ignoring SIGTERM (PID {pid})"),
        StopOutcome::NotRunning { stale_pid: None } => format!("{IDLE} {service} is not running"),
        StopOutcome::NotRunning {
            stale_pid: Some(pid),
        } => format!("{IDLE} {service} is not running (removed stale PID file for {pid})"),
    }
}

/// Warning emitted on stderr when a stop needed `SIGKILL`.
pub(crate) fn escalation_warning(service: &str, outcome: StopOutcome) -> Option<String> {
    match outcome {
        StopOutcome::Stopped {
            pid,
            escalated: true,
        } => Some(format!(
            "warning: {service} (PID {pid}) did not exit after SIGTERM and was force-killed"
        )),
        _ => None,
    }
}

/// Line reporting a failed operation.
///
/// Errors that already name the service are not prefixed a second time.
pub(crate) fn failure_line(service: &str, error: &ControlError) -> String {
    let message = error.to_string();
    let detail = message
        .strip_prefix(service)
        .and_then(|rest| rest.strip_prefix(": "))
        .unwrap_or(&message);
    format!("{FAILED} {service}: {detail}")
}

/// Line describing one service's status.
pub(crate) fn status_line(service: &ServiceDescriptor, status: &ServiceStatus) -> String {
    let name = service.name();
    match status {
        ServiceStatus::Stopped {
            reconciled_pid: None,
        } => format!("{IDLE} {name}: stopped"),
        ServiceStatus::Stopped {
            reconciled_pid: Some(pid),
        } => format!("{IDLE} {name}: stopped (removed stale PID file for {pid})"),
        ServiceStatus::Running { process } => with_url(
            format!("{RUNNING} {name}: running ({})", describe_process(process)),
            service.access_url().as_deref(),
        ),
        ServiceStatus::Degraded {
            process,
            probe_error,
        } => with_url(
            format!(
                "{DEGRADED} {name}: degraded ({}); health check failed: {probe_error}",
                describe_process(process)
            ),
            service.access_url().as_deref(),
        ),
    }
}

fn describe_process(process: &ProcessSnapshot) -> String {
    let mut details = vec![format!("PID {}", process.pid)];
    if let Some(memory) = process.memory_mib() {
        details.push(format!("{memory:.1} MiB"));
    }
    if let Some(cpu) = process.cpu_percent {
        details.push(format!("{cpu:.1}% CPU"));
    }
    if let Some(started) = process.started_at_rfc3339() {
        details.push(format!("since {started}"));
    }
    details.join(", ")
}

/// Lines summarising a restart cycle.
pub(crate) fn cycle_lines(report: &CycleReport) -> Vec<String> {
    let mut lines = vec![String::from("Stopping services")];
    lines.extend(report.stopped.iter().map(|phase| {
        let line = match &phase.result {
            Ok(outcome) => stop_line(&phase.service, *outcome),
            Err(error) => failure_line(&phase.service, error),
        };
        format!("  {line}")
    }));

    lines.push(String::from("Starting services"));
    lines.extend(report.started.iter().map(|phase| {
        let line = match &phase.result {
            Ok(outcome) => start_line(&phase.service, phase.access_url.as_deref(), *outcome),
            Err(error) => failure_line(&phase.service, error),
        };
        format!("  {line}")
    }));

    let total = report.started.len();
    let failed = report.failed_services();
    if failed.is_empty() {
        lines.push(format!("All {total} services started"));
    } else {
        lines.push(format!(
            "{} of {total} services started; failed: {}",
            total - failed.len(),
            failed.join(", ")
        ));
    }
    lines
}

/// Lines listing the registry.
pub(crate) fn registry_lines(registry: &ServiceRegistry) -> Vec<String> {
    let width = registry
        .iter()
        .map(|service| service.name().len())
        .max()
        .unwrap_or_default();
    registry
        .iter()
        .map(|service| {
            let logs = match service.stderr_log() {
                Some(errors) => format!(
                    "log: {}, errors: {}",
                    service.stdout_log().display(),
                    errors.display()
                ),
                None => format!("log: {}", service.stdout_log().display()),
            };
            let line = format!(
                "{:width$}  {}  ({logs})",
                service.name(),
                service.command_line()
            );
            with_url(line, service.access_url().as_deref())
        })
        .collect()
}

fn with_url(line: String, url: Option<&str>) -> String {
    match url {
        Some(url) => format!("{line}  {url}"),
        None => line,
    }
}
