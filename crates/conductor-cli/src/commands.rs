//! Command handlers: each maps one CLI command onto the supervisor and
//! decides the process exit code.

use std::io::Write;
use std::process::ExitCode;

use conductor_config::Config;
use conductor_supervisor::logs::{self, LogFollower, LogStream};
use conductor_supervisor::{
    Orchestrator, ProcessController, ServiceRegistry, StartOutcome, StopOutcome,
};
use tracing::debug;

use crate::AppError;
use crate::cli::CliCommand;
use crate::output::{
    CommandOutput, ResolvedOutputFormat, StatusEntry, cycle_lines, escalation_warning,
    failure_line, registry_lines, start_line, status_line, stop_line,
};

/// Everything a command handler needs besides its output streams.
pub(crate) struct CommandContext<'a> {
    pub(crate) config: &'a Config,
    pub(crate) registry: &'a ServiceRegistry,
    pub(crate) controller: &'a ProcessController,
    pub(crate) format: ResolvedOutputFormat,
}

pub(crate) fn execute<W: Write, E: Write>(
    command: CliCommand,
    context: &CommandContext<'_>,
    output: &mut CommandOutput<W, E>,
) -> Result<ExitCode, AppError> {
    debug!(target: "conductor::cli", ?command, "executing command");
    match command {
        CliCommand::Start { service } => start(context, &service, output),
        CliCommand::Stop { service } => stop(context, &service, output),
        CliCommand::Restart { service } => restart(context, &service, output),
        CliCommand::Status { service: Some(service) } => status_one(context, &service, output),
        CliCommand::Status { service: None } => status_all(context, output),
        CliCommand::Logs {
            service,
            lines,
            follow,
            errors,
        } => {
            let stream = if errors {
                LogStream::Errors
            } else {
                LogStream::Main
            };
            show_logs(context, &service, LogRequest { stream, lines, follow }, output)
        }
        CliCommand::List => list(context, output),
        CliCommand::RestartAll => restart_all(context, output),
    }
}

fn start<W: Write, E: Write>(
    context: &CommandContext<'_>,
    name: &str,
    output: &mut CommandOutput<W, E>,
) -> Result<ExitCode, AppError> {
    let service = context.registry.get(name)?;
    let outcome = context.controller.start(service)?;
    output.stdout_line(format_args!(
        "{}",
        start_line(name, service.access_url().as_deref(), outcome)
    ))?;
    Ok(start_exit_code(outcome))
}

fn stop<W: Write, E: Write>(
    context: &CommandContext<'_>,
    name: &str,
    output: &mut CommandOutput<W, E>,
) -> Result<ExitCode, AppError> {
    let service = context.registry.get(name)?;
    let outcome = context.controller.stop(service)?;
    report_stop(name, outcome, output)?;
    Ok(match outcome {
        StopOutcome::Stopped { .. } => ExitCode::SUCCESS,
        StopOutcome::NotRunning { .. } => ExitCode::FAILURE,
    })
}

fn restart<W: Write, E: Write>(
    context: &CommandContext<'_>,
    name: &str,
    output: &mut CommandOutput<W, E>,
) -> Result<ExitCode, AppError> {
    let service = context.registry.get(name)?;
    let outcome = context.controller.restart(service)?;
    report_stop(name, outcome.stop, output)?;
    output.stdout_line(format_args!(
        "{}",
        start_line(name, service.access_url().as_deref(), outcome.start)
    ))?;
    Ok(start_exit_code(outcome.start))
}

fn report_stop<W: Write, E: Write>(
    name: &str,
    outcome: StopOutcome,
    output: &mut CommandOutput<W, E>,
) -> Result<(), AppError> {
    output.stdout_line(format_args!("{}", stop_line(name, outcome)))?;
    if let Some(warning) = escalation_warning(name, outcome) {
        output.stderr_line(format_args!("{warning}"))?;
    }
    Ok(())
}

const fn start_exit_code(outcome: StartOutcome) -> ExitCode {
    match outcome {
        StartOutcome::Running { .. } => ExitCode::SUCCESS,
        StartOutcome::AlreadyRunning { .. } => ExitCode::FAILURE,
    }
}

fn status_one<W: Write, E: Write>(
    context: &CommandContext<'_>,
    name: &str,
    output: &mut CommandOutput<W, E>,
) -> Result<ExitCode, AppError> {
    let service = context.registry.get(name)?;
    let status = context.controller.status(service)?;
    match context.format {
        ResolvedOutputFormat::Human => {
            output.stdout_line(format_args!("{}", status_line(service, &status)))?;
        }
        ResolvedOutputFormat::Json => output.json(&StatusEntry::new(service, Ok(&status)))?,
    }
    Ok(ExitCode::SUCCESS)
}

fn status_all<W: Write, E: Write>(
    context: &CommandContext<'_>,
    output: &mut CommandOutput<W, E>,
) -> Result<ExitCode, AppError> {
    let results: Vec<_> = context
        .registry
        .iter()
        .map(|service| (service, context.controller.status(service)))
        .collect();
    let all_reported = results.iter().all(|(_, result)| result.is_ok());

    match context.format {
        ResolvedOutputFormat::Human => {
            for (service, result) in &results {
                match result {
                    Ok(status) => {
                        output.stdout_line(format_args!("{}", status_line(service, status)))?;
                    }
                    Err(error) => {
                        output.stderr_line(format_args!(
                            "{}",
                            failure_line(service.name(), error)
                        ))?;
                    }
                }
            }
        }
        ResolvedOutputFormat::Json => {
            let entries: Vec<StatusEntry<'_>> = results
                .iter()
                .map(|(service, result)| {
                    StatusEntry::new(service, result.as_ref().map_err(ToString::to_string))
                })
                .collect();
            output.json(&entries)?;
        }
    }

    Ok(if all_reported {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// What `logs` should print.
#[derive(Debug, Clone, Copy)]
struct LogRequest {
    stream: LogStream,
    lines: usize,
    follow: bool,
}

fn show_logs<W: Write, E: Write>(
    context: &CommandContext<'_>,
    name: &str,
    request: LogRequest,
    output: &mut CommandOutput<W, E>,
) -> Result<ExitCode, AppError> {
    let service = context.registry.get(name)?;
    let path = logs::log_path(service, request.stream)?;
    output.stdout_lines(logs::tail(path, request.lines)?)?;
    if request.follow {
        let mut follower = LogFollower::from_end(path)?;
        follower.follow(&mut output.stdout, context.config.poll_interval())?;
    }
    Ok(ExitCode::SUCCESS)
}

fn list<W: Write, E: Write>(
    context: &CommandContext<'_>,
    output: &mut CommandOutput<W, E>,
) -> Result<ExitCode, AppError> {
    match context.format {
        ResolvedOutputFormat::Human => output.stdout_lines(registry_lines(context.registry))?,
        ResolvedOutputFormat::Json => output.json(context.registry)?,
    }
    Ok(ExitCode::SUCCESS)
}

fn restart_all<W: Write, E: Write>(
    context: &CommandContext<'_>,
    output: &mut CommandOutput<W, E>,
) -> Result<ExitCode, AppError> {
    let report =
        Orchestrator::new(context.controller, context.config.cycle_settle()).run(context.registry);
    match context.format {
        ResolvedOutputFormat::Human => output.stdout_lines(cycle_lines(&report))?,
        ResolvedOutputFormat::Json => output.json(&report)?,
    }
    Ok(ExitCode::from(report.exit_status()))
}
