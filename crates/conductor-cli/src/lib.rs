//! Command-line runtime for the conductor process supervisor.
//!
//! The module owns argument parsing, configuration bootstrapping, telemetry
//! installation and output rendering. Both binaries delegate here so the
//! runtime can be exercised from tests with substituted configuration and IO
//! streams.

use std::ffi::OsString;
use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;

use conductor_config::{Config, Settings};
use conductor_supervisor::{LifecyclePolicy, ProcessController, ServiceRegistry, telemetry};

mod cli;
mod commands;
mod config;
mod errors;
pub mod output;

use cli::Entrypoint;
use commands::CommandContext;
use config::{ConfigArgumentSplit, split_config_arguments};
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub(crate) use errors::AppError;
use output::CommandOutput;
pub use output::{OutputFormat, ResolvedOutputFormat};

/// CLI flags recognised by the configuration loader.
///
/// MAINTENANCE: This list must be kept in sync with the fields of
/// `conductor_config::Config`.
const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--project-root",
    "--settings-file",
    "--interpreter",
    "--log-filter",
    "--log-format",
    "--settle-ms",
    "--stop-timeout-ms",
    "--poll-interval-ms",
    "--restart-pause-ms",
    "--cycle-settle-ms",
    "--probe-timeout-ms",
];

/// Bundles the IO streams provided to the CLI runtime.
pub(crate) struct IoStreams<'a, W: Write, E: Write> {
    pub(crate) stdout: &'a mut W,
    pub(crate) stderr: &'a mut E,
    stdout_is_terminal: bool,
}

impl<'a, W: Write, E: Write> IoStreams<'a, W, E> {
    pub(crate) fn new(stdout: &'a mut W, stderr: &'a mut E) -> Self {
        Self {
            stdout,
            stderr,
            stdout_is_terminal: io::stdout().is_terminal(),
        }
    }

    #[cfg(test)]
    pub(crate) const fn with_terminal_status(
        stdout: &'a mut W,
        stderr: &'a mut E,
        stdout_is_terminal: bool,
    ) -> Self {
        Self {
            stdout,
            stderr,
            stdout_is_terminal,
        }
    }

    pub(crate) const fn stdout_is_terminal(&self) -> bool {
        self.stdout_is_terminal
    }
}

struct CliRunner<'a, 'io, W: Write, E: Write, L: ConfigLoader> {
    io: &'a mut IoStreams<'io, W, E>,
    loader: &'a L,
}

impl<'a, 'io, W, E, L> CliRunner<'a, 'io, W, E, L>
where
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    const fn new(io: &'a mut IoStreams<'io, W, E>, loader: &'a L) -> Self {
        Self { io, loader }
    }

    fn run<I>(&mut self, entrypoint: Entrypoint, args: I) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
    {
        let args: Vec<OsString> = args.into_iter().collect();
        let split = split_config_arguments(&args);
        let cli_arguments = prepare_cli_arguments(&args, &split);

        let result = entrypoint
            .parse(cli_arguments)
            .map_err(AppError::CliUsage)
            .and_then(|cli| {
                self.loader
                    .load(&split.config_arguments)
                    .map(|config| (cli, config))
            })
            .and_then(|(cli, config)| self.execute(cli, &config));

        match result {
            Ok(exit_code) => exit_code,
            Err(AppError::CliUsage(error)) if !error.use_stderr() => {
                let _ = write!(self.io.stdout, "{}", error.render());
                ExitCode::SUCCESS
            }
            Err(error) => {
                let _ = writeln!(self.io.stderr, "{error}");
                ExitCode::FAILURE
            }
        }
    }

    fn execute(&mut self, cli: cli::Cli, config: &Config) -> Result<ExitCode, AppError> {
        telemetry::initialise(config)?;
        let settings = Settings::load(&config.settings_path())?;
        let registry = ServiceRegistry::builtin(config, &settings);
        let controller = ProcessController::system(LifecyclePolicy::from_config(config));
        let context = CommandContext {
            config,
            registry: &registry,
            controller: &controller,
            format: cli.output.resolve(self.io.stdout_is_terminal()),
        };
        let mut output = CommandOutput::new(&mut *self.io.stdout, &mut *self.io.stderr);
        commands::execute(cli.command, &context, &mut output)
    }
}

/// Runs `conductor` using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let mut io = IoStreams::new(stdout, stderr);
    run_with_loader(Entrypoint::Conductor, args, &mut io, &OrthoConfigLoader)
}

/// Runs `conductor-restart-all` using the provided arguments and IO handles.
#[must_use]
pub fn run_restart_all<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let mut io = IoStreams::new(stdout, stderr);
    run_with_loader(Entrypoint::RestartAll, args, &mut io, &OrthoConfigLoader)
}

/// Runs either binary with a custom configuration loader.
pub(crate) fn run_with_loader<I, W, E, L>(
    entrypoint: Entrypoint,
    args: I,
    io: &mut IoStreams<'_, W, E>,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    CliRunner::new(io, loader).run(entrypoint, args)
}

fn prepare_cli_arguments(args: &[OsString], split: &ConfigArgumentSplit) -> Vec<OsString> {
    let mut cli_arguments: Vec<OsString> = args.first().cloned().into_iter().collect();
    cli_arguments.extend(args.iter().skip(split.command_start).cloned());
    cli_arguments
}

#[cfg(test)]
mod tests;
