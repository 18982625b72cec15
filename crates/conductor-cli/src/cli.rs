//! CLI argument definitions for the conductor binaries.

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

/// Default number of lines shown by `logs`.
pub(crate) const DEFAULT_LOG_LINES: usize = 50;

/// Command-line interface for the `conductor` binary.
#[derive(Parser, Debug)]
#[command(
    name = "conductor",
    about = "Starts, stops and inspects the supervised services",
    disable_help_subcommand = true
)]
pub(crate) struct Cli {
    /// Controls how status, list and restart reports are rendered.
    #[arg(long, value_enum, default_value_t = OutputFormat::Auto)]
    pub(crate) output: OutputFormat,
    /// The operation to perform.
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Operations exposed by `conductor`.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum CliCommand {
    /// Starts a service and waits for it to settle.
    Start {
        /// Service name (see `conductor list`).
        service: String,
    },
    /// Stops a service, escalating to SIGKILL after the grace period.
    Stop {
        /// Service name.
        service: String,
    },
    /// Stops and then starts a service.
    Restart {
        /// Service name.
        service: String,
    },
    /// Reports liveness, resource usage and health.
    Status {
        /// Service name; every service when omitted.
        service: Option<String>,
    },
    /// Prints the tail of a service log.
    Logs {
        /// Service name.
        service: String,
        /// Number of lines to print.
        #[arg(short = 'n', long = "lines", default_value_t = DEFAULT_LOG_LINES)]
        lines: usize,
        /// Keeps printing lines as they are appended.
        #[arg(short, long)]
        follow: bool,
        /// Reads the separate error log instead of the main log.
        #[arg(long)]
        errors: bool,
    },
    /// Lists the registered services.
    List,
    /// Stops every service, waits, then starts every service.
    RestartAll,
}

/// Command-line interface for the `conductor-restart-all` binary.
#[derive(Parser, Debug)]
#[command(
    name = "conductor-restart-all",
    about = "Restarts every supervised service"
)]
pub(crate) struct RestartAllCli {
    /// Controls how the restart report is rendered.
    #[arg(long, value_enum, default_value_t = OutputFormat::Auto)]
    pub(crate) output: OutputFormat,
}

impl From<RestartAllCli> for Cli {
    fn from(cli: RestartAllCli) -> Self {
        Self {
            output: cli.output,
            command: CliCommand::RestartAll,
        }
    }
}

/// The binary whose command line is being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Entrypoint {
    /// `conductor <COMMAND>`.
    Conductor,
    /// `conductor-restart-all`, which always runs the fleet cycle.
    RestartAll,
}

impl Entrypoint {
    pub(crate) fn parse<I, T>(self, args: I) -> Result<Cli, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        match self {
            Self::Conductor => Cli::try_parse_from(args),
            Self::RestartAll => RestartAllCli::try_parse_from(args).map(Cli::from),
        }
    }
}
