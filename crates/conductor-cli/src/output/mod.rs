//! Output selection and the stdout/stderr wrapper used by commands.
//!
//! Human output is plain text with one status glyph per line. JSON output
//! serialises the supervisor's report types unchanged so scripts can consume
//! them.

mod models;
mod render;

use std::fmt;
use std::io::Write;

use clap::ValueEnum;
use serde::Serialize;

use crate::AppError;

pub(crate) use models::StatusEntry;
pub(crate) use render::{
    cycle_lines, escalation_warning, failure_line, registry_lines, start_line, status_line,
    stop_line,
};

/// Output format selection for command reports.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Selects `human` for terminal output and `json` for redirected output.
    #[default]
    Auto,
    /// Always render human-readable output.
    Human,
    /// Always emit JSON documents.
    Json,
}

/// Output format after resolving `auto` based on TTY detection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResolvedOutputFormat {
    /// Human-readable lines.
    Human,
    /// JSON documents.
    Json,
}

impl OutputFormat {
    /// Resolves the output format based on whether stdout is a terminal.
    #[must_use]
    pub const fn resolve(self, stdout_is_terminal: bool) -> ResolvedOutputFormat {
        match self {
            Self::Auto => {
                if stdout_is_terminal {
                    ResolvedOutputFormat::Human
                } else {
                    ResolvedOutputFormat::Json
                }
            }
            Self::Human => ResolvedOutputFormat::Human,
            Self::Json => ResolvedOutputFormat::Json,
        }
    }
}

/// Borrowed output streams handed to command handlers.
pub(crate) struct CommandOutput<W: Write, E: Write> {
    pub(crate) stdout: W,
    pub(crate) stderr: E,
}

impl<W: Write, E: Write> CommandOutput<W, E> {
    pub(crate) const fn new(stdout: W, stderr: E) -> Self {
        Self { stdout, stderr }
    }

    pub(crate) fn stdout_line(&mut self, args: fmt::Arguments<'_>) -> Result<(), AppError> {
        self.stdout.write_fmt(args).map_err(AppError::Output)?;
        self.stdout.write_all(b"\n").map_err(AppError::Output)?;
        self.stdout.flush().map_err(AppError::Output)
    }

    pub(crate) fn stderr_line(&mut self, args: fmt::Arguments<'_>) -> Result<(), AppError> {
        self.stderr.write_fmt(args).map_err(AppError::Output)?;
        self.stderr.write_all(b"\n").map_err(AppError::Output)?;
        self.stderr.flush().map_err(AppError::Output)
    }

    pub(crate) fn stdout_lines<I>(&mut self, lines: I) -> Result<(), AppError>
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        for line in lines {
            self.stdout_line(format_args!("{line}"))?;
        }
        Ok(())
    }

    /// Writes `value` as one pretty-printed JSON document.
    pub(crate) fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), AppError> {
        serde_json::to_writer_pretty(&mut self.stdout, value).map_err(AppError::Serialise)?;
        self.stdout.write_all(b"\n").map_err(AppError::Output)?;
        self.stdout.flush().map_err(AppError::Output)
    }
}
