//! CLI entrypoint for the conductor process supervisor.
//!
//! The binary delegates to [`conductor_cli::run`], which loads configuration,
//! parses the command and drives the supervisor.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    conductor_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
