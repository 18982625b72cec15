//! Restarts every supervised service: stop all, settle, start all.
//!
//! Accepts the configuration flags and `--output`; there is no subcommand.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    conductor_cli::run_restart_all(std::env::args_os(), &mut stdout, &mut stderr)
}
