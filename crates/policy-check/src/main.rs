//! CLI entrypoint for running policy analyzers over a stack.
//!
//! The binary delegates to [`policy_check::run`], which loads configuration,
//! launches the configured analyzer plugins, and writes the report as JSONL.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    policy_check::run(std::env::args_os(), &mut stdout, &mut stderr)
}
