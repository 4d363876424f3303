//! External process invocation.
//!
//! Every call-out (orchestrator, container runtime, proxy) goes through
//! [`run_captured`] so commands and their output are logged the same way.
//! Child processes inherit the daemon's environment. No timeouts: a call
//! blocks until the child exits.

use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;

/// Result of a finished child process.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut combined = String::with_capacity(self.stdout.len() + self.stderr.len());
        combined.push_str(&self.stdout);
        combined.push_str(&self.stderr);
        combined
    }
}

/// Run `program` with `args` to completion, capturing both streams.
pub async fn run_captured<I, S>(program: &str, args: I) -> std::io::Result<CapturedOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<S> = args.into_iter().collect();
    tracing::debug!(
        program = %program,
        args = ?args.iter().map(|a| a.as_ref().to_string_lossy().into_owned()).collect::<Vec<_>>(),
        "run"
    );

    let output = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .output()
        .await?;

    let captured = CapturedOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    tracing::debug!(
        program = %program,
        status = %captured.status,
        output = %escape_output(&captured.combined()),
        "command output"
    );

    Ok(captured)
}

/// Escape newlines and tabs so multi-line output stays on one log line.
pub fn escape_output(output: &str) -> String {
    output.replace('\n', "\\n").replace('\t', "\\t")
}
