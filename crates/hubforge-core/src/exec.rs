//! Process executor
//!
//! The single chokepoint every external command runs through. Commands
//! are invoked with an argument vector (no shell), stdout and stderr
//! are merged into one captured stream, and the logging contract is
//! deliberately asymmetric: successful runs log their transcript at
//! debug only (into the durable installer log), failed runs log the
//! full transcript at error so the operator sees it immediately.

use crate::error::{Error, Result};
use tracing::{debug, error};

/// An external command invocation: program, argument vector, optional
/// environment overrides and optional stdin bytes.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    input: Option<Vec<u8>>,
}

impl Cmd {
    /// Create a new command for the given program
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            input: None,
        }
    }

    /// Append a single argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Override an environment variable for the child only
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Pipe the given bytes to the child's stdin
    pub fn input(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.input = Some(bytes.into());
        self
    }

    /// Printable form for logs and error messages
    pub fn display(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }

    /// The program being invoked
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The argument vector
    pub fn args_ref(&self) -> &[String] {
        &self.args
    }

    /// Environment overrides, in insertion order
    pub fn env_ref(&self) -> &[(String, String)] {
        &self.env
    }

    /// Bytes destined for the child's stdin, if any
    pub fn input_ref(&self) -> Option<&[u8]> {
        self.input.as_deref()
    }
}

/// Trait seam for command execution.
///
/// Convergence operations hold a `&dyn CommandRunner` so tests can
/// substitute a recording fake; production code uses [`SystemRunner`].
pub trait CommandRunner {
    /// Run the command to completion, returning the merged
    /// stdout/stderr stream on success and
    /// [`Error::ProcessFailed`] on a non-zero exit.
    fn run(&self, cmd: &Cmd) -> Result<String>;
}

/// Command runner backed by real child processes
#[derive(Debug, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &Cmd) -> Result<String> {
        let mut expr = duct::cmd(cmd.program(), cmd.args_ref())
            .stderr_to_stdout()
            .stdout_capture()
            .unchecked();

        for (key, value) in &cmd.env {
            expr = expr.env(key, value);
        }
        if let Some(bytes) = &cmd.input {
            expr = expr.stdin_bytes(bytes.clone());
        }

        let printable = cmd.display();
        let output = expr.run()?;
        let captured = String::from_utf8_lossy(&output.stdout).into_owned();

        if output.status.success() {
            // Full transcript goes to the installer log only
            debug!("Ran `{}` with exit code 0", printable);
            debug!("{}", captured);
            Ok(captured)
        } else {
            let code = output.status.code().unwrap_or(-1);
            // Failed: show the transcript to the operator
            error!("Ran `{}` with exit code {}", printable, code);
            error!("{}", captured);
            Err(Error::process_failed(printable, code))
        }
    }
}
