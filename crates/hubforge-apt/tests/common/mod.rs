//! Shared test helpers: a recording command runner with scripted
//! responses, substituted for the real executor.

use hubforge_core::{Cmd, CommandRunner, Error, Result};
use std::cell::RefCell;

/// Scripted response for a matching command
pub enum Response {
    /// Succeed with the given captured output
    Output(String),
    /// Fail with the given exit code
    Fail(i32),
}

/// Command runner that records every invocation and answers from
/// substring-matched rules; unmatched commands succeed with empty
/// output.
#[derive(Default)]
pub struct FakeRunner {
    calls: RefCell<Vec<Cmd>>,
    rules: Vec<(String, Response)>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands whose printable form contains `needle`
    #[allow(dead_code)]
    pub fn on(mut self, needle: &str, response: Response) -> Self {
        self.rules.push((needle.to_string(), response));
        self
    }

    /// Printable forms of every command run so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.calls.borrow().iter().map(Cmd::display).collect()
    }

    /// The recorded invocations themselves
    pub fn calls(&self) -> Vec<Cmd> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, cmd: &Cmd) -> Result<String> {
        self.calls.borrow_mut().push(cmd.clone());
        let display = cmd.display();
        for (needle, response) in &self.rules {
            if display.contains(needle.as_str()) {
                return match response {
                    Response::Output(output) => Ok(output.clone()),
                    Response::Fail(code) => Err(Error::process_failed(display, *code)),
                };
            }
        }
        Ok(String::new())
    }
}
