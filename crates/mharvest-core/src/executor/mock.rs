//! Scripted executor for testing collectors without real diagnostic tools.
//!
//! Responses are keyed by the full command line (`program arg1 arg2`).
//! Unknown command lines fail as if the program were not installed.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{CommandExecutor, ExecError, command_line};
use crate::probe::CommandSpec;

/// How a scripted command fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    NotFound,
    NonZeroExit(i32),
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResponse {
    Output(String),
    Fail(MockFailure),
    /// Answers after a delay. A delay longer than the caller's deadline
    /// turns into a timeout at the deadline.
    Delayed(Duration, Box<MockResponse>),
}

/// In-memory command executor.
#[derive(Debug, Default)]
pub struct MockExecutor {
    responses: HashMap<String, MockResponse>,
    calls: Mutex<Vec<String>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts stdout for a command.
    pub fn add_output(&mut self, command: &CommandSpec, stdout: impl Into<String>) {
        self.add_response(command, MockResponse::Output(stdout.into()));
    }

    pub fn add_failure(&mut self, command: &CommandSpec, failure: MockFailure) {
        self.add_response(command, MockResponse::Fail(failure));
    }

    pub fn add_response(&mut self, command: &CommandSpec, response: MockResponse) {
        self.responses.insert(command.to_string(), response);
    }

    /// Removes a scripted command so it fails as missing.
    pub fn remove(&mut self, command: &CommandSpec) {
        self.responses.remove(&command.to_string());
    }

    pub fn is_scripted(&self, command: &CommandSpec) -> bool {
        self.responses.contains_key(&command.to_string())
    }

    /// Every command line executed so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self, command: &CommandSpec) -> usize {
        let line = command.to_string();
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| **c == line)
            .count()
    }
}

fn fail(failure: MockFailure, program: &str, line: &str, deadline: Duration) -> ExecError {
    match failure {
        MockFailure::NotFound => ExecError::NotFound {
            program: program.to_string(),
        },
        MockFailure::NonZeroExit(code) => ExecError::NonZeroExit {
            command: line.to_string(),
            code,
            stderr: String::new(),
        },
        MockFailure::Timeout => ExecError::Timeout {
            command: line.to_string(),
            timeout: deadline,
        },
    }
}

#[async_trait]
impl CommandExecutor for MockExecutor {
    async fn execute(
        &self,
        deadline: Duration,
        program: &str,
        args: &[String],
    ) -> Result<Vec<u8>, ExecError> {
        let line = command_line(program, args);
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.clone());

        let mut response = self.responses.get(&line);
        let mut waited = Duration::ZERO;
        loop {
            match response {
                None => return Err(fail(MockFailure::NotFound, program, &line, deadline)),
                Some(MockResponse::Output(out)) => return Ok(out.clone().into_bytes()),
                Some(MockResponse::Fail(f)) => return Err(fail(*f, program, &line, deadline)),
                Some(MockResponse::Delayed(delay, inner)) => {
                    let remaining = deadline.saturating_sub(waited);
                    if *delay > remaining {
                        tokio::time::sleep(remaining).await;
                        return Err(fail(MockFailure::Timeout, program, &line, deadline));
                    }
                    tokio::time::sleep(*delay).await;
                    waited += *delay;
                    response = Some(inner.as_ref());
                }
            }
        }
    }
}
