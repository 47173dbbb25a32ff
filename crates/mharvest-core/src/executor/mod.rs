//! Bounded execution of external diagnostic commands.
//!
//! `CommandExecutor` is the seam between collectors and the operating
//! system. `SystemExecutor` spawns real processes; `MockExecutor` replays
//! scripted outputs so collectors can be tested on any host.

pub mod mock;
pub mod scenarios;

use std::io;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::debug;

pub use mock::{MockExecutor, MockFailure, MockResponse};

/// Default cap on captured stdout.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Stderr kept for diagnostics; the remainder is drained and dropped.
const STDERR_KEEP_BYTES: usize = 4 * 1024;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("`{command}` did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("`{program}` not found")]
    NotFound { program: String },

    #[error("`{command}` exited with status {code}: {stderr}")]
    NonZeroExit {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("`{command}` produced more than {limit} bytes of output")]
    OutputTooLarge { command: String, limit: usize },

    #[error("`{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },
}

impl ExecError {
    /// Short, stable name of the failure, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ExecError::Timeout { .. } => "timeout",
            ExecError::NotFound { .. } => "not_found",
            ExecError::NonZeroExit { .. } => "non_zero_exit",
            ExecError::OutputTooLarge { .. } => "output_too_large",
            ExecError::Io { .. } => "io",
        }
    }
}

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Runs `program args..` and returns its stdout.
    ///
    /// The child is killed if it is still running when `deadline` elapses.
    /// No retries.
    async fn execute(
        &self,
        deadline: Duration,
        program: &str,
        args: &[String],
    ) -> Result<Vec<u8>, ExecError>;
}

pub(crate) fn command_line(program: &str, args: &[String]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Spawns real child processes through tokio.
#[derive(Debug, Clone)]
pub struct SystemExecutor {
    max_output_bytes: usize,
}

impl Default for SystemExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OUTPUT_BYTES)
    }
}

impl SystemExecutor {
    pub fn new(max_output_bytes: usize) -> Self {
        Self { max_output_bytes }
    }

    async fn run(&self, program: &str, args: &[String], line: &str) -> Result<Vec<u8>, ExecError> {
        let io_err = |source: io::Error| ExecError::Io {
            command: line.to_string(),
            source,
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => ExecError::NotFound {
                    program: program.to_string(),
                },
                _ => io_err(e),
            })?;

        let stderr_task = child.stderr.take().map(|stderr| tokio::spawn(read_stderr(stderr)));

        let mut stdout = Vec::new();
        if let Some(pipe) = child.stdout.take() {
            let limit = self.max_output_bytes as u64;
            pipe.take(limit + 1)
                .read_to_end(&mut stdout)
                .await
                .map_err(io_err)?;
            if stdout.len() as u64 > limit {
                // Dropping `child` kills it.
                return Err(ExecError::OutputTooLarge {
                    command: line.to_string(),
                    limit: self.max_output_bytes,
                });
            }
        }

        let status = child.wait().await.map_err(io_err)?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            return Err(ExecError::NonZeroExit {
                command: line.to_string(),
                code: status.code().unwrap_or(-1),
                stderr,
            });
        }
        Ok(stdout)
    }
}

async fn read_stderr<R: AsyncRead + Unpin>(mut pipe: R) -> String {
    let mut kept = Vec::with_capacity(STDERR_KEEP_BYTES);
    let _ = (&mut pipe)
        .take(STDERR_KEEP_BYTES as u64)
        .read_to_end(&mut kept)
        .await;
    let _ = tokio::io::copy(&mut pipe, &mut tokio::io::sink()).await;
    String::from_utf8_lossy(&kept).trim().to_string()
}

#[async_trait]
impl CommandExecutor for SystemExecutor {
    async fn execute(
        &self,
        deadline: Duration,
        program: &str,
        args: &[String],
    ) -> Result<Vec<u8>, ExecError> {
        let line = command_line(program, args);
        debug!(command = %line, timeout = ?deadline, "executing command");

        let result = match tokio::time::timeout(deadline, self.run(program, args, &line)).await {
            Ok(result) => result,
            Err(_) => Err(ExecError::Timeout {
                command: line.clone(),
                timeout: deadline,
            }),
        };

        match &result {
            Ok(out) => debug!(command = %line, bytes = out.len(), "command finished"),
            Err(e) => debug!(command = %line, kind = e.kind(), error = %e, "command failed"),
        }
        result
    }
}
