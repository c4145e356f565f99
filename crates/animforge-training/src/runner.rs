//! Launches phase subprocesses and streams their stdout line by line.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to launch '{program}'")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("process exceeded the {0:?} time limit and was killed")]
    Timeout(Duration),

    #[error("i/o error while streaming process output")]
    Io(#[from] std::io::Error),
}

/// What a finished subprocess left behind.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Real exit code; `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    /// Complete captured stderr.
    pub stderr: String,
}

impl RunOutcome {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs one subprocess at a time, delivering stdout lines to a handler in
/// arrival order while stderr is drained concurrently so neither pipe can
/// fill up and stall the child.
#[derive(Debug, Clone, Default)]
pub struct SubprocessRunner {
    timeout: Option<Duration>,
}

impl SubprocessRunner {
    #[must_use]
    pub fn new() -> Self {
        Self { timeout: None }
    }

    /// Bound the whole run; the child is killed when the limit elapses.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout: Some(timeout) }
    }

    /// Run `program` to completion, invoking `on_line` for every non-empty
    /// trimmed stdout line together with `display_name`.
    ///
    /// Lines are delivered synchronously and in order; the next line is not
    /// read until the handler returns. Stderr lines are logged as errors as
    /// they arrive and returned whole in the outcome. A non-zero exit is not
    /// an error here, the caller decides what it means.
    pub async fn run(
        &self,
        program: &str,
        args: &[&str],
        working_dir: &Path,
        display_name: &str,
        env_overrides: &HashMap<String, String>,
        mut on_line: impl FnMut(&str, &str),
    ) -> Result<RunOutcome, RunnerError> {
        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in env_overrides {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|source| RunnerError::Spawn {
            program: program.to_string(),
            source,
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("child stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("child stderr was not captured"))?;

        let stderr_name = display_name.to_string();
        let stderr_task = tokio::spawn(async move {
            let mut collected = String::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    error!(process = %stderr_name, "{trimmed}");
                }
                collected.push_str(&line);
                collected.push('\n');
            }
            collected
        });

        let stream = async {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    on_line(trimmed, display_name);
                }
            }
            child.wait().await
        };

        let status = match self.timeout {
            None => stream.await?,
            Some(limit) => match tokio::time::timeout(limit, stream).await {
                Ok(status) => status?,
                Err(_) => {
                    let _ = child.start_kill();
                    stderr_task.abort();
                    return Err(RunnerError::Timeout(limit));
                }
            },
        };

        let stderr = stderr_task.await.unwrap_or_default();
        Ok(RunOutcome {
            exit_code: status.code().unwrap_or(-1),
            stderr,
        })
    }
}
