//! Running external tools.
//!
//! Tool output is drained concurrently from both pipes and forwarded line by
//! line as `info` events. Bytes are decoded lossily since compilers may
//! emit output in a legacy code page.

use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::{ToolEnvironment, ToolInvocation};

#[derive(Debug, Error)]
pub enum ToolError {
  #[error("failed to write response file {}: {source}", path.display())]
  ResponseFile {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to start {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("failed waiting for {program}: {source}")]
  Wait {
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("{program} did not finish within {}", humantime::format_duration(*timeout))]
  TimedOut { program: String, timeout: Duration },
}

/// Exit status of a finished tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolStatus {
  /// `None` when the tool was terminated by a signal.
  pub code: Option<i32>,
}

impl ToolStatus {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

impl From<ExitStatus> for ToolStatus {
  fn from(status: ExitStatus) -> Self {
    Self { code: status.code() }
  }
}

/// Run a tool to completion, forwarding its output.
///
/// A non-zero exit is reported through [`ToolStatus`], not as an error.
/// When `timeout` elapses the child is killed and [`ToolError::TimedOut`]
/// is returned.
pub async fn run_tool(
  invocation: &ToolInvocation,
  environment: &ToolEnvironment,
  timeout: Option<Duration>,
) -> Result<ToolStatus, ToolError> {
  if let Some(response_file) = &invocation.response_file {
    if let Some(parent) = response_file.path.parent() {
      tokio::fs::create_dir_all(parent)
        .await
        .map_err(|source| ToolError::ResponseFile {
          path: response_file.path.clone(),
          source,
        })?;
    }
    tokio::fs::write(&response_file.path, response_file.contents())
      .await
      .map_err(|source| ToolError::ResponseFile {
        path: response_file.path.clone(),
        source,
      })?;
  }

  debug!(command = %invocation.command_line(), "spawning tool");

  let mut command = Command::new(&invocation.program);
  command
    .args(&invocation.args)
    .envs(&environment.vars)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

  let mut child = command.spawn().map_err(|source| ToolError::Spawn {
    program: invocation.program.clone(),
    source,
  })?;

  let status = match timeout {
    Some(limit) => match tokio::time::timeout(limit, drain_and_wait(&mut child, &invocation.program)).await {
      Ok(status) => status,
      Err(_) => {
        warn!(tool = %invocation.program, timeout = %humantime::format_duration(limit), "tool timed out, killing it");
        if let Err(e) = child.kill().await {
          warn!(tool = %invocation.program, error = %e, "failed to kill tool");
        }
        return Err(ToolError::TimedOut {
          program: invocation.program.clone(),
          timeout: limit,
        });
      }
    },
    None => drain_and_wait(&mut child, &invocation.program).await,
  };

  let status = status.map_err(|source| ToolError::Wait {
    program: invocation.program.clone(),
    source,
  })?;

  debug!(tool = %invocation.program, code = ?status.code(), "tool exited");
  Ok(status.into())
}

async fn drain_and_wait(child: &mut Child, program: &str) -> io::Result<ExitStatus> {
  let stdout = child.stdout.take();
  let stderr = child.stderr.take();
  let (_, _, status) = tokio::join!(
    forward_lines(stdout, program),
    forward_lines(stderr, program),
    child.wait()
  );
  status
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: Option<R>, program: &str) {
  let Some(reader) = reader else {
    return;
  };
  let mut reader = BufReader::new(reader);
  let mut buf = Vec::new();

  loop {
    buf.clear();
    match reader.read_until(b'\n', &mut buf).await {
      Ok(0) => break,
      Ok(_) => {
        let line = String::from_utf8_lossy(&buf);
        info!(tool = %program, "{}", line.trim_end_matches(['\r', '\n']));
      }
      Err(e) => {
        warn!(tool = %program, error = %e, "failed to read tool output");
        break;
      }
    }
  }
}
