//! Scoped child-process execution.
//!
//! Every external tool runs through [`run`]: output is collected
//! concurrently, the whole invocation is bounded by a timeout, and the child
//! is killed and reaped on every exit path.

use super::DemuxError;
use crate::log::Logger;
use crate::{log_debug, log_warn};
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

/// Collected output of a finished process.
#[derive(Debug)]
pub(crate) struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    /// Succeed only if the exit code is one of `accepted`.
    pub fn check(self, tool: &'static str, accepted: &[i32]) -> Result<Self, DemuxError> {
        match self.status.code() {
            Some(code) if accepted.contains(&code) => Ok(self),
            _ => Err(DemuxError::Failed {
                tool,
                status: self.status.to_string(),
                stderr: String::from_utf8_lossy(&self.stderr).trim().to_string(),
            }),
        }
    }
}

/// Run `command` to completion, or kill it once `timeout` elapses.
pub(crate) async fn run(
    mut command: Command,
    tool: &'static str,
    timeout: Duration,
    logger: &dyn Logger,
) -> Result<ProcessOutput, DemuxError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|source| DemuxError::Spawn { tool, source })?;
    log_debug!(logger, "Spawned {} (pid {:?})", tool, child.id());

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let collect = async {
        let (out, err) = tokio::try_join!(read_all(stdout.as_mut()), read_all(stderr.as_mut()))?;
        let status = child.wait().await?;
        Ok::<_, io::Error>((status, out, err))
    };
    let result = tokio::time::timeout(timeout, collect).await;

    match result {
        Ok(Ok((status, stdout, stderr))) => Ok(ProcessOutput {
            status,
            stdout,
            stderr,
        }),
        Ok(Err(e)) => {
            reap(&mut child, tool, logger).await;
            Err(DemuxError::Io(e))
        }
        Err(_) => {
            log_warn!(logger, "{} timed out after {:?}, killing it", tool, timeout);
            reap(&mut child, tool, logger).await;
            Err(DemuxError::Timeout { tool, timeout })
        }
    }
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<&mut R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(reader) = reader {
        reader.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Kill the child and consume its exit status.
async fn reap(child: &mut Child, tool: &'static str, logger: &dyn Logger) {
    if let Err(e) = child.kill().await {
        log_warn!(logger, "Failed to kill {}: {}", tool, e);
    }
}
