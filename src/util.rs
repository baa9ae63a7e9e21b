use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::trace;

/// Failure modes for an external collaborator invocation
#[derive(Debug)]
pub enum CommandError {
    /// Empty argv or the process could not be spawned
    Spawn(String),
    /// The process exited non-zero
    Failed { status: String, stderr: String },
    /// The process did not finish within the allowed time and was killed
    Timeout(u64),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Spawn(e) => write!(f, "failed to spawn command: {}", e),
            CommandError::Failed { status, stderr } => {
                write!(f, "command failed with {}: {}", status, stderr.trim())
            }
            CommandError::Timeout(secs) => {
                write!(f, "command timed out after {} seconds", secs)
            }
        }
    }
}

impl std::error::Error for CommandError {}

/// Run an external command with a hard timeout, optionally feeding stdin,
/// returning captured stdout. The child is killed if the timeout expires.
///
/// Stdin is written from a separate task and stdout/stderr are drained
/// while the child runs, so artifacts larger than the pipe buffers cannot
/// deadlock the exchange, and the timeout covers the whole exchange
/// including the stdin hand-off.
pub async fn run_command(
    argv: &[String],
    stdin: Option<&[u8]>,
    timeout_secs: u64,
) -> Result<String, CommandError> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| CommandError::Spawn("empty command".into()))?;
    trace!("Spawning {:?} (timeout {}s)", argv, timeout_secs);

    let mut child = Command::new(program)
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| CommandError::Spawn(format!("{}: {}", program, e)))?;

    if let Some(payload) = stdin {
        if let Some(mut handle) = child.stdin.take() {
            let payload = payload.to_vec();
            tokio::spawn(async move {
                // A child that exits without reading its stdin produces a
                // broken pipe here; its exit status is what matters
                let _ = handle.write_all(&payload).await;
                // Drop closes the pipe so the child sees EOF
            });
        }
    }

    let output = match tokio::time::timeout(
        tokio::time::Duration::from_secs(timeout_secs),
        child.wait_with_output(),
    )
    .await
    {
        Ok(result) => {
            result.map_err(|e| CommandError::Spawn(format!("waiting for {}: {}", program, e)))?
        }
        // Dropping the timed-out future kills the child (kill_on_drop)
        Err(_) => return Err(CommandError::Timeout(timeout_secs)),
    };

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(CommandError::Failed {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
