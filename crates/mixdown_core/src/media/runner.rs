//! Bounded subprocess execution.
//!
//! External tools are spawned with piped output and polled so a stalled
//! process is killed at the deadline instead of wedging the pipeline.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::media::engine::{MediaError, MediaResult};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured output of a finished subprocess.
#[derive(Debug)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run a command to completion, killing it if it outlives `timeout`.
///
/// stdout and stderr are drained on background threads so a chatty child
/// cannot deadlock on a full pipe while we wait.
pub fn run_with_timeout(
    cmd: &mut Command,
    tool: &str,
    timeout: Duration,
) -> MediaResult<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    tracing::debug!("Running {}: {:?}", tool, cmd);

    let mut child = cmd.spawn().map_err(|e| MediaError::Spawn {
        tool: tool.to_string(),
        source: e,
    })?;

    let stdout_handle = drain_pipe(child.stdout.take());
    let stderr_handle = drain_pipe(child.stderr.take());

    let status = wait_with_timeout(&mut child, tool, timeout)?;

    Ok(CommandOutput {
        exit_code: status.code().unwrap_or(-1),
        stdout: stdout_handle.join().unwrap_or_default(),
        stderr: stderr_handle.join().unwrap_or_default(),
    })
}

/// Read a child pipe to the end on a background thread.
pub fn drain_pipe<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// Poll a child until it exits or the deadline passes.
///
/// On timeout the child is killed and reaped before the error is returned,
/// so no zombie is left behind.
pub fn wait_with_timeout(
    child: &mut Child,
    tool: &str,
    timeout: Duration,
) -> MediaResult<ExitStatus> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(e) => return Err(MediaError::io(format!("waiting for {}", tool), e)),
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(MediaError::Timeout {
                tool: tool.to_string(),
                secs: timeout.as_secs(),
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Last `max_lines` lines of captured stderr, for error messages.
pub fn stderr_tail(stderr: &[u8], max_lines: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
