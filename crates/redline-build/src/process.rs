//! Subprocess execution with output capture and wall-clock timeout
//!
//! Both external tools (front-end and native compiler) run through here.

use std::env;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured result of a finished subprocess
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

#[derive(Debug)]
pub enum ProcessError {
    /// The child ran past its deadline and was killed
    TimedOut(Duration),
    /// Spawning or waiting failed
    Io(io::Error),
}

/// Run `command` to completion, capturing stdout and stderr.
///
/// Stdin is closed. With a timeout the child is killed once the deadline
/// passes, and the same deadline bounds collecting its output: a descendant
/// that keeps the pipes open past it also yields `TimedOut`. Without a timeout
/// this waits until every holder of the pipes has closed them.
pub fn run(command: &mut Command, timeout: Option<Duration>) -> Result<ProcessOutput, ProcessError> {
    debug!(command = ?command, "spawning");

    let start = Instant::now();
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(ProcessError::Io)?;

    // Drain both pipes concurrently so a chatty child cannot block on a full pipe.
    let stdout = spawn_reader(child.stdout.take());
    let stderr = spawn_reader(child.stderr.take());

    let status = match timeout {
        Some(limit) => wait_with_deadline(&mut child, start, limit)?,
        None => child.wait().map_err(ProcessError::Io)?,
    };

    let deadline = timeout.map(|limit| (start + limit, limit));
    let stdout = collect(&stdout, deadline)?;
    let stderr = collect(&stderr, deadline)?;

    Ok(ProcessOutput {
        status,
        stdout,
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

fn wait_with_deadline(
    child: &mut Child,
    start: Instant,
    limit: Duration,
) -> Result<ExitStatus, ProcessError> {
    loop {
        if let Some(status) = child.try_wait().map_err(ProcessError::Io)? {
            return Ok(status);
        }
        if start.elapsed() >= limit {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ProcessError::TimedOut(limit));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Read `source` to the end on a detached thread
fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(read_all(source));
    });
    rx
}

/// Wait for a reader's bytes, giving up once `deadline` passes.
///
/// A reader left behind stays blocked until the pipe closes; its thread is
/// detached and exits on its own.
fn collect(
    reader: &Receiver<Vec<u8>>,
    deadline: Option<(Instant, Duration)>,
) -> Result<Vec<u8>, ProcessError> {
    let Some((at, limit)) = deadline else {
        return Ok(reader.recv().unwrap_or_default());
    };
    let remaining = at.saturating_duration_since(Instant::now());
    match reader.recv_timeout(remaining) {
        Ok(bytes) => Ok(bytes),
        Err(RecvTimeoutError::Timeout) => {
            debug!(?limit, "output pipes still open after deadline");
            Err(ProcessError::TimedOut(limit))
        }
        Err(RecvTimeoutError::Disconnected) => Ok(Vec::new()),
    }
}

fn read_all<R: Read>(source: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut source) = source {
        let _ = source.read_to_end(&mut buf);
    }
    buf
}

/// Locate an executable.
///
/// Paths with a directory component are checked directly; bare names are
/// searched for on `PATH`.
pub fn find_executable(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return is_executable(program).then(|| program.to_path_buf());
    }

    let search = env::var_os("PATH")?;
    env::split_paths(&search).find_map(|dir| {
        let candidate = dir.join(program);
        if is_executable(&candidate) {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = candidate.with_extension("exe");
            if is_executable(&exe) {
                return Some(exe);
            }
        }
        None
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
