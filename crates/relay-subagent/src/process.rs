//! `ProcessHandle` — a supervised child process with bounded output buffers.
//!
//! AI agents have finite context windows, and a misbehaving backend can emit
//! unbounded output; silently dropping overflow (rather than growing the
//! buffer or killing the process) keeps memory bounded without surprising
//! the caller with a failed session.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use crate::error::{Result, SubAgentError};
use crate::types::ProcessResult;

/// Maximum bytes kept per stream (1 MiB). Further writes are dropped once
/// the buffer is full — the caller already has the head of the output.
const MAX_BUF_BYTES: usize = 1024 * 1024;

#[derive(Default)]
struct BoundedBuffer {
    data: String,
    dropped: bool,
}

impl BoundedBuffer {
    fn push(&mut self, s: &str) {
        if self.dropped {
            return;
        }
        let remaining = MAX_BUF_BYTES.saturating_sub(self.data.len());
        if s.len() > remaining {
            let mut end = remaining.min(s.len());
            while end > 0 && !s.is_char_boundary(end) {
                end -= 1;
            }
            self.data.push_str(&s[..end]);
            self.dropped = true;
            return;
        }
        self.data.push_str(s);
    }
}

/// A running (or completed, or never-started) sub-agent backend process.
///
/// The default value represents "no process" and is safe to call every
/// method on — `done()` resolves immediately and `result()` returns an
/// empty snapshot with no exit code. This matters for tests and for code
/// paths that construct a [`crate::types::SubSession`] before a process is
/// actually spawned.
pub struct ProcessHandle {
    stdout: Arc<Mutex<BoundedBuffer>>,
    stderr: Arc<Mutex<BoundedBuffer>>,
    exit_code: Arc<Mutex<Option<i32>>>,
    done_rx: watch::Receiver<bool>,
    pid: Option<u32>,
}

impl Default for ProcessHandle {
    fn default() -> Self {
        let (_tx, rx) = watch::channel(true);
        Self {
            stdout: Arc::new(Mutex::new(BoundedBuffer::default())),
            stderr: Arc::new(Mutex::new(BoundedBuffer::default())),
            exit_code: Arc::new(Mutex::new(None)),
            done_rx: rx,
            pid: None,
        }
    }
}

impl ProcessHandle {
    /// Spawn `program` with `args` in `cwd`, streaming stdout/stderr into
    /// bounded buffers line by line as they arrive.
    pub fn spawn(program: &str, args: &[String], cwd: &str) -> Result<Self> {
        let mut child = tokio::process::Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SubAgentError::SpawnFailed {
                backend: program.to_string(),
                reason: e.to_string(),
            })?;

        let pid = child.id();
        let stdout_pipe = child.stdout.take().expect("stdout piped at spawn");
        let stderr_pipe = child.stderr.take().expect("stderr piped at spawn");

        let stdout = Arc::new(Mutex::new(BoundedBuffer::default()));
        let stderr = Arc::new(Mutex::new(BoundedBuffer::default()));
        let exit_code = Arc::new(Mutex::new(None));
        let (done_tx, done_rx) = watch::channel(false);

        spawn_reader(stdout_pipe, Arc::clone(&stdout));
        spawn_reader(stderr_pipe, Arc::clone(&stderr));

        {
            let exit_code = Arc::clone(&exit_code);
            tokio::spawn(async move {
                let status = child.wait().await;
                *exit_code.lock().unwrap() = status.ok().and_then(|s| s.code());
                let _ = done_tx.send(true);
            });
        }

        Ok(Self {
            stdout,
            stderr,
            exit_code,
            done_rx,
            pid,
        })
    }

    /// Resolves exactly once the child has exited. Resolves immediately if
    /// the child has already exited, or if this handle was never spawned.
    pub async fn done(&self) {
        let mut rx = self.done_rx.clone();
        if *rx.borrow() {
            return;
        }
        let _ = rx.changed().await;
    }

    /// Snapshot the buffered output and exit code as they currently stand.
    pub fn result(&self) -> ProcessResult {
        ProcessResult {
            stdout: self.stdout.lock().unwrap().data.clone(),
            stderr: self.stderr.lock().unwrap().data.clone(),
            exit_code: *self.exit_code.lock().unwrap(),
        }
    }

    pub fn is_alive(&self) -> bool {
        !*self.done_rx.borrow()
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }
}

fn spawn_reader<R>(pipe: R, buf: Arc<Mutex<BoundedBuffer>>)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(pipe);
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => buf.lock().unwrap().push(&line),
                Err(_) => break,
            }
        }
    });
}
