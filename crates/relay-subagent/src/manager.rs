//! `SubAgentManager` — owns and multiplexes all active delegated sub-agent
//! sessions (§4.D).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::error::{Result, SubAgentError};
use crate::process::ProcessHandle;
use crate::safety;
use crate::types::{ProcessResult, SubSession, SubSessionId, SubSessionStatus};

/// Default cap on concurrently live sub-agent sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 8;

struct Entry {
    session: Mutex<SubSession>,
    process: ProcessHandle,
}

/// Supervises a bounded set of delegated sub-agent child processes.
pub struct SubAgentManager {
    max_sessions: usize,
    next_id: AtomicU64,
    sessions: Mutex<HashMap<SubSessionId, Arc<Entry>>>,
}

impl SubAgentManager {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            max_sessions,
            next_id: AtomicU64::new(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Spawn `backend` with `args` in `workdir` as a new sub-agent session.
    ///
    /// Returns [`SubAgentError::LimitReached`] once `max_sessions` live
    /// sessions are already tracked, or [`SubAgentError::CommandBlocked`] if
    /// the safety checker rejects the backend command line.
    pub fn create(&self, backend: &str, args: &[String], workdir: &str) -> Result<SubSessionId> {
        let command_line = if args.is_empty() {
            backend.to_string()
        } else {
            format!("{backend} {}", args.join(" "))
        };
        if let Err(reason) = safety::check_command(&command_line) {
            return Err(SubAgentError::CommandBlocked { reason });
        }

        let mut sessions = self.sessions.lock().unwrap();
        if sessions.len() >= self.max_sessions {
            return Err(SubAgentError::LimitReached(self.max_sessions));
        }

        let id = SubSessionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let process = ProcessHandle::spawn(backend, args, workdir)?;
        let session = SubSession::new(id.clone(), backend, workdir);

        info!(session_id = %id, backend, workdir, "created sub-agent session");
        sessions.insert(
            id.clone(),
            Arc::new(Entry {
                session: Mutex::new(session),
                process,
            }),
        );
        Ok(id)
    }

    /// Snapshot of the session's current state and buffered output.
    pub fn get(&self, id: &SubSessionId) -> Result<(SubSession, ProcessResult)> {
        let entry = self.entry(id)?;
        let result = entry.process.result();
        let mut session = entry.session.lock().unwrap().clone();
        session.status = status_from(&result, entry.process.is_alive());
        session.last_output = tail_output(&result);
        Ok((session, result))
    }

    /// Snapshots of all tracked sessions.
    pub fn list(&self) -> Vec<SubSession> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .values()
            .map(|entry| {
                let result = entry.process.result();
                let mut session = entry.session.lock().unwrap().clone();
                session.status = status_from(&result, entry.process.is_alive());
                session.last_output = tail_output(&result);
                session
            })
            .collect()
    }

    /// Kill the session's child process (if still running) and remove it
    /// from the manager. POSIX: signal the whole process group so any
    /// grandchildren die too. Windows: kill the process directly.
    pub fn destroy(&self, id: &SubSessionId) -> Result<()> {
        let entry = {
            let mut sessions = self.sessions.lock().unwrap();
            sessions
                .remove(id)
                .ok_or_else(|| SubAgentError::SessionNotFound(id.to_string()))?
        };

        if entry.process.is_alive() {
            if let Some(pid) = entry.process.pid() {
                kill_process_group(pid);
            }
        }

        info!(session_id = %id, "destroyed sub-agent session");
        Ok(())
    }

    /// Waits for the session's backend process to exit.
    pub async fn wait_done(&self, id: &SubSessionId) -> Result<()> {
        let entry = self.entry(id)?;
        entry.process.done().await;
        Ok(())
    }

    fn entry(&self, id: &SubSessionId) -> Result<Arc<Entry>> {
        self.sessions
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| SubAgentError::SessionNotFound(id.to_string()))
    }
}

impl Default for SubAgentManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SESSIONS)
    }
}

fn status_from(result: &ProcessResult, is_alive: bool) -> SubSessionStatus {
    if is_alive {
        return SubSessionStatus::Running;
    }
    match result.exit_code {
        Some(0) => SubSessionStatus::Completed,
        _ => SubSessionStatus::Failed,
    }
}

fn tail_output(result: &ProcessResult) -> String {
    if !result.stdout.is_empty() {
        result.stdout.clone()
    } else {
        result.stderr.clone()
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    // Negative pid targets the process group rooted at `pid`, which was
    // established as its own group leader at spawn time by the OS default
    // for a freshly spawned child with no controlling terminal reassigned.
    unsafe {
        libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
    }
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_group(pid: u32) {
    let _ = std::process::Command::new("taskkill")
        .args(["/F", "/PID", &pid.to_string()])
        .output();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_assigns_monotonic_as_n_ids() {
        let mgr = SubAgentManager::new(8);
        let a = mgr.create("sh", &["-c".into(), "sleep 1".into()], ".").unwrap();
        let b = mgr.create("sh", &["-c".into(), "sleep 1".into()], ".").unwrap();
        assert_eq!(a.as_str(), "as-1");
        assert_eq!(b.as_str(), "as-2");
        mgr.destroy(&a).unwrap();
        mgr.destroy(&b).unwrap();
    }

    #[test]
    fn create_errors_once_limit_reached() {
        let mgr = SubAgentManager::new(1);
        let a = mgr.create("sh", &["-c".into(), "sleep 1".into()], ".").unwrap();
        let err = mgr.create("sh", &["-c".into(), "sleep 1".into()], ".").unwrap_err();
        assert!(matches!(err, SubAgentError::LimitReached(1)));
        mgr.destroy(&a).unwrap();
    }

    #[tokio::test]
    async fn completed_session_reports_completed_status() {
        let mgr = SubAgentManager::new(8);
        let id = mgr.create("sh", &["-c".into(), "echo done".into()], ".").unwrap();
        mgr.wait_done(&id).await.unwrap();
        let (session, result) = mgr.get(&id).unwrap();
        assert_eq!(session.status, SubSessionStatus::Completed);
        assert_eq!(result.stdout.trim(), "done");
    }

    #[test]
    fn get_missing_session_errors() {
        let mgr = SubAgentManager::new(8);
        let err = mgr.get(&SubSessionId::new(999)).unwrap_err();
        assert!(matches!(err, SubAgentError::SessionNotFound(_)));
    }

    #[test]
    fn destroy_missing_session_errors() {
        let mgr = SubAgentManager::new(8);
        let err = mgr.destroy(&SubSessionId::new(999)).unwrap_err();
        assert!(matches!(err, SubAgentError::SessionNotFound(_)));
    }
}
