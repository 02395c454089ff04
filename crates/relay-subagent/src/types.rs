//! Shared data types for the sub-agent session manager.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a supervised sub-agent child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubSessionStatus {
    Running,
    Completed,
    Failed,
}

/// Monotonic session identifier, formatted `as-<n>` (§4.D).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubSessionId(pub String);

impl SubSessionId {
    pub fn new(n: u64) -> Self {
        Self(format!("as-{n}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of the captured output and exit state of a sub-agent child
/// process, returned by [`crate::process::ProcessHandle::result`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// A supervised delegated sub-agent session.
///
/// Safe to default-construct: every field has a zero value and `handle` is
/// `None`, so mocks and tests can build one without spawning a process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubSession {
    pub id: SubSessionId,
    pub backend: String,
    /// Native session id captured from the backend's JSON output, once seen.
    pub cli_session_id: Option<String>,
    pub status: SubSessionStatus,
    pub workdir: String,
    pub created_at: String,
    pub last_output: String,
}

impl SubSession {
    pub fn new(id: SubSessionId, backend: impl Into<String>, workdir: impl Into<String>) -> Self {
        Self {
            id,
            backend: backend.into(),
            cli_session_id: None,
            status: SubSessionStatus::Running,
            workdir: workdir.into(),
            created_at: crate::now_rfc3339(),
            last_output: String::new(),
        }
    }
}
