//! The `Job` record (§3 Job) and the enums it's built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How `schedule` should be parsed (§4.J `calcNextRun`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    /// `schedule` is a duration string ("30s", "5m", "1h", "2d").
    Every,
    /// `schedule` is a 5-field cron expression.
    Cron,
    /// `schedule` is an RFC-3339 timestamp; fires once.
    At,
}

/// Which session a fired job's synthetic message lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionTarget {
    /// The agent's regular per-channel session.
    Main,
    /// A dedicated `cron:<jobId>` session, never touched by normal turns.
    Isolated,
}

/// Prefix marking a job as derived state: re-registered fresh at every
/// startup, so `JobStore::load` discards any persisted record with this
/// prefix rather than risk running it against a stale workspace.
pub const HEARTBEAT_ID_PREFIX: &str = "heartbeat:";

pub fn is_heartbeat_job_id(id: &str) -> bool {
    id.starts_with(HEARTBEAT_ID_PREFIX)
}

/// A persisted cron job (§3 Job).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub agent_id: String,
    pub schedule_type: ScheduleType,
    pub schedule: String,
    pub prompt: String,
    pub session_target: SessionTarget,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub consecutive_errors: u32,
    pub created_at: DateTime<Utc>,

    /// Heartbeat/compaction jobs carry the agent's workspace path so the
    /// runner can read `HEARTBEAT.md` without a config lookup. Never
    /// persisted — re-derived at startup alongside the rest of the job.
    #[serde(skip)]
    pub workspace: Option<String>,
}

fn bool_true() -> bool {
    true
}

impl Job {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_run_at.is_some_and(|t| t <= now)
    }

    pub fn is_heartbeat_job(&self) -> bool {
        is_heartbeat_job_id(&self.id)
    }
}
