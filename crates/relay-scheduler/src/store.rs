//! Cron Job Store (§4.I): a JSON array of [`Job`] records on disk, with an
//! in-memory `RwLock` cache — the same reader-biased-registry idiom used
//! by `relay-providers::ProviderRegistry` and `relay-tools::ToolRegistry`.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Result, SchedulerError};
use crate::types::{is_heartbeat_job_id, Job};

pub struct JobStore {
    path: PathBuf,
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobStore {
    /// Loads `path` if it exists (a missing file is not an error — a fresh
    /// store starts empty). Jobs with a heartbeat-prefixed id are dropped:
    /// they're always re-registered at startup with fresh runtime fields.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let jobs = match std::fs::read_to_string(&path) {
            Ok(text) => {
                let all: Vec<Job> = serde_json::from_str(&text)?;
                let kept: HashMap<String, Job> = all
                    .into_iter()
                    .filter(|job| {
                        let keep = !is_heartbeat_job_id(&job.id);
                        if !keep {
                            debug!(job_id = %job.id, "discarding persisted heartbeat job, re-derived at startup");
                        }
                        keep
                    })
                    .map(|job| (job.id.clone(), job))
                    .collect();
                kept
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            jobs: RwLock::new(jobs),
        })
    }

    /// Atomic write via temp file + rename, matching the Session Store's
    /// crash-safety idiom.
    pub async fn save(&self) -> Result<()> {
        let jobs = self.jobs.read().await;
        let all: Vec<&Job> = jobs.values().collect();
        let encoded = serde_json::to_vec_pretty(&all)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &encoded)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    pub async fn add(&self, job: Job) -> Result<()> {
        {
            let mut jobs = self.jobs.write().await;
            if jobs.contains_key(&job.id) {
                return Err(SchedulerError::DuplicateId { id: job.id });
            }
            jobs.insert(job.id.clone(), job);
        }
        self.save().await
    }

    pub async fn update(&self, job: Job) -> Result<()> {
        {
            let mut jobs = self.jobs.write().await;
            jobs.insert(job.id.clone(), job);
        }
        self.save().await
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        {
            let mut jobs = self.jobs.write().await;
            if jobs.remove(id).is_none() {
                return Err(SchedulerError::JobNotFound { id: id.to_string() });
            }
        }
        self.save().await
    }

    pub async fn get(&self, id: &str) -> Option<Job> {
        self.jobs.read().await.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<Job> {
        self.jobs.read().await.values().cloned().collect()
    }

    pub async fn list_due(&self, now: DateTime<Utc>) -> Vec<Job> {
        self.jobs
            .read()
            .await
            .values()
            .filter(|job| job.is_due(now))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ScheduleType, SessionTarget};

    fn job(id: &str) -> Job {
        Job {
            id: id.to_string(),
            name: "test".to_string(),
            agent_id: "main".to_string(),
            schedule_type: ScheduleType::Every,
            schedule: "5m".to_string(),
            prompt: "check in".to_string(),
            session_target: SessionTarget::Isolated,
            channel_id: None,
            chat_id: None,
            enabled: true,
            last_run_at: None,
            next_run_at: Some(Utc::now()),
            consecutive_errors: 0,
            created_at: Utc::now(),
            workspace: None,
        }
    }

    #[tokio::test]
    async fn load_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::load(dir.path().join("jobs.json")).await.unwrap();
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn add_then_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        let store = JobStore::load(&path).await.unwrap();
        store.add(job("j1")).await.unwrap();

        let reloaded = JobStore::load(&path).await.unwrap();
        assert_eq!(reloaded.list().await.len(), 1);
    }

    #[tokio::test]
    async fn add_duplicate_id_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::load(dir.path().join("jobs.json")).await.unwrap();
        store.add(job("j1")).await.unwrap();
        let err = store.add(job("j1")).await.unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateId { .. }));
    }

    #[tokio::test]
    async fn remove_unknown_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::load(dir.path().join("jobs.json")).await.unwrap();
        let err = store.remove("nope").await.unwrap_err();
        assert!(matches!(err, SchedulerError::JobNotFound { .. }));
    }

    #[tokio::test]
    async fn heartbeat_prefixed_jobs_are_discarded_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        let store = JobStore::load(&path).await.unwrap();
        store.add(job("heartbeat:main")).await.unwrap();
        store.add(job("j1")).await.unwrap();

        let reloaded = JobStore::load(&path).await.unwrap();
        let ids: Vec<String> = reloaded.list().await.into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec!["j1".to_string()]);
    }

    #[tokio::test]
    async fn list_due_filters_on_enabled_and_next_run_at() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::load(dir.path().join("jobs.json")).await.unwrap();

        let mut due = job("due");
        due.next_run_at = Some(Utc::now() - chrono::Duration::seconds(1));
        store.add(due).await.unwrap();

        let mut future = job("future");
        future.next_run_at = Some(Utc::now() + chrono::Duration::hours(1));
        store.add(future).await.unwrap();

        let mut disabled = job("disabled");
        disabled.enabled = false;
        disabled.next_run_at = Some(Utc::now() - chrono::Duration::seconds(1));
        store.add(disabled).await.unwrap();

        let due_now = store.list_due(Utc::now()).await;
        assert_eq!(due_now.len(), 1);
        assert_eq!(due_now[0].id, "due");
    }
}
