//! The Scheduler (§4.J): a 15-second tick loop over due jobs, guarded by a
//! per-job singleton set and a global concurrency semaphore, with
//! exponential backoff on failure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashSet;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::error::Result;
use crate::schedule::calc_next_run;
use crate::store::JobStore;
use crate::types::Job;

const TICK_INTERVAL: Duration = Duration::from_secs(15);
const BACKOFF_LADDER_SECS: [i64; 5] = [30, 60, 300, 900, 3600];

/// What a [`JobRunner`] did with one due job. Distinct from a bare
/// success/failure so the engine can tell "nothing to report this tick"
/// (reschedule quietly) apart from "the run actually failed" (backoff).
pub enum RunOutcome {
    /// The job did real work; `lastRunAt`/`consecutiveErrors` update normally.
    Fired,
    /// A heartbeat job found nothing to report; reschedule without firing.
    NoWork,
    /// The run failed; apply the backoff ladder.
    Failed(String),
}

/// Turns a due [`Job`] into actual work. Implemented by the binary crate
/// that owns the Message Queue, Agent Core, and Session Store — this
/// crate knows only the scheduling mechanics, not what a job *does*.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: &Job) -> RunOutcome;
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub max_concurrent_runs: usize,
    pub job_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 1,
            job_timeout: Duration::from_secs(300),
        }
    }
}

/// Drives the tick loop; also the handle callers use to add/remove/list
/// jobs while it runs.
pub struct Scheduler {
    store: Arc<JobStore>,
    runner: Arc<dyn JobRunner>,
    running: Arc<DashSet<String>>,
    semaphore: Arc<Semaphore>,
    job_timeout: Duration,
}

impl Scheduler {
    pub fn new(store: Arc<JobStore>, runner: Arc<dyn JobRunner>, config: SchedulerConfig) -> Self {
        Self {
            store,
            runner,
            running: Arc::new(DashSet::new()),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_runs.max(1))),
            job_timeout: config.job_timeout,
        }
    }

    pub async fn add_job(&self, job: Job) -> Result<()> {
        self.store.add(job).await
    }

    pub async fn remove_job(&self, id: &str) -> Result<()> {
        self.store.remove(id).await
    }

    pub async fn list_jobs(&self) -> Vec<Job> {
        self.store.list().await
    }

    /// Ticks every 15 seconds until `shutdown` is cancelled, then waits for
    /// in-flight job tasks and saves once more (§4.J persistence note).
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!("scheduler started");
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.clone().tick(&mut in_flight).await;
                }
                Some(result) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = result {
                        error!(error = %e, "job task panicked");
                    }
                }
            }
        }

        info!(pending = in_flight.len(), "scheduler stopping, draining in-flight jobs");
        while in_flight.join_next().await.is_some() {}

        if let Err(e) = self.store.save().await {
            warn!(error = %e, "final scheduler save failed");
        }
        info!("scheduler stopped");
    }

    async fn tick(self: Arc<Self>, in_flight: &mut JoinSet<()>) {
        let now = Utc::now();
        let due = self.store.list_due(now).await;

        for job in due {
            if self.running.contains(&job.id) {
                continue;
            }
            let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() else {
                break;
            };

            self.running.insert(job.id.clone());
            let this = Arc::clone(&self);
            in_flight.spawn(async move {
                this.run_one(job).await;
                drop(permit);
            });
        }
    }

    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn run_one(&self, mut job: Job) {
        let outcome = match tokio::time::timeout(self.job_timeout, self.runner.run(&job)).await {
            Ok(outcome) => outcome,
            Err(_) => RunOutcome::Failed("job run exceeded its timeout".to_string()),
        };

        let now = Utc::now();
        match outcome {
            RunOutcome::Fired => {
                job.last_run_at = Some(now);
                job.consecutive_errors = 0;
                self.reschedule(&mut job, now);
            }
            RunOutcome::NoWork => {
                self.reschedule(&mut job, now);
            }
            RunOutcome::Failed(reason) => {
                job.consecutive_errors += 1;
                warn!(attempt = job.consecutive_errors, error = %reason, "job run failed, backing off");
                job.next_run_at = Some(backoff_next(job.consecutive_errors, now));
            }
        }

        if let Err(e) = self.store.update(job.clone()).await {
            error!(error = %e, "failed to persist rescheduled job");
        } else if let Err(e) = self.store.save().await {
            warn!(error = %e, "failed to save job store after reschedule");
        }

        self.running.remove(&job.id);
    }

    fn reschedule(&self, job: &mut Job, now: chrono::DateTime<Utc>) {
        match calc_next_run(job, now) {
            Ok(Some(next)) => job.next_run_at = Some(next),
            Ok(None) => {
                info!("schedule exhausted, disabling job");
                job.enabled = false;
                job.next_run_at = None;
            }
            Err(e) => {
                warn!(error = %e, "failed to compute next run, disabling job");
                job.enabled = false;
                job.next_run_at = None;
            }
        }
    }
}

/// §4.J: `{30s, 1m, 5m, 15m, 60m}`, saturating at the last step.
fn backoff_next(consecutive_errors: u32, from: chrono::DateTime<Utc>) -> chrono::DateTime<Utc> {
    let idx = (consecutive_errors.saturating_sub(1) as usize).min(BACKOFF_LADDER_SECS.len() - 1);
    from + chrono::Duration::seconds(BACKOFF_LADDER_SECS[idx])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ScheduleType, SessionTarget};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as AsyncMutex;

    fn job(id: &str, schedule_type: ScheduleType, schedule: &str) -> Job {
        Job {
            id: id.to_string(),
            name: "test".to_string(),
            agent_id: "main".to_string(),
            schedule_type,
            schedule: schedule.to_string(),
            prompt: "do the thing".to_string(),
            session_target: SessionTarget::Isolated,
            channel_id: None,
            chat_id: None,
            enabled: true,
            last_run_at: None,
            next_run_at: Some(Utc::now() - chrono::Duration::seconds(1)),
            consecutive_errors: 0,
            created_at: Utc::now(),
            workspace: None,
        }
    }

    struct ScriptedRunner {
        outcomes: AsyncMutex<Vec<RunOutcome>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl JobRunner for ScriptedRunner {
        async fn run(&self, _job: &Job) -> RunOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut outcomes = self.outcomes.lock().await;
            if outcomes.is_empty() {
                RunOutcome::NoWork
            } else {
                outcomes.remove(0)
            }
        }
    }

    #[tokio::test]
    async fn successful_run_clears_errors_and_reschedules() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JobStore::load(dir.path().join("jobs.json")).await.unwrap());
        store.add(job("j1", ScheduleType::Every, "5m")).await.unwrap();

        let runner = Arc::new(ScriptedRunner {
            outcomes: AsyncMutex::new(vec![RunOutcome::Fired]),
            calls: AtomicUsize::new(0),
        });
        let scheduler = Scheduler::new(store.clone(), runner, SchedulerConfig::default());
        let mut in_flight = JoinSet::new();
        Arc::new(scheduler).tick(&mut in_flight).await;
        while in_flight.join_next().await.is_some() {}

        let updated = store.get("j1").await.unwrap();
        assert!(updated.last_run_at.is_some());
        assert_eq!(updated.consecutive_errors, 0);
        assert!(updated.next_run_at.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn failed_run_applies_backoff_and_keeps_job_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JobStore::load(dir.path().join("jobs.json")).await.unwrap());
        store.add(job("j1", ScheduleType::Every, "5m")).await.unwrap();

        let runner = Arc::new(ScriptedRunner {
            outcomes: AsyncMutex::new(vec![RunOutcome::Failed("boom".to_string())]),
            calls: AtomicUsize::new(0),
        });
        let scheduler = Scheduler::new(store.clone(), runner, SchedulerConfig::default());
        let mut in_flight = JoinSet::new();
        Arc::new(scheduler).tick(&mut in_flight).await;
        while in_flight.join_next().await.is_some() {}

        let updated = store.get("j1").await.unwrap();
        assert_eq!(updated.consecutive_errors, 1);
        assert!(updated.enabled);
        let expected = Utc::now() + chrono::Duration::seconds(30);
        assert!((updated.next_run_at.unwrap() - expected).num_seconds().abs() < 2);
    }

    #[tokio::test]
    async fn exhausted_one_shot_schedule_disables_job() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JobStore::load(dir.path().join("jobs.json")).await.unwrap());
        let mut at_job = job("j1", ScheduleType::At, "2020-01-01T00:00:00Z");
        at_job.next_run_at = Some(Utc::now() - chrono::Duration::seconds(1));
        store.add(at_job).await.unwrap();

        let runner = Arc::new(ScriptedRunner {
            outcomes: AsyncMutex::new(vec![RunOutcome::Fired]),
            calls: AtomicUsize::new(0),
        });
        let scheduler = Scheduler::new(store.clone(), runner, SchedulerConfig::default());
        let mut in_flight = JoinSet::new();
        Arc::new(scheduler).tick(&mut in_flight).await;
        while in_flight.join_next().await.is_some() {}

        let updated = store.get("j1").await.unwrap();
        assert!(!updated.enabled);
        assert!(updated.next_run_at.is_none());
    }

    #[tokio::test]
    async fn global_semaphore_limits_concurrent_runs_per_tick() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JobStore::load(dir.path().join("jobs.json")).await.unwrap());
        for i in 0..3 {
            store.add(job(&format!("j{i}"), ScheduleType::Every, "5m")).await.unwrap();
        }

        let runner = Arc::new(ScriptedRunner {
            outcomes: AsyncMutex::new(vec![]),
            calls: AtomicUsize::new(0),
        });
        let scheduler = Scheduler::new(
            store.clone(),
            runner.clone(),
            SchedulerConfig {
                max_concurrent_runs: 1,
                job_timeout: Duration::from_secs(5),
            },
        );
        let mut in_flight = JoinSet::new();
        Arc::new(scheduler).tick(&mut in_flight).await;
        while in_flight.join_next().await.is_some() {}

        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
    }
}
