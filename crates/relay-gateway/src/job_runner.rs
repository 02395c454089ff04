//! Implements [`relay_scheduler::JobRunner`]: the seam that lets the
//! Scheduler fire a due job without depending on the agent or channel
//! layers directly. A fired job is turned into a synthetic cron-typed
//! [`Message`] and handed to the same [`relay_queue::Queue`] that channel
//! adapters feed (§1 "fed by channel adapters and by the scheduler", §4.J
//! step 3 "calls `enqueue(msg)`"), so it serializes through the owning
//! session's lane exactly like a live chat turn and the `Dispatcher`'s
//! cron branch (not this module) is what actually calls the agent and
//! delivers the reply.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use relay_core::{ChannelType, Message};
use relay_queue::Queue;
use relay_scheduler::{is_heartbeat_job_id, Job, JobRunner, RunOutcome, SessionTarget};
use relay_sessions::{SessionKey, SessionStore};
use tracing::debug;

/// Id of the single nightly compaction job registered at startup alongside
/// the per-agent heartbeat jobs (§4.K). Heartbeat-prefixed (re-derived at
/// every startup, never persisted across restarts) but non-enqueuing — it
/// calls `SessionStore::gc` directly, once per agent's session store,
/// rather than dispatching a synthetic message to an agent.
pub const COMPACTION_JOB_ID: &str = "heartbeat:compaction";

/// Metadata key the `Dispatcher`'s cron branch checks: only present when
/// the job has an explicit `channelId`, matching spec.md §4.K "no channel
/// send unless `channelId` is set".
pub const CRON_DELIVER_METADATA_KEY: &str = "cron_deliver";

pub fn heartbeat_job_id(agent_id: &str) -> String {
    format!("heartbeat:{agent_id}")
}

pub struct GatewayJobRunner {
    agent_ids: HashSet<String>,
    queue: Arc<Queue<Message>>,
    sessions: HashMap<String, Arc<SessionStore>>,
}

impl GatewayJobRunner {
    pub fn new(
        agent_ids: HashSet<String>,
        queue: Arc<Queue<Message>>,
        sessions: HashMap<String, Arc<SessionStore>>,
    ) -> Self {
        Self { agent_ids, queue, sessions }
    }

    fn build_message(&self, job: &Job, content: String) -> Message {
        let (channel_id, chat_id, deliverable) = match job.session_target {
            SessionTarget::Isolated => ("cron".to_string(), job.id.clone(), false),
            SessionTarget::Main => {
                let channel_id = job.channel_id.clone().unwrap_or_else(|| "cron".to_string());
                let chat_id = job.chat_id.clone().unwrap_or_else(|| job.id.clone());
                let deliverable = job.channel_id.is_some();
                (channel_id, chat_id, deliverable)
            }
        };

        let session_key = SessionKey::new(job.agent_id.clone(), ChannelType::Cron.as_str(), channel_id.clone(), chat_id.clone());

        let mut message = Message::new(
            format!("cron:{}", job.id),
            channel_id,
            ChannelType::Cron,
            "cron",
            chat_id,
            content,
        );
        message.session_key = Some(session_key.format());
        message.metadata.insert("cron_job_id".to_string(), job.id.clone());
        message.metadata.insert("cron_job_name".to_string(), job.name.clone());
        message.metadata.insert("agent_id".to_string(), job.agent_id.clone());
        if deliverable {
            message.metadata.insert(CRON_DELIVER_METADATA_KEY.to_string(), "1".to_string());
        }
        message
    }
}

#[async_trait]
impl JobRunner for GatewayJobRunner {
    async fn run(&self, job: &Job) -> RunOutcome {
        if job.id == COMPACTION_JOB_ID {
            let now = chrono::Utc::now().timestamp();
            let mut removed = 0usize;
            for (agent_id, store) in &self.sessions {
                let count = store.gc(now).await;
                if count > 0 {
                    debug!(agent_id, count, "nightly session compaction pass");
                }
                removed += count;
            }
            debug!(removed, "nightly session compaction pass complete");
            return RunOutcome::Fired;
        }

        if !self.agent_ids.contains(&job.agent_id) {
            return RunOutcome::Failed(format!("unknown agent: {}", job.agent_id));
        }

        let content = if is_heartbeat_job_id(&job.id) {
            let Some(workspace) = job.workspace.as_deref() else {
                return RunOutcome::Failed("heartbeat job is missing its workspace".to_string());
            };
            match relay_agent::build_heartbeat_prompt(Path::new(workspace)) {
                Some(prompt) => prompt,
                None => return RunOutcome::NoWork,
            }
        } else {
            job.prompt.clone()
        };

        let message = self.build_message(job, content);

        match self.queue.enqueue(message).await {
            Ok(()) => RunOutcome::Fired,
            Err(e) => RunOutcome::Failed(e.to_string()),
        }
    }
}
