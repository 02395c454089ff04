//! Gateway Orchestrator (§4.K): wires every other crate together and owns
//! the process's start/stop lifecycle.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use relay_agent::Agent;
use relay_channels::test_support::InMemoryChannel;
use relay_channels::{Channel, ChannelManager};
use relay_core::config::ChannelEntryConfig;
use relay_core::{AgentId, ChannelType, Message, RelayConfig};
use relay_hooks::{AllowAllHook, SecurityHook};
use relay_providers::ProviderRegistry;
use relay_queue::{MessageHandler, Queue, QueueConfig};
use relay_scheduler::{calc_next_run, Job, JobStore, Scheduler, SchedulerConfig, ScheduleType, SessionTarget};
use relay_sessions::{SessionKey, SessionManager, SessionStore};
use relay_subagent::SubAgentManager;
use relay_tools::builtin::{ExecuteCommandTool, ListFilesTool, ReadFileTool, SearchFilesTool, WriteFileTool};
use relay_tools::ToolRegistry;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::dispatcher::Dispatcher;
use crate::job_runner::{heartbeat_job_id, GatewayJobRunner, COMPACTION_JOB_ID};
use crate::providers::EchoProvider;
use crate::tools::SubAgentTool;

const DEFAULT_SUBAGENT_SESSIONS: usize = 8;
/// Default heartbeat cadence: spec.md names the behaviour without pinning
/// an interval, so each agent's `HEARTBEAT.md` is checked hourly.
const HEARTBEAT_SCHEDULE: &str = "1h";
/// Local hour the nightly compaction job fires at, per §4.K "scheduled
/// daily at a configurable hour (default 03:00 local)".
const COMPACTION_CRON: &str = "0 3 * * *";

pub struct Gateway {
    config: RelayConfig,
    agent_ids: Vec<String>,
    channels: Arc<ChannelManager>,
    queue: Arc<Queue<Message>>,
    scheduler: Arc<Scheduler>,
    http: Mutex<Option<JoinHandle<()>>>,
    run_ctx: CancellationToken,
}

/// Bridges a registered channel's inbound callback to the shared queue,
/// stamping `session_key` from the channel→agent mapping first (§3 "filled
/// in by the router if absent") so the Queue's per-session FIFO lane is
/// keyed by the same identity `Agent::process_message` persists under,
/// not just the raw `chat_id`.
struct QueueEnqueuer {
    queue: Arc<Queue<Message>>,
    channel_agents: HashMap<String, String>,
}

#[async_trait]
impl MessageHandler<Message> for QueueEnqueuer {
    async fn handle(&self, mut msg: Message) {
        if msg.session_key.is_none() {
            if let Some(agent_id) = self.channel_agents.get(&msg.channel_id) {
                let key = SessionKey::new(agent_id.clone(), msg.channel_type.as_str(), msg.channel_id.clone(), msg.chat_id.clone());
                msg.session_key = Some(key.format());
            }
        }
        if let Err(e) = self.queue.enqueue(msg).await {
            warn!(error = %e, "failed to enqueue inbound message");
        }
    }
}

impl Gateway {
    /// Builds every registry and adapter named by `config`, aborting (per
    /// §7 "failure at any step aborts start") on the first error.
    pub async fn start(config: RelayConfig) -> relay_core::Result<Arc<Self>> {
        let tools = Arc::new(ToolRegistry::new());
        register_builtin_tools(&tools).await?;

        let providers = Arc::new(ProviderRegistry::new());
        for (id, entry) in &config.providers {
            providers
                .register(id.clone(), Arc::new(EchoProvider::new(entry.provider_type.clone())))
                .await
                .map_err(|e| relay_core::RelayError::Provider(e.to_string()))?;
            info!(provider_id = id, provider_type = %entry.provider_type, "registered stand-in provider");
        }

        let session_retention_secs = relay_scheduler::parse_every_duration(&config.cronjob.session_retention)
            .map_err(|e| relay_core::RelayError::Config(e.to_string()))?
            .num_seconds();

        let mut agents: HashMap<String, Arc<Agent>> = HashMap::new();
        let mut session_stores: HashMap<String, Arc<SessionStore>> = HashMap::new();
        let mut channel_agents: HashMap<String, String> = HashMap::new();

        for (agent_key, agent_config) in &config.agents {
            let store = Arc::new(SessionStore::new(format!("{}/memory/sessions", agent_config.workspace)));
            let sessions = Arc::new(SessionManager::new(Arc::clone(&store), Some(session_retention_secs)));
            sessions.start_gc_loop(None);

            let agent = Arc::new(Agent::new(
                AgentId::new(agent_key.clone()),
                agent_config.clone(),
                sessions,
                Arc::clone(&tools),
                Arc::clone(&providers),
            ));

            for channel_id in &agent_config.channels {
                channel_agents.insert(channel_id.clone(), agent_key.clone());
            }

            session_stores.insert(agent_key.clone(), store);
            agents.insert(agent_key.clone(), agent);
        }

        let channels = Arc::new(build_channel_manager(&config.channels)?);

        let hook: Arc<dyn SecurityHook> = Arc::new(AllowAllHook);
        let dispatcher = Arc::new(Dispatcher::new(
            agents.clone(),
            channel_agents.clone(),
            Arc::clone(&hook),
            Arc::clone(&channels),
        ));
        let queue: Arc<Queue<Message>> = Arc::new(Queue::new(
            dispatcher,
            QueueConfig {
                max_concurrent: config.gateway.max_concurrent_sessions,
                ..QueueConfig::default()
            },
        ));

        register_channel_handlers(&channels, &config.channels, Arc::clone(&queue), channel_agents).await;

        let run_ctx = CancellationToken::new();
        let channel_tasks = channels.start_all(run_ctx.clone());
        info!(count = channel_tasks.len(), "started channel adapters");

        let job_store = Arc::new(
            JobStore::load(&config.cronjob.store)
                .await
                .map_err(|e| relay_core::RelayError::Scheduler(e.to_string()))?,
        );
        seed_heartbeat_jobs(&job_store, &config, &agents).await?;

        let agent_id_set: std::collections::HashSet<String> = agents.keys().cloned().collect();
        let job_runner = Arc::new(GatewayJobRunner::new(agent_id_set, Arc::clone(&queue), session_stores));
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&job_store),
            job_runner,
            SchedulerConfig {
                max_concurrent_runs: config.cronjob.max_concurrent_runs,
                job_timeout: std::time::Duration::from_secs(config.cronjob.job_timeout_sec),
            },
        ));
        tokio::spawn(Arc::clone(&scheduler).run(run_ctx.child_token()));

        let agent_ids = agents.keys().cloned().collect();
        let gateway = Arc::new(Self {
            config,
            agent_ids,
            channels,
            queue,
            scheduler,
            http: Mutex::new(None),
            run_ctx,
        });

        let http_handle = Arc::clone(&gateway).spawn_http_server().await?;
        *gateway.http.lock().await = Some(http_handle);

        info!("gateway started");
        Ok(gateway)
    }

    /// Idempotent: stops the scheduler run loop, every channel adapter, the
    /// HTTP server, and the message queue's lane workers.
    pub async fn stop(&self) {
        info!("gateway stopping");
        self.run_ctx.cancel();
        self.channels.stop_all(self.run_ctx.clone()).await;
        self.queue.shutdown();

        if let Some(handle) = self.http.lock().await.take() {
            handle.abort();
        }

        info!("gateway stopped");
    }

    pub fn agent_ids(&self) -> Vec<String> {
        self.agent_ids.clone()
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    async fn spawn_http_server(self: Arc<Self>) -> relay_core::Result<JoinHandle<()>> {
        let addr = self.config.gateway.bind.clone();
        let router = crate::http::build_router(Arc::clone(&self));
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| relay_core::RelayError::Internal(format!("failed to bind {addr}: {e}")))?;
        info!(addr, "health endpoint listening");

        let ctx = self.run_ctx.clone();
        Ok(tokio::spawn(async move {
            let serve = axum::serve(listener, router);
            tokio::select! {
                result = serve => {
                    if let Err(e) = result {
                        error!(error = %e, "http server exited with error");
                    }
                }
                _ = ctx.cancelled() => {}
            }
        }))
    }
}

async fn register_builtin_tools(tools: &ToolRegistry) -> relay_core::Result<()> {
    let to_tool_error = |e: relay_tools::ToolError| relay_core::RelayError::Tool(e.to_string());

    tools.register(Arc::new(ReadFileTool)).await.map_err(to_tool_error)?;
    tools.register(Arc::new(WriteFileTool)).await.map_err(to_tool_error)?;
    tools.register(Arc::new(ListFilesTool)).await.map_err(to_tool_error)?;
    tools.register(Arc::new(SearchFilesTool)).await.map_err(to_tool_error)?;
    tools.register(Arc::new(ExecuteCommandTool)).await.map_err(to_tool_error)?;

    let subagents = SubAgentManager::new(DEFAULT_SUBAGENT_SESSIONS);
    tools
        .register(Arc::new(SubAgentTool::new(subagents)))
        .await
        .map_err(to_tool_error)?;

    Ok(())
}

/// Builds every enabled channel named in config. Concrete wire adapters
/// (Telegram, Lark, …) are out of scope; any configured channel entry maps
/// to an [`InMemoryChannel`] so the rest of the pipeline (routing, hook,
/// typing indicator, reply delivery) is fully exercised end to end.
fn build_channel_manager(channels: &HashMap<String, ChannelEntryConfig>) -> relay_core::Result<ChannelManager> {
    let mut manager = ChannelManager::new();
    for (id, entry) in channels {
        if !entry.enabled {
            info!(channel_id = id, "channel disabled in config, skipping");
            continue;
        }
        let channel_type = match entry.channel_type.as_str() {
            "telegram" => ChannelType::Telegram,
            "lark" => ChannelType::Lark,
            "http" => ChannelType::Http,
            other => {
                warn!(channel_id = id, channel_type = other, "unknown channel type, defaulting to http adapter shape");
                ChannelType::Http
            }
        };
        let adapter: Box<dyn Channel + Send + Sync> = Box::new(InMemoryChannel::new(id.clone(), channel_type));
        manager.register(adapter);
    }
    Ok(manager)
}

/// Points every registered channel's inbound callback at the shared queue.
async fn register_channel_handlers(
    channels: &ChannelManager,
    config: &HashMap<String, ChannelEntryConfig>,
    queue: Arc<Queue<Message>>,
    channel_agents: HashMap<String, String>,
) {
    let enqueuer: Arc<dyn MessageHandler<Message>> = Arc::new(QueueEnqueuer { queue, channel_agents });
    for id in config.keys() {
        if let Some(channel) = channels.get(id) {
            channel.lock().await.register_message_handler(Arc::clone(&enqueuer));
        }
    }
}

async fn seed_heartbeat_jobs(
    store: &JobStore,
    config: &RelayConfig,
    agents: &HashMap<String, Arc<Agent>>,
) -> relay_core::Result<()> {
    let now = chrono::Utc::now();
    let to_scheduler_error = |e: relay_scheduler::SchedulerError| relay_core::RelayError::Scheduler(e.to_string());

    for agent_id in agents.keys() {
        let Some(agent_config) = config.agents.get(agent_id) else {
            continue;
        };

        let mut job = Job {
            id: heartbeat_job_id(agent_id),
            name: format!("heartbeat:{agent_id}"),
            agent_id: agent_id.clone(),
            schedule_type: ScheduleType::Every,
            schedule: HEARTBEAT_SCHEDULE.to_string(),
            prompt: String::new(),
            session_target: SessionTarget::Isolated,
            channel_id: None,
            chat_id: None,
            enabled: true,
            last_run_at: None,
            next_run_at: None,
            consecutive_errors: 0,
            created_at: now,
            workspace: Some(agent_config.workspace.clone()),
        };
        job.next_run_at = calc_next_run(&job, now).map_err(to_scheduler_error)?;
        store.add(job).await.map_err(to_scheduler_error)?;
    }

    let mut compaction = Job {
        id: COMPACTION_JOB_ID.to_string(),
        name: "nightly session compaction".to_string(),
        agent_id: agents.keys().next().cloned().unwrap_or_default(),
        schedule_type: ScheduleType::Cron,
        schedule: COMPACTION_CRON.to_string(),
        prompt: String::new(),
        session_target: SessionTarget::Isolated,
        channel_id: None,
        chat_id: None,
        enabled: true,
        last_run_at: None,
        next_run_at: None,
        consecutive_errors: 0,
        created_at: now,
        workspace: None,
    };
    compaction.next_run_at = calc_next_run(&compaction, now).map_err(to_scheduler_error)?;
    store.add(compaction).await.map_err(to_scheduler_error)?;

    Ok(())
}
