use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{channel::Channel, types::ChannelStatus};

/// Minimum delay between restart attempts after a fatal channel error (seconds).
const BACKOFF_BASE_SECS: u64 = 5;
/// Maximum delay between restart attempts (seconds).
const BACKOFF_MAX_SECS: u64 = 300; // 5 minutes
/// Maximum number of restart attempts before giving up on a channel.
const MAX_ATTEMPTS: u32 = 10;
/// Jitter fraction applied to each delay (±10 %).
const JITTER_FRACTION: f64 = 0.10;

/// Manages a collection of channel adapters and drives each one's receive
/// loop on its own task for the lifetime of a parent [`CancellationToken`].
///
/// Channels are stored by their [`Channel::id`]. A channel whose `start`
/// returns an error before the parent context is cancelled is restarted
/// with exponential backoff and jitter, up to [`MAX_ATTEMPTS`] times.
pub struct ChannelManager {
    channels: HashMap<String, Arc<Mutex<Box<dyn Channel + Send + Sync>>>>,
}

impl ChannelManager {
    /// Create an empty manager with no registered channels.
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }

    /// Register a channel adapter. If one with the same id is already
    /// registered it is replaced.
    pub fn register(&mut self, channel: Box<dyn Channel + Send + Sync>) {
        let id = channel.id().to_string();
        info!(channel = %id, "registering channel adapter");
        self.channels.insert(id, Arc::new(Mutex::new(channel)));
    }

    /// Spawn every registered channel's receive loop. Each task restarts its
    /// channel with backoff on a fatal error and exits cleanly once `ctx`
    /// is cancelled.
    pub fn start_all(&self, ctx: CancellationToken) -> Vec<tokio::task::JoinHandle<()>> {
        self.channels
            .iter()
            .map(|(id, channel)| {
                let id = id.clone();
                let channel = Arc::clone(channel);
                let ctx = ctx.clone();
                tokio::spawn(async move { run_with_backoff(&id, channel, ctx).await })
            })
            .collect()
    }

    /// Ask every registered channel to stop. Errors are logged but do not
    /// abort stopping the remaining channels.
    pub async fn stop_all(&self, ctx: CancellationToken) {
        for (id, channel) in self.channels.iter() {
            info!(channel = %id, "stopping channel");
            let mut guard = channel.lock().await;
            if let Err(e) = guard.stop(ctx.clone()).await {
                warn!(channel = %id, error = %e, "error while stopping channel");
            }
        }
    }

    /// Return a clone of the named channel's handle, if registered.
    pub fn get(&self, id: &str) -> Option<Arc<Mutex<Box<dyn Channel + Send + Sync>>>> {
        self.channels.get(id).cloned()
    }

    /// Return the current [`ChannelStatus`] for every registered channel,
    /// sorted by id for deterministic output.
    pub async fn statuses(&self) -> Vec<(String, ChannelStatus)> {
        let mut result = Vec::with_capacity(self.channels.len());
        for (id, channel) in self.channels.iter() {
            let status = channel.lock().await.status();
            result.push((id.clone(), status));
        }
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Drive one channel's `start` loop, restarting with backoff on a fatal
/// error until `ctx` is cancelled or [`MAX_ATTEMPTS`] is exhausted.
async fn run_with_backoff(
    id: &str,
    channel: Arc<Mutex<Box<dyn Channel + Send + Sync>>>,
    ctx: CancellationToken,
) {
    let mut delay_secs = BACKOFF_BASE_SECS;

    for attempt in 1..=MAX_ATTEMPTS {
        let result = channel.lock().await.start(ctx.clone()).await;

        if ctx.is_cancelled() {
            info!(channel = %id, "channel stopped (context cancelled)");
            return;
        }

        match result {
            Ok(()) => {
                // start() returned cleanly without the context being
                // cancelled; treat as a benign exit, nothing to restart.
                return;
            }
            Err(e) if attempt == MAX_ATTEMPTS => {
                error!(channel = %id, error = %e, "channel failed after max restart attempts, giving up");
                return;
            }
            Err(e) => {
                let jitter = jitter_secs(delay_secs);
                let total = delay_secs + jitter;
                warn!(
                    channel = %id,
                    attempt,
                    max = MAX_ATTEMPTS,
                    error = %e,
                    retry_after_secs = total,
                    "channel start failed, restarting with backoff"
                );
                sleep(Duration::from_secs(total)).await;
                delay_secs = (delay_secs * 2).min(BACKOFF_MAX_SECS);
            }
        }
    }
}

/// Return a jitter offset (0 … `JITTER_FRACTION * base_secs`) as integer
/// seconds, derived from the current timestamp to avoid a rand dependency.
fn jitter_secs(base_secs: u64) -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);

    let max_jitter = ((base_secs as f64) * JITTER_FRACTION) as u64;
    if max_jitter == 0 {
        return 0;
    }
    (nanos as u64) % max_jitter
}
