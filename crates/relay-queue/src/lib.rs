//! Message Queue (§4.G): per-`sessionKey` FIFO lanes plus one global
//! `maxConcurrent` semaphore.
//!
//! A lane is a buffered channel with a dedicated background worker; lanes
//! are created lazily on first use and never torn down (accepted
//! trade-off, §9 open question #2). At most one message per session key
//! is ever being handled at a time; across all lanes, at most
//! `max_concurrent` handlers run concurrently.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use relay_core::Message;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Enqueue failures — currently just a lane whose worker has already exited
/// (e.g. mid-shutdown). The scheduler's `JobRunner` bridge treats this as a
/// failed run and drives the backoff ladder (§4.J step 3).
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("lane worker for session '{0}' is gone, message dropped")]
    LaneClosed(String),
}

/// Anything enqueueable must expose the session key its lane is keyed by.
pub trait Keyed {
    fn session_key(&self) -> &str;
}

impl Keyed for Message {
    /// The router fills `session_key` before enqueueing; falling back to
    /// `chat_id` here only guards against a caller that skips that step.
    fn session_key(&self) -> &str {
        self.session_key.as_deref().unwrap_or(&self.chat_id)
    }
}

/// The Gateway-supplied dispatcher. Called once per dequeued message, with
/// the global concurrency slot already held for the duration of the call.
#[async_trait]
pub trait MessageHandler<M>: Send + Sync
where
    M: Send + 'static,
{
    async fn handle(&self, msg: M);
}

#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    /// Buffered channel capacity per lane.
    pub lane_buffer: usize,
    /// Global cap on concurrently running handlers across all lanes.
    pub max_concurrent: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            lane_buffer: 10,
            max_concurrent: 4,
        }
    }
}

/// Owns every lane and the global concurrency semaphore.
pub struct Queue<M>
where
    M: Keyed + Send + 'static,
{
    lanes: DashMap<String, mpsc::Sender<M>>,
    semaphore: Arc<Semaphore>,
    handler: Arc<dyn MessageHandler<M>>,
    lane_buffer: usize,
    cancel: CancellationToken,
}

impl<M> Queue<M>
where
    M: Keyed + Send + 'static,
{
    pub fn new(handler: Arc<dyn MessageHandler<M>>, config: QueueConfig) -> Self {
        Self {
            lanes: DashMap::new(),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            handler,
            lane_buffer: config.lane_buffer.max(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Enqueue `msg` onto the lane for its session key, creating the lane
    /// if this is the first message seen for that key. Blocks (does not
    /// busy-wait) while the lane buffer is full.
    pub async fn enqueue(&self, msg: M) -> Result<(), QueueError> {
        let key = msg.session_key().to_string();
        let tx = self.lane_sender(&key);
        if tx.send(msg).await.is_err() {
            warn!(session_key = %key, "lane worker gone, message dropped");
            return Err(QueueError::LaneClosed(key));
        }
        Ok(())
    }

    /// Cancels every lane worker. In-flight handler calls finish their
    /// current message (best-effort); new sends after this point are
    /// dropped silently since no worker remains to drain them.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn lane_sender(&self, key: &str) -> mpsc::Sender<M> {
        if let Some(tx) = self.lanes.get(key) {
            return tx.clone();
        }

        self.lanes
            .entry(key.to_string())
            .or_insert_with(|| {
                let (tx, rx) = mpsc::channel(self.lane_buffer);
                debug!(session_key = key, "created new lane");
                self.spawn_lane_worker(key.to_string(), rx);
                tx
            })
            .clone()
    }

    fn spawn_lane_worker(&self, key: String, mut rx: mpsc::Receiver<M>) {
        let semaphore = Arc::clone(&self.semaphore);
        let handler = Arc::clone(&self.handler);
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            loop {
                let msg = tokio::select! {
                    _ = cancel.cancelled() => break,
                    msg = rx.recv() => msg,
                };

                let Some(msg) = msg else { break };

                let permit = tokio::select! {
                    _ = cancel.cancelled() => break,
                    permit = semaphore.clone().acquire_owned() => permit,
                };

                if let Ok(permit) = permit {
                    handler.handle(msg).await;
                    drop(permit);
                }
            }
            debug!(session_key = %key, "lane worker exited");
        });
    }
}
