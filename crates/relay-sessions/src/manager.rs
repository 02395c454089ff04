use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::error::Result;
use crate::key::SessionKey;
use crate::store::SessionStore;
use crate::types::Session;

const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(600);

/// In-memory `sessionKey -> Session` cache over the `SessionStore` (§4.B).
pub struct SessionManager {
    store: Arc<SessionStore>,
    live: DashMap<String, Arc<AsyncMutex<Session>>>,
    ttl_secs: Option<i64>,
}

impl SessionManager {
    pub fn new(store: Arc<SessionStore>, ttl_secs: Option<i64>) -> Self {
        Self {
            store,
            live: DashMap::new(),
            ttl_secs,
        }
    }

    /// Returns the live entry if present and not expired; otherwise loads
    /// from the store (inserting on success); otherwise constructs a fresh
    /// session from the key's own fields.
    #[instrument(skip(self), fields(session_key = %key))]
    pub async fn get_or_create(&self, key: &SessionKey) -> Result<Arc<AsyncMutex<Session>>> {
        let now = chrono::Utc::now().timestamp();

        if let Some(entry) = self.live.get(&key.format()) {
            let handle = entry.clone();
            let is_expired = { handle.lock().await.is_expired(now) };
            if !is_expired {
                return Ok(handle);
            }
            drop(entry);
            self.live.remove(&key.format());
        }

        // Race-safe load-or-store: if two callers race here, both may load
        // the same on-disk session; `entry(..).or_insert_with` makes only
        // the winner's handle visible, the loser's load is simply discarded.
        if let Some(loaded) = self.store.load(key).await? {
            let handle = Arc::new(AsyncMutex::new(loaded));
            let handle = self.live.entry(key.format()).or_insert_with(|| handle).clone();
            return Ok(handle);
        }

        let fresh = Session::new(key.clone());
        let handle = Arc::new(AsyncMutex::new(fresh));
        let handle = self.live.entry(key.format()).or_insert_with(|| handle).clone();
        Ok(handle)
    }

    /// Refreshes the TTL (only marking dirty if it changed) and delegates to
    /// the store.
    #[instrument(skip(self, session))]
    pub async fn save(&self, session: &mut Session) -> Result<()> {
        if let Some(ttl) = self.ttl_secs {
            let new_expiry = chrono::Utc::now().timestamp() + ttl;
            session.set_expire_at(new_expiry);
        }
        self.store.save(session).await
    }

    #[instrument(skip(self), fields(session_key = %key))]
    pub async fn delete(&self, key: &SessionKey) -> Result<()> {
        self.live.remove(&key.format());
        self.store.delete(key).await
    }

    /// Spawns a cooperative background task that ticks every `interval`
    /// (default 10 min) calling `store.gc`. Returns a token the caller can
    /// cancel to stop the loop.
    pub fn start_gc_loop(self: &Arc<Self>, interval: Option<Duration>) -> CancellationToken {
        let token = CancellationToken::new();
        let child = token.clone();
        let store = self.store.clone();
        let interval = interval.unwrap_or(DEFAULT_GC_INTERVAL);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = child.cancelled() => {
                        info!("session GC loop stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let now = chrono::Utc::now().timestamp();
                        let removed = store.gc(now).await;
                        if removed > 0 {
                            info!(removed, "session GC pass removed expired sessions");
                        }
                    }
                }
            }
        });

        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;

    fn manager() -> (tempfile::TempDir, SessionManager) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStore::new(dir.path()));
        (dir, SessionManager::new(store, None))
    }

    #[tokio::test]
    async fn get_or_create_returns_fresh_session_when_absent() {
        let (_dir, mgr) = manager();
        let key = SessionKey::new("main", "telegram", "tg1", "100");
        let handle = mgr.get_or_create(&key).await.unwrap();
        let session = handle.lock().await;
        assert_eq!(session.key, key);
        assert!(session.messages.is_empty());
    }

    #[tokio::test]
    async fn get_or_create_returns_same_live_handle_on_repeat() {
        let (_dir, mgr) = manager();
        let key = SessionKey::new("main", "telegram", "tg1", "100");
        let a = mgr.get_or_create(&key).await.unwrap();
        {
            let mut session = a.lock().await;
            session.append(ChatMessage::user("hi"));
        }
        let b = mgr.get_or_create(&key).await.unwrap();
        assert_eq!(b.lock().await.messages.len(), 1);
    }

    #[tokio::test]
    async fn save_then_reload_round_trips_after_eviction() {
        let (_dir, mgr) = manager();
        let key = SessionKey::new("main", "telegram", "tg1", "100");
        let handle = mgr.get_or_create(&key).await.unwrap();
        {
            let mut session = handle.lock().await;
            session.append(ChatMessage::user("hi"));
            mgr.save(&mut session).await.unwrap();
        }

        mgr.live.remove(&key.format());
        let reloaded = mgr.get_or_create(&key).await.unwrap();
        assert_eq!(reloaded.lock().await.messages.len(), 1);
    }
}
