use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, instrument, warn};

use crate::error::{Result, SessionError};
use crate::key::SessionKey;
use crate::types::{ChatMessage, Session};

/// Literal on-disk format tag — a normative data constant, not a naming
/// artifact. Every `meta` record carries it verbatim.
const FORMAT_TAG: &str = "friday-session-jsonl";
const SCHEMA_VERSION: u32 = 1;

pub const DEFAULT_COMPACT_MAX_SIZE: u64 = 4 * 1024 * 1024;
pub const DEFAULT_COMPACT_EVERY: u32 = 20;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_type")]
#[serde(rename_all = "lowercase")]
enum Record {
    Meta {
        session_key: String,
        agent_id: String,
        channel: String,
        channel_id: String,
        chat_id: String,
        created_at: String,
        updated_at: String,
        expire_at: i64,
        msg_count: u32,
        tool_call_count: u32,
        format: String,
        schema: u32,
    },
    Msg {
        msg: ChatMessage,
    },
    /// Forward compatibility: any `_type` we don't recognise is parsed into
    /// this variant and ignored by `Load`.
    #[serde(other)]
    Unknown,
}

/// Crash-safe, concurrent-safe JSONL persistence for Sessions (§4.A).
pub struct SessionStore {
    root: PathBuf,
    compact_max_size: u64,
    compact_every: u32,
    locks: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            compact_max_size: DEFAULT_COMPACT_MAX_SIZE,
            compact_every: DEFAULT_COMPACT_EVERY,
            locks: DashMap::new(),
        }
    }

    pub fn with_compaction(mut self, max_size: u64, every: u32) -> Self {
        self.compact_max_size = max_size;
        self.compact_every = every;
        self
    }

    fn path_for(&self, key: &SessionKey) -> PathBuf {
        let mut hasher = Sha1::new();
        hasher.update(key.format().as_bytes());
        let digest = hasher.finalize();
        self.root.join(format!("{}.jsonl", hex::encode(digest)))
    }

    /// Per-key mutex, lazily allocated. Locks are never removed (bounded-set
    /// assumption, §9 design note).
    fn lock_for(&self, key: &SessionKey) -> Arc<AsyncMutex<()>> {
        self.locks
            .entry(key.format())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    #[instrument(skip(self), fields(session_key = %key))]
    pub async fn load(&self, key: &SessionKey) -> Result<Option<Session>> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;
        self.load_locked(key)
    }

    fn load_locked(&self, key: &SessionKey) -> Result<Option<Session>> {
        let path = self.path_for(key);
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SessionError::Io(e)),
        };

        let mut session = Session::new(key.clone());
        let mut saw_meta = false;
        let mut messages = Vec::new();

        for (lineno, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: Record = serde_json::from_str(line).map_err(|e| SessionError::Corrupt {
                path: path.display().to_string(),
                reason: format!("line {}: {}", lineno + 1, e),
            })?;

            match record {
                Record::Meta {
                    created_at,
                    updated_at,
                    expire_at,
                    msg_count,
                    tool_call_count,
                    ..
                } => {
                    saw_meta = true;
                    session.created_at = created_at;
                    session.updated_at = updated_at;
                    session.expire_at = expire_at;
                    session.msg_count = msg_count;
                    session.tool_call_count = tool_call_count;
                }
                Record::Msg { msg } => messages.push(msg),
                Record::Unknown => {}
            }
        }

        if !saw_meta {
            // A file with no meta record at all is itself corrupt: the spec
            // requires every line to parse, but an empty/meta-less file
            // carries no session identity to resolve.
            return Err(SessionError::Corrupt {
                path: path.display().to_string(),
                reason: "no meta record found".to_string(),
            });
        }

        session.messages = messages;
        session.persisted_msg_count = session.messages.len();
        session.dirty = false;

        let now = chrono::Utc::now().timestamp();
        if session.is_expired(now) {
            let _ = std::fs::remove_file(&path);
            return Ok(None);
        }

        Ok(Some(session))
    }

    #[instrument(skip(self, session), fields(session_key = %session.key))]
    pub async fn save(&self, session: &mut Session) -> Result<()> {
        if !session.dirty {
            return Ok(());
        }

        let lock = self.lock_for(&session.key);
        let _guard = lock.lock().await;

        let version_at_entry = session.version;
        let path = self.path_for(&session.key);

        let existing_size = std::fs::metadata(&path).map(|m| m.len()).ok();
        let force_rewrite = existing_size.is_none()
            || session.persisted_msg_count == 0
            || existing_size.unwrap_or(0) >= self.compact_max_size
            || session.append_saves_since_compact >= self.compact_every;

        if force_rewrite {
            self.rewrite(&path, session)?;
            session.append_saves_since_compact = 0;
        } else {
            self.append(&path, session)?;
            session.append_saves_since_compact += 1;
        }

        session.persisted_msg_count = session.messages.len();
        if session.version == version_at_entry {
            session.dirty = false;
        }

        Ok(())
    }

    fn meta_record(session: &Session) -> Record {
        Record::Meta {
            session_key: session.key.format(),
            agent_id: session.key.agent_id.clone(),
            channel: session.key.channel_type.clone(),
            channel_id: session.key.channel_id.clone(),
            chat_id: session.key.chat_id.clone(),
            created_at: session.created_at.clone(),
            updated_at: session.updated_at.clone(),
            expire_at: session.expire_at,
            msg_count: session.msg_count,
            tool_call_count: session.tool_call_count,
            format: FORMAT_TAG.to_string(),
            schema: SCHEMA_VERSION,
        }
    }

    fn rewrite(&self, path: &Path, session: &Session) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("jsonl.tmp");
        let mut buf = String::new();
        buf.push_str(&serde_json::to_string(&Self::meta_record(session))?);
        buf.push('\n');
        for msg in &session.messages {
            buf.push_str(&serde_json::to_string(&Record::Msg { msg: msg.clone() })?);
            buf.push('\n');
        }

        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(buf.as_bytes())?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, path)?;
        debug!(path = %path.display(), "rewrote session file");
        Ok(())
    }

    fn append(&self, path: &Path, session: &Session) -> Result<()> {
        let mut file = std::fs::OpenOptions::new().append(true).open(path)?;
        let mut buf = String::new();
        buf.push_str(&serde_json::to_string(&Self::meta_record(session))?);
        buf.push('\n');
        for msg in &session.messages[session.persisted_msg_count..] {
            buf.push_str(&serde_json::to_string(&Record::Msg { msg: msg.clone() })?);
            buf.push('\n');
        }
        file.write_all(buf.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    #[instrument(skip(self), fields(session_key = %key))]
    pub async fn delete(&self, key: &SessionKey) -> Result<()> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Io(e)),
        }
    }

    /// Scans the directory, reading only the first `meta` record of every
    /// `*.jsonl` file; removes those whose `expire_at` is set and due.
    /// Per-file errors are ignored — best-effort count returned (§4.A).
    #[instrument(skip(self))]
    pub async fn gc(&self, now: i64) -> usize {
        let mut removed = 0usize;
        let entries = match std::fs::read_dir(&self.root) {
            Ok(e) => e,
            Err(_) => return 0,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            if Self::file_expired(&path, now) {
                if std::fs::remove_file(&path).is_ok() {
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            debug!(removed, "session GC removed expired files");
        }
        removed
    }

    fn file_expired(path: &Path, now: i64) -> bool {
        let Ok(file) = std::fs::File::open(path) else {
            return false;
        };
        use std::io::{BufRead, BufReader};
        let reader = BufReader::with_capacity(4 * 1024 * 1024, file);
        for line in reader.lines() {
            let Ok(line) = line else { return false };
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(Record::Meta { expire_at, .. }) = serde_json::from_str::<Record>(&line) {
                return expire_at != 0 && expire_at <= now;
            }
            // First non-blank line wasn't a meta record we can parse as one;
            // keep scanning only until we've seen *a* record, per spec:
            // "read only until the first meta record".
            return false;
        }
        false
    }
}

/// Used by tests that need to reconstruct session paths without a store
/// instance (e.g. to assert a file exists at the expected SHA1 name).
pub fn path_for_key(root: &Path, key: &SessionKey) -> PathBuf {
    let mut hasher = Sha1::new();
    hasher.update(key.format().as_bytes());
    let digest = hasher.finalize();
    root.join(format!("{}.jsonl", hex::encode(digest)))
}
