//! relay-subagent — supervises delegated sub-agent sessions (§4.D).
//!
//! A sub-agent session is a long-running backend child process (a CLI
//! coding agent, a specialised worker) that the agent core delegates work
//! to and polls or waits on. The manager caps the number of concurrently
//! live sessions, bounds their captured output, and guarantees the child
//! is killed on destroy.

pub mod error;
pub mod manager;
pub mod process;
pub mod safety;
pub mod truncate;
pub mod types;

pub use error::{Result, SubAgentError};
pub use manager::SubAgentManager;
pub use process::ProcessHandle;
pub use types::{ProcessResult, SubSession, SubSessionId, SubSessionStatus};

pub(crate) fn now_rfc3339() -> String {
    relay_core::time::now_rfc3339()
}
