//! Agent Core (§4.F): system prompt assembly, the reason-act loop, the
//! fallback cascade across configured models, and the heartbeat trigger
//! used by the scheduler's per-agent heartbeat jobs.

pub mod agent;
pub mod error;
pub mod heartbeat;
pub mod prompt;
pub mod run_loop;

pub use agent::Agent;
pub use error::{AgentError, Result};
pub use heartbeat::build_heartbeat_prompt;
pub use prompt::{PromptBuilder, RuntimeContext};
pub use run_loop::{effective_max_iterations, run_loop, run_loop_with_cap, LoopOutcome};
