//! The security pre-hook interface (§4.K, §1): a trait the Gateway
//! Orchestrator consults for every normal inbound message before
//! slash-command interception and agent dispatch, plus a default
//! allow-all implementation.

pub mod engine;
pub mod error;
pub mod types;

pub use engine::{AllowAllHook, SecurityHook};
pub use error::{HookError, Result};
pub use types::{HookContext, HookDecision};
