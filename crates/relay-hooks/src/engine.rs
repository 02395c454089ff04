use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::types::{HookContext, HookDecision};

/// The security pre-hook (§1 "Security/ACL/pairing policy (a pre-filter
/// hook only)", §4.K): consulted by the dispatcher for every normal
/// (non-cron) message before slash-command interception and agent
/// dispatch. Full ACL/pairing policy is out of scope here — this crate
/// owns only the seam a real policy would plug into.
#[async_trait]
pub trait SecurityHook: Send + Sync {
    async fn check(&self, ctx: &HookContext<'_>) -> Result<HookDecision>;
}

/// The default implementation: every message is allowed through. Used when
/// no ACL/pairing policy is configured, and in tests that don't exercise
/// hook behaviour.
pub struct AllowAllHook;

#[async_trait]
impl SecurityHook for AllowAllHook {
    async fn check(&self, ctx: &HookContext<'_>) -> Result<HookDecision> {
        debug!(message_id = %ctx.message.id, "security hook: allow-all default");
        Ok(HookDecision::Allow)
    }
}
