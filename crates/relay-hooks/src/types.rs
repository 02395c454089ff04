use relay_core::Message;

/// The decision a [`crate::SecurityHook`] returns for an inbound message,
/// consulted by the Gateway Orchestrator's dispatcher before a normal
/// message is routed to its bound agent (§4.K).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookDecision {
    /// Let the message proceed to slash-command interception / agent dispatch.
    Allow,
    /// Stop the message here; it is never routed or replied to.
    Block { reason: String },
}

impl HookDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, HookDecision::Allow)
    }
}

/// What a [`crate::SecurityHook`] inspects to make its decision. Mirrors the
/// subset of [`Message`] a real ACL/pairing policy would need without
/// forcing the hook to depend on the full pipeline.
#[derive(Debug, Clone)]
pub struct HookContext<'a> {
    pub message: &'a Message,
}

impl<'a> HookContext<'a> {
    pub fn new(message: &'a Message) -> Self {
        Self { message }
    }
}
