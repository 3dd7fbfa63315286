//! Execution context threaded through every agent boundary.
//!
//! Carries the cancellation token, the inherited input handler, and a
//! hook back to the spawning handle's state. Sub-agents get a child
//! context: child cancellation follows the parent, handlers are
//! inherited unless overridden.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::handle::AgentState;
use crate::input::InputHandler;

/// Per-execution context. Cheap to clone.
#[derive(Clone)]
pub struct ExecContext {
    cancel: CancellationToken,
    input_handler: Option<Arc<dyn InputHandler>>,
    state: Option<Arc<watch::Sender<AgentState>>>,
}

impl ExecContext {
    /// A root context with a fresh cancellation token.
    pub fn root() -> Self {
        ExecContext {
            cancel: CancellationToken::new(),
            input_handler: None,
            state: None,
        }
    }

    /// A child context: cancellation chains to the parent, the handler
    /// is inherited, the state hook is not.
    pub fn child(&self) -> Self {
        self.child_with_cancel(self.cancel.child_token())
    }

    /// A child context bound to an explicit (already-derived) token.
    pub(crate) fn child_with_cancel(&self, cancel: CancellationToken) -> Self {
        ExecContext {
            cancel,
            input_handler: self.input_handler.clone(),
            state: None,
        }
    }

    pub fn with_input_handler(mut self, handler: Arc<dyn InputHandler>) -> Self {
        self.input_handler = Some(handler);
        self
    }

    pub(crate) fn with_state(mut self, state: Arc<watch::Sender<AgentState>>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn input_handler(&self) -> Option<Arc<dyn InputHandler>> {
        self.input_handler.clone()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Flip the owning handle between Running and WaitingForInput.
    /// Terminal states are sticky and never overwritten.
    pub fn set_state(&self, next: AgentState) {
        if let Some(state) = &self.state {
            state.send_if_modified(|current| {
                if current.is_terminal() || *current == next {
                    false
                } else {
                    *current = next;
                    true
                }
            });
        }
    }
}

impl std::fmt::Debug for ExecContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecContext")
            .field("cancelled", &self.is_cancelled())
            .field("has_input_handler", &self.input_handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{InputRequest, InputResponse};
    use async_trait::async_trait;

    struct NullHandler;

    #[async_trait]
    impl InputHandler for NullHandler {
        async fn request(&self, _request: InputRequest) -> anyhow::Result<InputResponse> {
            Ok(InputResponse { value: "ok".into() })
        }
    }

    #[test]
    fn test_child_inherits_handler() {
        let ctx = ExecContext::root().with_input_handler(Arc::new(NullHandler));
        let child = ctx.child();
        assert!(child.input_handler().is_some());
    }

    #[test]
    fn test_child_cancellation_follows_parent() {
        let ctx = ExecContext::root();
        let child = ctx.child();
        assert!(!child.is_cancelled());
        ctx.cancel_token().cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_child_cancellation_does_not_escape() {
        let ctx = ExecContext::root();
        let child = ctx.child();
        child.cancel_token().cancel();
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn test_set_state_without_hook_is_noop() {
        ExecContext::root().set_state(AgentState::WaitingForInput);
    }
}
