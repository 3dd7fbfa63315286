//! Spawn lifecycle: run an agent as a background task behind a handle.
//!
//! States move `Pending → Running ⇄ WaitingForInput → {Completed,
//! Failed, Cancelled}`; terminal states are sticky. Cancelling the
//! parent context cancels the agent; cancelling the token passed to
//! `await_result` only abandons the wait.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::agent::Agent;
use crate::context::ExecContext;
use crate::task::{AgentError, AgentResult, AgentTask};

/// Lifecycle state of a spawned agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentState {
    Pending,
    Running,
    WaitingForInput,
    Completed,
    Failed,
    Cancelled,
}

impl AgentState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentState::Completed | AgentState::Failed | AgentState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Pending => "pending",
            AgentState::Running => "running",
            AgentState::WaitingForInput => "waiting_for_input",
            AgentState::Completed => "completed",
            AgentState::Failed => "failed",
            AgentState::Cancelled => "cancelled",
        }
    }
}

/// Caller-side view of a spawned agent.
pub struct AgentHandle {
    id: String,
    state_rx: watch::Receiver<AgentState>,
    result: Arc<Mutex<Option<AgentResult>>>,
    cancel: CancellationToken,
}

impl AgentHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current state (non-blocking).
    pub fn state(&self) -> AgentState {
        *self.state_rx.borrow()
    }

    /// Wait until the agent reaches a terminal state.
    pub async fn done(&self) {
        let mut rx = self.state_rx.clone();
        while !rx.borrow().is_terminal() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Block for the result. Cancelling `caller` abandons the wait
    /// without cancelling the agent.
    pub async fn await_result(&self, caller: &CancellationToken) -> anyhow::Result<AgentResult> {
        tokio::select! {
            _ = caller.cancelled() => anyhow::bail!("await cancelled"),
            _ = self.done() => {}
        }
        self.result()
            .ok_or_else(|| anyhow::anyhow!("agent finished without a result"))
    }

    /// Best-effort, non-blocking result.
    pub fn result(&self) -> Option<AgentResult> {
        self.result.lock().unwrap().clone()
    }

    /// Cancel the agent's context.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Spawn `agent` on `task` under the parent context.
pub fn spawn(parent: &ExecContext, agent: Arc<dyn Agent>, task: AgentTask) -> AgentHandle {
    let id = oasis_core::utils::new_id();
    let cancel = parent.cancel_token().child_token();
    let (state_tx, state_rx) = watch::channel(AgentState::Pending);
    let state_tx = Arc::new(state_tx);
    let result: Arc<Mutex<Option<AgentResult>>> = Arc::new(Mutex::new(None));

    let ctx = parent
        .child_with_cancel(cancel.clone())
        .with_state(state_tx.clone());
    let result_slot = result.clone();
    let run_id = id.clone();
    let run_cancel = cancel.clone();

    tokio::spawn(async move {
        set_state(&state_tx, AgentState::Running);
        debug!(agent = agent.name(), id = %run_id, "agent started");

        let outcome = tokio::select! {
            _ = run_cancel.cancelled() => Err(AgentError::Cancelled),
            outcome = agent.execute(&ctx, task) => outcome,
        };

        let (agent_result, final_state) = match outcome {
            Ok(output) => (AgentResult::ok(output), AgentState::Completed),
            Err(AgentError::Cancelled) => (
                AgentResult::failed("cancelled"),
                AgentState::Cancelled,
            ),
            Err(e) => (AgentResult::failed(e.to_string()), AgentState::Failed),
        };

        info!(
            agent = agent.name(),
            id = %run_id,
            state = final_state.as_str(),
            "agent finished"
        );
        *result_slot.lock().unwrap() = Some(agent_result);
        set_state(&state_tx, final_state);
    });

    AgentHandle {
        id,
        state_rx,
        result,
        cancel,
    }
}

/// Sticky state transition: terminal states win.
fn set_state(state: &watch::Sender<AgentState>, next: AgentState) {
    state.send_if_modified(|current| {
        if current.is_terminal() {
            false
        } else {
            *current = next;
            true
        }
    });
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Agent completing after an optional delay.
    struct SleepyAgent {
        delay_ms: u64,
        output: String,
    }

    #[async_trait]
    impl Agent for SleepyAgent {
        fn name(&self) -> &str {
            "sleepy"
        }
        fn description(&self) -> &str {
            "sleeps then answers"
        }
        async fn execute(&self, ctx: &ExecContext, _task: AgentTask) -> Result<String, AgentError> {
            tokio::select! {
                _ = ctx.cancel_token().cancelled() => Err(AgentError::Cancelled),
                _ = tokio::time::sleep(Duration::from_millis(self.delay_ms)) => {
                    Ok(self.output.clone())
                }
            }
        }
    }

    struct FailingAgent;

    #[async_trait]
    impl Agent for FailingAgent {
        fn name(&self) -> &str {
            "failing"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        async fn execute(&self, _ctx: &ExecContext, _task: AgentTask) -> Result<String, AgentError> {
            Err(AgentError::Provider("backend down".into()))
        }
    }

    #[tokio::test]
    async fn test_spawn_completes() {
        let ctx = ExecContext::root();
        let handle = spawn(
            &ctx,
            Arc::new(SleepyAgent {
                delay_ms: 5,
                output: "done".into(),
            }),
            AgentTask::new("x"),
        );

        let result = handle.await_result(&CancellationToken::new()).await.unwrap();
        assert_eq!(result.output, "done");
        assert!(result.is_ok());
        assert_eq!(handle.state(), AgentState::Completed);
    }

    #[tokio::test]
    async fn test_failure_is_recorded() {
        let ctx = ExecContext::root();
        let handle = spawn(&ctx, Arc::new(FailingAgent), AgentTask::new("x"));

        let result = handle.await_result(&CancellationToken::new()).await.unwrap();
        assert!(!result.is_ok());
        assert!(result.error.unwrap().contains("backend down"));
        assert_eq!(handle.state(), AgentState::Failed);
    }

    #[tokio::test]
    async fn test_cancel_handle() {
        let ctx = ExecContext::root();
        let handle = spawn(
            &ctx,
            Arc::new(SleepyAgent {
                delay_ms: 10_000,
                output: "never".into(),
            }),
            AgentTask::new("x"),
        );

        handle.cancel();
        handle.done().await;
        assert_eq!(handle.state(), AgentState::Cancelled);
        assert!(!handle.result().unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_parent_context_cancellation_propagates() {
        let ctx = ExecContext::root();
        let handle = spawn(
            &ctx,
            Arc::new(SleepyAgent {
                delay_ms: 10_000,
                output: "never".into(),
            }),
            AgentTask::new("x"),
        );

        ctx.cancel_token().cancel();
        handle.done().await;
        assert_eq!(handle.state(), AgentState::Cancelled);
    }

    #[tokio::test]
    async fn test_await_cancellation_does_not_cancel_agent() {
        let ctx = ExecContext::root();
        let handle = spawn(
            &ctx,
            Arc::new(SleepyAgent {
                delay_ms: 50,
                output: "survived".into(),
            }),
            AgentTask::new("x"),
        );

        let caller = CancellationToken::new();
        caller.cancel();
        assert!(handle.await_result(&caller).await.is_err());

        // The agent keeps running and completes normally.
        handle.done().await;
        assert_eq!(handle.state(), AgentState::Completed);
        assert_eq!(handle.result().unwrap().output, "survived");
    }

    #[tokio::test]
    async fn test_result_nonblocking_before_completion() {
        let ctx = ExecContext::root();
        let handle = spawn(
            &ctx,
            Arc::new(SleepyAgent {
                delay_ms: 200,
                output: "late".into(),
            }),
            AgentTask::new("x"),
        );
        assert!(handle.result().is_none());
        handle.done().await;
        assert!(handle.result().is_some());
    }

    #[test]
    fn test_terminal_states() {
        assert!(AgentState::Completed.is_terminal());
        assert!(AgentState::Failed.is_terminal());
        assert!(AgentState::Cancelled.is_terminal());
        assert!(!AgentState::Running.is_terminal());
        assert!(!AgentState::WaitingForInput.is_terminal());
    }
}
