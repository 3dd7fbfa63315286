//! The scheduler loop.
//!
//! Every poll interval: read `enabled AND next_run <= now` rows, run
//! each action's tool steps through the registry, feed the results to
//! the chat provider with the action's synthesis prompt, deliver the
//! report, and advance `next_run` (one-shots are disabled instead).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use oasis_agent::tools::ToolRegistry;
use oasis_agent::ExecContext;
use oasis_core::model::ScheduledAction;
use oasis_core::schedule::{is_one_shot, next_run_after};
use oasis_core::types::{ChatMessage, ChatRequest};
use oasis_providers::ChatProvider;
use oasis_store::Store;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Delivers a finished action's report to the user.
#[async_trait]
pub trait ActionNotifier: Send + Sync {
    async fn notify(&self, text: &str) -> anyhow::Result<()>;
}

/// Runs due scheduled actions.
pub struct SchedulerService {
    store: Arc<dyn Store>,
    provider: Arc<dyn ChatProvider>,
    model: String,
    tools: Arc<ToolRegistry>,
    notifier: Arc<dyn ActionNotifier>,
    poll_interval: Duration,
}

impl SchedulerService {
    pub fn new(
        store: Arc<dyn Store>,
        provider: Arc<dyn ChatProvider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        notifier: Arc<dyn ActionNotifier>,
    ) -> Self {
        SchedulerService {
            store,
            provider,
            model: model.into(),
            tools,
            notifier,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Poll until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(interval = ?self.poll_interval, "scheduler started");
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("scheduler stopping");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        warn!(error = %e, "scheduler tick failed");
                    }
                }
            }
        }
    }

    /// Run all currently due actions once.
    pub async fn tick(&self) -> anyhow::Result<()> {
        let due = self.store.due_scheduled_actions(Utc::now()).await?;
        if due.is_empty() {
            return Ok(());
        }
        debug!(due = due.len(), "running due actions");

        for action in due {
            if let Err(e) = self.run_action(&action).await {
                warn!(action = %action.id, error = %e, "scheduled action failed");
            }
            self.advance(action).await?;
        }
        Ok(())
    }

    async fn run_action(&self, action: &ScheduledAction) -> anyhow::Result<()> {
        info!(action = %action.id, description = %action.description, "running scheduled action");
        let ctx = ExecContext::root();

        let mut results = Vec::new();
        for step in &action.tool_calls {
            let params: HashMap<String, serde_json::Value> = step
                .params
                .as_object()
                .map(|o| o.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default();
            let result = self.tools.execute(&ctx, &step.tool, params).await;
            results.push(format!("{}:\n{}", step.tool, result));
        }
        let combined = results.join("\n\n");

        let report = match &action.synthesis_prompt {
            Some(prompt) => {
                let request = ChatRequest::new(
                    self.model.clone(),
                    vec![
                        ChatMessage::system(prompt),
                        ChatMessage::user(format!(
                            "Task: {}\n\nTool results:\n{combined}",
                            action.description
                        )),
                    ],
                );
                let response = self.provider.chat(&request).await;
                match response.error {
                    // A synthesis failure still delivers the raw results.
                    Some(error) => {
                        warn!(action = %action.id, error = %error, "synthesis failed");
                        combined
                    }
                    None => response.content.unwrap_or(combined),
                }
            }
            None => combined,
        };

        self.notifier.notify(&report).await
    }

    /// Advance `next_run`, or disable one-shots and dead schedules.
    async fn advance(&self, mut action: ScheduledAction) -> anyhow::Result<()> {
        if is_one_shot(&action.schedule) {
            action.enabled = false;
        } else {
            match next_run_after(&action.schedule, Utc::now()) {
                Some(next) => action.next_run = next,
                None => {
                    warn!(action = %action.id, "schedule yields no future run, disabling");
                    action.enabled = false;
                }
            }
        }
        self.store.update_scheduled_action(&action).await?;
        Ok(())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
