//! Schedule tool — creates and lists scheduled actions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use oasis_core::model::{ScheduledAction, ToolStep};
use oasis_core::schedule::{is_valid_schedule, next_run_after};
use oasis_store::Store;

use crate::context::ExecContext;

use super::base::{optional_string, require_string, Tool};

/// Creates scheduled actions the scheduler will run.
pub struct ScheduleActionTool {
    store: Arc<dyn Store>,
}

impl ScheduleActionTool {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ScheduleActionTool {
    fn name(&self) -> &str {
        "schedule_action"
    }

    fn description(&self) -> &str {
        "Schedule an action for later: a cron expression (e.g. '0 9 * * *') \
         for recurring runs or an RFC 3339 timestamp for a one-shot. The \
         action runs the given tool calls and reports the result."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "description": {
                    "type": "string",
                    "description": "What this action does, in one sentence"
                },
                "schedule": {
                    "type": "string",
                    "description": "Cron expression or RFC 3339 timestamp"
                },
                "tool_calls": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "tool": { "type": "string" },
                            "params": { "type": "object" }
                        },
                        "required": ["tool"]
                    },
                    "description": "Tool invocations to run when due"
                },
                "synthesis_prompt": {
                    "type": "string",
                    "description": "Optional prompt for summarising the tool results"
                }
            },
            "required": ["description", "schedule", "tool_calls"]
        })
    }

    async fn execute(
        &self,
        _ctx: &ExecContext,
        params: HashMap<String, Value>,
    ) -> anyhow::Result<String> {
        let description = require_string(&params, "description")?;
        let schedule = require_string(&params, "schedule")?;

        if !is_valid_schedule(&schedule) {
            anyhow::bail!("invalid schedule '{schedule}': expected cron or RFC 3339");
        }
        let next_run = next_run_after(&schedule, Utc::now())
            .ok_or_else(|| anyhow::anyhow!("schedule '{schedule}' never fires in the future"))?;

        let tool_calls: Vec<ToolStep> = params
            .get("tool_calls")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| anyhow::anyhow!("invalid tool_calls: {e}"))?
            .unwrap_or_default();
        if tool_calls.is_empty() {
            anyhow::bail!("at least one tool call is required");
        }

        let mut action = ScheduledAction::new(&description, &schedule, next_run);
        action.tool_calls = tool_calls;
        action.synthesis_prompt = optional_string(&params, "synthesis_prompt");

        self.store.insert_scheduled_action(&action).await?;
        info!(action = %action.id, schedule = %schedule, "scheduled action created");

        Ok(format!(
            "Scheduled \"{description}\" — next run {}.",
            next_run.format("%Y-%m-%d %H:%M UTC")
        ))
    }
}
