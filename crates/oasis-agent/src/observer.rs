//! Usage observer — a PostLLM processor accumulating token counts and
//! dollar cost from the configured pricing.

use std::sync::Mutex;

use async_trait::async_trait;

use oasis_core::config::schema::PricingConfig;
use oasis_core::types::ChatResponse;

use crate::processor::{Hooks, Processor, ProcessorError};

/// Accumulated usage across observed LLM calls.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UsageTotals {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub calls: u64,
    /// Dollar cost at the configured per-million-token pricing.
    pub cost: f64,
}

/// Observes responses and tallies usage; read via `snapshot()`.
pub struct UsageObserver {
    pricing: PricingConfig,
    totals: Mutex<UsageTotals>,
}

impl UsageObserver {
    pub fn new(pricing: PricingConfig) -> Self {
        UsageObserver {
            pricing,
            totals: Mutex::new(UsageTotals::default()),
        }
    }

    pub fn snapshot(&self) -> UsageTotals {
        *self.totals.lock().unwrap()
    }
}

#[async_trait]
impl Processor for UsageObserver {
    fn name(&self) -> &str {
        "usage-observer"
    }

    fn hooks(&self) -> Hooks {
        Hooks::POST_LLM
    }

    async fn post_llm(&self, response: &mut ChatResponse) -> Result<(), ProcessorError> {
        let Some(usage) = &response.usage else {
            return Ok(());
        };

        let call_cost = usage.prompt_tokens as f64 * self.pricing.input / 1_000_000.0
            + usage.completion_tokens as f64 * self.pricing.output / 1_000_000.0;

        let mut totals = self.totals.lock().unwrap();
        totals.prompt_tokens += usage.prompt_tokens as u64;
        totals.completion_tokens += usage.completion_tokens as u64;
        totals.calls += 1;
        totals.cost += call_cost;

        tracing::info!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            call_cost,
            total_cost = totals.cost,
            "llm usage"
        );
        Ok(())
    }
}
