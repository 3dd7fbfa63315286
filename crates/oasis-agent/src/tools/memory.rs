//! Memory tools — recall through the hybrid retriever, remember via
//! the ingestion pipeline.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use oasis_memory::{HybridRetriever, Ingestor};
use oasis_store::{ChunkFilter, FilterField};

use crate::context::ExecContext;

use super::base::{optional_i64, optional_string, require_string, Tool};

const DEFAULT_TOP_K: usize = 5;

// ─────────────────────────────────────────────
// RecallMemoryTool
// ─────────────────────────────────────────────

/// Searches long-term memory (ingested documents and notes).
pub struct RecallMemoryTool {
    retriever: std::sync::Arc<HybridRetriever>,
}

impl RecallMemoryTool {
    pub fn new(retriever: std::sync::Arc<HybridRetriever>) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl Tool for RecallMemoryTool {
    fn name(&self) -> &str {
        "recall_memory"
    }

    fn description(&self) -> &str {
        "Search long-term memory (ingested documents, notes, past facts) \
         and return the most relevant passages with related context."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to look for"
                },
                "top_k": {
                    "type": "integer",
                    "description": "How many passages to return (default 5)",
                    "minimum": 1,
                    "maximum": 20
                },
                "source": {
                    "type": "string",
                    "description": "Restrict to a single source URI"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        _ctx: &ExecContext,
        params: HashMap<String, Value>,
    ) -> anyhow::Result<String> {
        let query = require_string(&params, "query")?;
        let top_k = optional_i64(&params, "top_k")
            .unwrap_or(DEFAULT_TOP_K as i64)
            .clamp(1, 20) as usize;

        let mut filters = Vec::new();
        if let Some(source) = optional_string(&params, "source") {
            filters.push(ChunkFilter::eq(FilterField::Source, source));
        }

        debug!(query = %query, top_k, "recalling memory");
        let results = self.retriever.retrieve(&query, top_k, &filters).await?;
        if results.is_empty() {
            return Ok("No relevant memories found.".into());
        }

        let mut out = Vec::new();
        for (i, result) in results.iter().enumerate() {
            let mut entry = format!("{}. (score {:.3}) {}", i + 1, result.score, result.content);
            for context in &result.graph_context {
                entry.push_str(&format!(
                    "\n   related ({}): {}",
                    context.relation.as_str(),
                    context.description
                ));
            }
            out.push(entry);
        }
        Ok(out.join("\n\n"))
    }
}

// ─────────────────────────────────────────────
// RememberTool
// ─────────────────────────────────────────────

/// Stores a note in long-term memory.
pub struct RememberTool {
    ingestor: std::sync::Arc<Ingestor>,
}

impl RememberTool {
    pub fn new(ingestor: std::sync::Arc<Ingestor>) -> Self {
        Self { ingestor }
    }
}

#[async_trait]
impl Tool for RememberTool {
    fn name(&self) -> &str {
        "remember"
    }

    fn description(&self) -> &str {
        "Store a note or fact in long-term memory so it can be recalled later."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "The text to remember"
                },
                "title": {
                    "type": "string",
                    "description": "Optional short title for the note"
                }
            },
            "required": ["content"]
        })
    }

    async fn execute(
        &self,
        _ctx: &ExecContext,
        params: HashMap<String, Value>,
    ) -> anyhow::Result<String> {
        let content = require_string(&params, "content")?;
        let title = optional_string(&params, "title")
            .unwrap_or_else(|| oasis_core::utils::truncate_string(&content, 48));

        let report = self
            .ingestor
            .ingest_text(&title, &format!("note://{}", oasis_core::utils::new_id()), &content)
            .await?;

        Ok(format!(
            "Remembered \"{}\" ({} chunk{}).",
            report.title,
            report.chunk_count,
            if report.chunk_count == 1 { "" } else { "s" }
        ))
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
