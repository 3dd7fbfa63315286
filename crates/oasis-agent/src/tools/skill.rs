//! Skill tool — create, update, fetch, and find stored skills.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use oasis_core::model::Skill;
use oasis_providers::EmbeddingProvider;
use oasis_store::Store;

use crate::context::ExecContext;

use super::base::{optional_string, optional_string_list, require_string, Tool};

/// Manages the skill library: instruction packages with tool presets
/// that specialise an agent for a recurring job.
pub struct SkillTool {
    store: Arc<dyn Store>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SkillTool {
    pub fn new(store: Arc<dyn Store>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    async fn save(
        &self,
        params: &HashMap<String, Value>,
        created_by: &str,
    ) -> anyhow::Result<String> {
        let name = require_string(params, "name")?;
        let description = require_string(params, "description")?;
        let instructions = require_string(params, "instructions")?;

        let mut skill = match self.store.get_skill_by_name(&name).await? {
            Some(mut existing) => {
                existing.description = description.clone();
                existing.instructions = instructions;
                existing.updated_at = Utc::now();
                existing
            }
            None => Skill::new(&name, &description, &instructions, created_by),
        };
        skill.tools = optional_string_list(params, "tools");
        skill.tags = optional_string_list(params, "tags");
        skill.references = optional_string_list(params, "references");
        skill.model = optional_string(params, "model");

        match self.embedder.embed(&[description]).await {
            Ok(mut vectors) => skill.embedding = vectors.pop(),
            Err(e) => tracing::warn!(error = %e, "skill embedding failed, saved unembedded"),
        }

        self.store.upsert_skill(&skill).await?;
        info!(skill = %skill.name, "skill saved");
        Ok(format!("Saved skill \"{}\".", skill.name))
    }

    async fn get(&self, params: &HashMap<String, Value>) -> anyhow::Result<String> {
        let name = require_string(params, "name")?;
        match self.store.get_skill_by_name(&name).await? {
            Some(skill) => Ok(format_skill(&skill)),
            None => Ok(format!("No skill named \"{name}\".")),
        }
    }

    async fn find(&self, params: &HashMap<String, Value>) -> anyhow::Result<String> {
        let query = require_string(params, "query")?;
        let vectors = self.embedder.embed(&[query]).await?;
        let embedding = vectors
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("embedding provider returned no vector"))?;

        let hits = self.store.search_skills(&embedding, 5).await?;
        if hits.is_empty() {
            return Ok("No matching skills.".into());
        }
        Ok(hits
            .iter()
            .map(|hit| format!("- {} ({:.3}): {}", hit.item.name, hit.score, hit.item.description))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

fn format_skill(skill: &Skill) -> String {
    format!(
        "# {}\n{}\n\nTools: {}\n\n{}",
        skill.name,
        skill.description,
        if skill.tools.is_empty() {
            "(default)".to_string()
        } else {
            skill.tools.join(", ")
        },
        skill.instructions
    )
}

#[async_trait]
impl Tool for SkillTool {
    fn name(&self) -> &str {
        "skill"
    }

    fn description(&self) -> &str {
        "Manage learned skills: save (create or update), get one by name, \
         or find skills matching a query."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["save", "get", "find"],
                    "description": "What to do"
                },
                "name": { "type": "string", "description": "Skill name (save/get)" },
                "description": { "type": "string", "description": "One-line summary (save)" },
                "instructions": { "type": "string", "description": "Full instructions (save)" },
                "tools": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Tool names this skill uses (save)"
                },
                "tags": { "type": "array", "items": { "type": "string" } },
                "references": { "type": "array", "items": { "type": "string" } },
                "model": { "type": "string", "description": "Optional model override (save)" },
                "query": { "type": "string", "description": "Search query (find)" }
            },
            "required": ["action"]
        })
    }

    async fn execute(
        &self,
        _ctx: &ExecContext,
        params: HashMap<String, Value>,
    ) -> anyhow::Result<String> {
        let action = require_string(&params, "action")?;
        match action.as_str() {
            "save" => self.save(&params, "agent").await,
            "get" => self.get(&params).await,
            "find" => self.find(&params).await,
            other => anyhow::bail!("unknown action '{other}': expected save, get, or find"),
        }
    }
}
