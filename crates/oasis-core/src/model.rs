//! Persisted entity models — threads, messages, documents, chunks,
//! chunk edges, skills, and scheduled actions.
//!
//! All ids are UUID v4 strings; timestamps are UTC. Embeddings live on
//! the entities as plain `Vec<f32>` and are validated against the
//! configured dimension at the store boundary.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::new_id;

// ─────────────────────────────────────────────
// Thread & message
// ─────────────────────────────────────────────

/// An ordered per-chat message log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub chat_id: String,
    pub title: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Thread {
    pub fn new(chat_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Thread {
            id: new_id(),
            chat_id: chat_id.into(),
            title: title.into(),
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Role of a stored conversation message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
            MessageRole::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            "tool" => Some(MessageRole::Tool),
            "system" => Some(MessageRole::System),
            _ => None,
        }
    }
}

/// A persisted conversation turn. Immutable once written; the embedding
/// may be backfilled asynchronously.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub thread_id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    pub fn new(thread_id: impl Into<String>, role: MessageRole, content: impl Into<String>) -> Self {
        StoredMessage {
            id: new_id(),
            thread_id: thread_id.into(),
            role,
            content: content.into(),
            embedding: None,
            created_at: Utc::now(),
        }
    }
}

// ─────────────────────────────────────────────
// Document & chunk
// ─────────────────────────────────────────────

/// An ingested document. Deleting one cascades to its chunks and edges.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    /// Source URI (file name, URL, or a synthetic note id).
    pub source: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        title: impl Into<String>,
        source: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Document {
            id: new_id(),
            title: title.into(),
            source: source.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Per-chunk metadata carried through extraction.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    /// Base64-encoded images attached to this chunk's section.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl ChunkMeta {
    pub fn is_empty(&self) -> bool {
        self.page.is_none() && self.heading.is_none() && self.images.is_empty()
    }
}

/// A retrieval-sized fragment of an ingested document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    /// Parent chunk for hierarchical chunking, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub content: String,
    pub chunk_index: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub meta: ChunkMeta,
    pub created_at: DateTime<Utc>,
}

impl Chunk {
    pub fn new(document_id: impl Into<String>, chunk_index: i64, content: impl Into<String>) -> Self {
        Chunk {
            id: new_id(),
            document_id: document_id.into(),
            parent_id: None,
            content: content.into(),
            chunk_index,
            embedding: None,
            meta: ChunkMeta::default(),
            created_at: Utc::now(),
        }
    }
}

// ─────────────────────────────────────────────
// Chunk edges (graph)
// ─────────────────────────────────────────────

/// Typed relation between two chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeRelation {
    DependsOn,
    Elaborates,
    Contradicts,
    References,
    Sibling,
    ParentOf,
}

impl EdgeRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeRelation::DependsOn => "depends_on",
            EdgeRelation::Elaborates => "elaborates",
            EdgeRelation::Contradicts => "contradicts",
            EdgeRelation::References => "references",
            EdgeRelation::Sibling => "sibling",
            EdgeRelation::ParentOf => "parent_of",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "depends_on" => Some(EdgeRelation::DependsOn),
            "elaborates" => Some(EdgeRelation::Elaborates),
            "contradicts" => Some(EdgeRelation::Contradicts),
            "references" => Some(EdgeRelation::References),
            "sibling" => Some(EdgeRelation::Sibling),
            "parent_of" => Some(EdgeRelation::ParentOf),
            _ => None,
        }
    }
}

/// A directed, weighted edge between two chunks.
///
/// Uniquely keyed by (source, target, relation).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkEdge {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub relation: EdgeRelation,
    pub weight: f64,
}

impl ChunkEdge {
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        relation: EdgeRelation,
        weight: f64,
    ) -> Self {
        ChunkEdge {
            id: new_id(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            relation,
            weight,
        }
    }
}

// ─────────────────────────────────────────────
// Skills
// ─────────────────────────────────────────────

/// A stored instruction package and tool preset an agent can adopt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub description: String,
    pub instructions: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_by: String,
    #[serde(default)]
    pub references: Vec<String>,
    /// Embedding of the description, used for skill search.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Skill {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        instructions: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Skill {
            id: new_id(),
            name: name.into(),
            description: description.into(),
            instructions: instructions.into(),
            tools: Vec::new(),
            model: None,
            tags: Vec::new(),
            created_by: created_by.into(),
            references: Vec::new(),
            embedding: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ─────────────────────────────────────────────
// Scheduled actions
// ─────────────────────────────────────────────

/// A single tool invocation inside a scheduled action's payload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolStep {
    pub tool: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A stored scheduled action, polled by the scheduler.
///
/// `schedule` is either a 5-field cron expression or an RFC 3339
/// timestamp for a one-shot run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduledAction {
    pub id: String,
    pub description: String,
    pub schedule: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesis_prompt: Option<String>,
    pub next_run: DateTime<Utc>,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ScheduledAction {
    pub fn new(
        description: impl Into<String>,
        schedule: impl Into<String>,
        next_run: DateTime<Utc>,
    ) -> Self {
        ScheduledAction {
            id: new_id(),
            description: description.into(),
            schedule: schedule.into(),
            tool_calls: Vec::new(),
            synthesis_prompt: None,
            next_run,
            enabled: true,
            skill_id: None,
            created_at: Utc::now(),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
