//! The `Store` trait and its optional capability views.
//!
//! Consumers check a capability once (`store.keyword()`, `store.graph()`)
//! and cache the decision instead of probing per call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use oasis_core::model::{
    Chunk, ChunkEdge, Document, ScheduledAction, Skill, StoredMessage, Thread,
};

use crate::error::StoreError;
use crate::filter::ChunkFilter;

/// A search hit carrying its relevance score.
#[derive(Clone, Debug)]
pub struct Scored<T> {
    pub item: T,
    pub score: f32,
}

impl<T> Scored<T> {
    pub fn new(item: T, score: f32) -> Self {
        Scored { item, score }
    }
}

/// CRUD + dense search over the assistant's persisted state.
///
/// Implementations must be safe for concurrent use; multi-row writes
/// run in short transactions.
#[async_trait]
pub trait Store: Send + Sync {
    // ── Threads ──

    async fn create_thread(&self, thread: &Thread) -> Result<(), StoreError>;

    async fn get_thread(&self, id: &str) -> Result<Thread, StoreError>;

    /// Most recently updated thread for a chat, if any.
    async fn latest_thread(&self, chat_id: &str) -> Result<Option<Thread>, StoreError>;

    async fn touch_thread(&self, id: &str) -> Result<(), StoreError>;

    /// Delete a thread; its messages go with it.
    async fn delete_thread(&self, id: &str) -> Result<(), StoreError>;

    // ── Messages ──

    async fn insert_message(&self, message: &StoredMessage) -> Result<(), StoreError>;

    /// The last `limit` messages of a thread, oldest first.
    async fn recent_messages(
        &self,
        thread_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StoreError>;

    async fn set_message_embedding(
        &self,
        message_id: &str,
        embedding: &[f32],
    ) -> Result<(), StoreError>;

    /// Dense search over message embeddings.
    async fn search_messages(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<Scored<StoredMessage>>, StoreError>;

    // ── Documents & chunks ──

    /// Insert a document and its chunks in one transaction.
    async fn insert_document(
        &self,
        document: &Document,
        chunks: &[Chunk],
    ) -> Result<(), StoreError>;

    async fn get_document(&self, id: &str) -> Result<Document, StoreError>;

    /// Delete a document, cascading to chunks and their edges.
    async fn delete_document(&self, id: &str) -> Result<(), StoreError>;

    async fn get_chunk(&self, id: &str) -> Result<Chunk, StoreError>;

    /// Dense search over chunk embeddings, honouring filters.
    async fn search_chunks(
        &self,
        embedding: &[f32],
        top_k: usize,
        filters: &[ChunkFilter],
    ) -> Result<Vec<Scored<Chunk>>, StoreError>;

    // ── Skills ──

    async fn upsert_skill(&self, skill: &Skill) -> Result<(), StoreError>;

    async fn get_skill_by_name(&self, name: &str) -> Result<Option<Skill>, StoreError>;

    /// Dense search over skill-description embeddings.
    async fn search_skills(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<Scored<Skill>>, StoreError>;

    // ── Scheduled actions ──

    async fn insert_scheduled_action(&self, action: &ScheduledAction) -> Result<(), StoreError>;

    async fn update_scheduled_action(&self, action: &ScheduledAction) -> Result<(), StoreError>;

    /// Enabled actions with `next_run <= now`, oldest first.
    async fn due_scheduled_actions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledAction>, StoreError>;

    async fn list_scheduled_actions(&self) -> Result<Vec<ScheduledAction>, StoreError>;

    async fn delete_scheduled_action(&self, id: &str) -> Result<(), StoreError>;

    // ── Config ──

    async fn get_config(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_config(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Write-once set: keeps an existing value and returns it, otherwise
    /// stores `value` and returns it. Used for `owner_user_id`.
    async fn set_config_if_absent(&self, key: &str, value: &str) -> Result<String, StoreError>;

    // ── Capabilities ──

    /// Keyword full-text search, when the backend supports it.
    fn keyword(&self) -> Option<&dyn KeywordSearch> {
        None
    }

    /// Chunk-relation graph, when the backend supports it.
    fn graph(&self) -> Option<&dyn GraphStore> {
        None
    }
}

/// Optional keyword-search capability of a store.
#[async_trait]
pub trait KeywordSearch: Send + Sync {
    /// Full-text search over chunk contents, honouring filters.
    async fn search_chunks_keyword(
        &self,
        query: &str,
        top_k: usize,
        filters: &[ChunkFilter],
    ) -> Result<Vec<Scored<Chunk>>, StoreError>;
}

/// Optional chunk-graph capability of a store.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Insert edges; duplicates on (source, target, relation) are ignored.
    async fn store_edges(&self, edges: &[ChunkEdge]) -> Result<(), StoreError>;

    /// Outgoing edges of a chunk.
    async fn get_edges(&self, source_id: &str) -> Result<Vec<ChunkEdge>, StoreError>;

    /// Incoming edges of a chunk.
    async fn get_incoming_edges(&self, target_id: &str) -> Result<Vec<ChunkEdge>, StoreError>;

    /// Remove edges whose endpoints no longer exist. Returns the count.
    async fn prune_orphan_edges(&self) -> Result<u64, StoreError>;
}
