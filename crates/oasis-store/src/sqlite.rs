//! Embedded SQLite store.
//!
//! The shipped adapter behind the `Store` trait: an `sqlx` pool over a
//! single database file (or memory for tests). Dense search is an exact
//! cosine scan over candidate rows — filters run in SQL, similarity in
//! process. Keyword search and the chunk graph are exposed through the
//! capability views.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use oasis_core::model::{
    Chunk, ChunkEdge, ChunkMeta, Document, EdgeRelation, MessageRole, ScheduledAction, Skill,
    StoredMessage, Thread, ToolStep,
};
use oasis_core::utils::cosine;

use crate::error::StoreError;
use crate::filter::{render_filters, ChunkFilter};
use crate::keyword::score_keyword;
use crate::schema::{decode_embedding, encode_embedding, SCHEMA};
use crate::traits::{GraphStore, KeywordSearch, Scored, Store};

// ─────────────────────────────────────────────
// SqliteStore
// ─────────────────────────────────────────────

/// SQLite-backed store. Cheap to clone; the pool is shared.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    /// Declared embedding dimension; vector writes of any other length
    /// are rejected.
    dimensions: Option<usize>,
}

impl SqliteStore {
    /// Open (creating if missing) a database file and initialise the schema.
    pub async fn open(path: &Path, dimensions: Option<usize>) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = SqliteStore { pool, dimensions };
        store.init().await?;
        info!(path = %path.display(), "opened store");
        Ok(store)
    }

    /// Open an in-memory database (single connection so state persists).
    pub async fn open_in_memory(dimensions: Option<usize>) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(sqlx::Error::from)?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = SqliteStore { pool, dimensions };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<(), StoreError> {
        for ddl in SCHEMA {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        debug!("schema initialised");
        Ok(())
    }

    fn check_dims(&self, embedding: &[f32]) -> Result<(), StoreError> {
        if let Some(expected) = self.dimensions {
            if embedding.len() != expected {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
        }
        Ok(())
    }

    /// Fetch chunk rows matching the filters (joined with documents so
    /// `source` predicates resolve).
    async fn chunk_candidates(
        &self,
        filters: &[ChunkFilter],
        require_embedding: bool,
    ) -> Result<Vec<Chunk>, StoreError> {
        let (filter_sql, binds) = render_filters(filters);
        let embedding_sql = if require_embedding {
            " AND c.embedding IS NOT NULL"
        } else {
            ""
        };
        let sql = format!(
            "SELECT c.id, c.document_id, c.parent_id, c.content, c.chunk_index, \
                    c.embedding, c.meta, c.created_at \
             FROM chunks c JOIN documents d ON d.id = c.document_id \
             WHERE 1 = 1{embedding_sql}{filter_sql}"
        );
        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_chunk).collect()
    }
}

// ─────────────────────────────────────────────
// Row decoding
// ─────────────────────────────────────────────

fn row_to_thread(row: &SqliteRow) -> Result<Thread, StoreError> {
    let metadata: String = row.try_get("metadata")?;
    Ok(Thread {
        id: row.try_get("id")?,
        chat_id: row.try_get("chat_id")?,
        title: row.try_get("title")?,
        metadata: serde_json::from_str(&metadata)
            .map_err(|e| StoreError::Corrupt(format!("thread metadata: {e}")))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_message(row: &SqliteRow) -> Result<StoredMessage, StoreError> {
    let role: String = row.try_get("role")?;
    let embedding: Option<Vec<u8>> = row.try_get("embedding")?;
    Ok(StoredMessage {
        id: row.try_get("id")?,
        thread_id: row.try_get("thread_id")?,
        role: MessageRole::parse(&role)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown message role: {role}")))?,
        content: row.try_get("content")?,
        embedding: embedding.map(|b| decode_embedding(&b)),
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_document(row: &SqliteRow) -> Result<Document, StoreError> {
    Ok(Document {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        source: row.try_get("source")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_chunk(row: &SqliteRow) -> Result<Chunk, StoreError> {
    let meta: String = row.try_get("meta")?;
    let embedding: Option<Vec<u8>> = row.try_get("embedding")?;
    Ok(Chunk {
        id: row.try_get("id")?,
        document_id: row.try_get("document_id")?,
        parent_id: row.try_get("parent_id")?,
        content: row.try_get("content")?,
        chunk_index: row.try_get("chunk_index")?,
        embedding: embedding.map(|b| decode_embedding(&b)),
        meta: serde_json::from_str::<ChunkMeta>(&meta)
            .map_err(|e| StoreError::Corrupt(format!("chunk meta: {e}")))?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_edge(row: &SqliteRow) -> Result<ChunkEdge, StoreError> {
    let relation: String = row.try_get("relation")?;
    Ok(ChunkEdge {
        id: row.try_get("id")?,
        source_id: row.try_get("source_id")?,
        target_id: row.try_get("target_id")?,
        relation: EdgeRelation::parse(&relation)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown edge relation: {relation}")))?,
        weight: row.try_get("weight")?,
    })
}

fn row_to_skill(row: &SqliteRow) -> Result<Skill, StoreError> {
    let tools: String = row.try_get("tools")?;
    let tags: String = row.try_get("tags")?;
    let refs: String = row.try_get("refs")?;
    let embedding: Option<Vec<u8>> = row.try_get("embedding")?;
    let decode_list = |s: &str, what: &str| {
        serde_json::from_str::<Vec<String>>(s)
            .map_err(|e| StoreError::Corrupt(format!("skill {what}: {e}")))
    };
    Ok(Skill {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        instructions: row.try_get("instructions")?,
        tools: decode_list(&tools, "tools")?,
        model: row.try_get("model")?,
        tags: decode_list(&tags, "tags")?,
        created_by: row.try_get("created_by")?,
        references: decode_list(&refs, "references")?,
        embedding: embedding.map(|b| decode_embedding(&b)),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_action(row: &SqliteRow) -> Result<ScheduledAction, StoreError> {
    let tool_calls: String = row.try_get("tool_calls")?;
    Ok(ScheduledAction {
        id: row.try_get("id")?,
        description: row.try_get("description")?,
        schedule: row.try_get("schedule")?,
        tool_calls: serde_json::from_str::<Vec<ToolStep>>(&tool_calls)
            .map_err(|e| StoreError::Corrupt(format!("action tool_calls: {e}")))?,
        synthesis_prompt: row.try_get("synthesis_prompt")?,
        next_run: row.try_get("next_run")?,
        enabled: row.try_get("enabled")?,
        skill_id: row.try_get("skill_id")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Sort scored items descending, ties broken by id for determinism.
fn rank_scored<T>(mut scored: Vec<(Scored<T>, String)>, top_k: usize) -> Vec<Scored<T>> {
    scored.sort_by(|a, b| {
        b.0.score
            .partial_cmp(&a.0.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });
    scored.truncate(top_k);
    scored.into_iter().map(|(s, _)| s).collect()
}

// ─────────────────────────────────────────────
// Store impl
// ─────────────────────────────────────────────

#[async_trait]
impl Store for SqliteStore {
    async fn create_thread(&self, thread: &Thread) -> Result<(), StoreError> {
        let metadata = serde_json::to_string(&thread.metadata)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        sqlx::query(
            "INSERT INTO threads (id, chat_id, title, metadata, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&thread.id)
        .bind(&thread.chat_id)
        .bind(&thread.title)
        .bind(metadata)
        .bind(thread.created_at.to_rfc3339())
        .bind(thread.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_thread(&self, id: &str) -> Result<Thread, StoreError> {
        let row = sqlx::query("SELECT * FROM threads WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("thread", id))?;
        row_to_thread(&row)
    }

    async fn latest_thread(&self, chat_id: &str) -> Result<Option<Thread>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM threads WHERE chat_id = ? ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_thread).transpose()
    }

    async fn touch_thread(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE threads SET updated_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_thread(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM threads WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_message(&self, message: &StoredMessage) -> Result<(), StoreError> {
        let embedding = match &message.embedding {
            Some(e) => {
                self.check_dims(e)?;
                Some(encode_embedding(e))
            }
            None => None,
        };
        sqlx::query(
            "INSERT INTO messages (id, thread_id, role, content, embedding, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.thread_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(embedding)
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_messages(
        &self,
        thread_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM (SELECT * FROM messages WHERE thread_id = ? \
             ORDER BY created_at DESC, id DESC LIMIT ?) ORDER BY created_at ASC, id ASC",
        )
        .bind(thread_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_message).collect()
    }

    async fn set_message_embedding(
        &self,
        message_id: &str,
        embedding: &[f32],
    ) -> Result<(), StoreError> {
        self.check_dims(embedding)?;
        sqlx::query("UPDATE messages SET embedding = ? WHERE id = ?")
            .bind(encode_embedding(embedding))
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn search_messages(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<Scored<StoredMessage>>, StoreError> {
        let rows = sqlx::query("SELECT * FROM messages WHERE embedding IS NOT NULL")
            .fetch_all(&self.pool)
            .await?;
        let mut scored = Vec::new();
        for row in &rows {
            let message = row_to_message(row)?;
            let score = message
                .embedding
                .as_deref()
                .map(|e| cosine(embedding, e))
                .unwrap_or(0.0);
            let id = message.id.clone();
            scored.push((Scored::new(message, score), id));
        }
        Ok(rank_scored(scored, top_k))
    }

    async fn insert_document(
        &self,
        document: &Document,
        chunks: &[Chunk],
    ) -> Result<(), StoreError> {
        for chunk in chunks {
            if let Some(e) = &chunk.embedding {
                self.check_dims(e)?;
            }
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO documents (id, title, source, content, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&document.id)
        .bind(&document.title)
        .bind(&document.source)
        .bind(&document.content)
        .bind(document.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for chunk in chunks {
            let meta = serde_json::to_string(&chunk.meta)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
            sqlx::query(
                "INSERT INTO chunks (id, document_id, parent_id, content, chunk_index, \
                 embedding, meta, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(&chunk.parent_id)
            .bind(&chunk.content)
            .bind(chunk.chunk_index)
            .bind(chunk.embedding.as_deref().map(encode_embedding))
            .bind(meta)
            .bind(chunk.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(document = %document.id, chunks = chunks.len(), "stored document");
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Document, StoreError> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("document", id))?;
        row_to_document(&row)
    }

    async fn delete_document(&self, id: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "DELETE FROM chunk_edges WHERE \
             source_id IN (SELECT id FROM chunks WHERE document_id = ?) OR \
             target_id IN (SELECT id FROM chunks WHERE document_id = ?)",
        )
        .bind(id)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_chunk(&self, id: &str) -> Result<Chunk, StoreError> {
        let row = sqlx::query("SELECT * FROM chunks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("chunk", id))?;
        row_to_chunk(&row)
    }

    async fn search_chunks(
        &self,
        embedding: &[f32],
        top_k: usize,
        filters: &[ChunkFilter],
    ) -> Result<Vec<Scored<Chunk>>, StoreError> {
        let candidates = self.chunk_candidates(filters, true).await?;
        let mut scored = Vec::new();
        for chunk in candidates {
            let score = chunk
                .embedding
                .as_deref()
                .map(|e| cosine(embedding, e))
                .unwrap_or(0.0);
            let id = chunk.id.clone();
            scored.push((Scored::new(chunk, score), id));
        }
        Ok(rank_scored(scored, top_k))
    }

    async fn upsert_skill(&self, skill: &Skill) -> Result<(), StoreError> {
        if let Some(e) = &skill.embedding {
            self.check_dims(e)?;
        }
        let encode_list =
            |v: &Vec<String>| serde_json::to_string(v).map_err(|e| StoreError::Corrupt(e.to_string()));
        sqlx::query(
            "INSERT INTO skills (id, name, description, instructions, tools, model, tags, \
             created_by, refs, embedding, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(name) DO UPDATE SET \
                description = excluded.description, \
                instructions = excluded.instructions, \
                tools = excluded.tools, \
                model = excluded.model, \
                tags = excluded.tags, \
                refs = excluded.refs, \
                embedding = excluded.embedding, \
                updated_at = excluded.updated_at",
        )
        .bind(&skill.id)
        .bind(&skill.name)
        .bind(&skill.description)
        .bind(&skill.instructions)
        .bind(encode_list(&skill.tools)?)
        .bind(&skill.model)
        .bind(encode_list(&skill.tags)?)
        .bind(&skill.created_by)
        .bind(encode_list(&skill.references)?)
        .bind(skill.embedding.as_deref().map(encode_embedding))
        .bind(skill.created_at.to_rfc3339())
        .bind(skill.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_skill_by_name(&self, name: &str) -> Result<Option<Skill>, StoreError> {
        let row = sqlx::query("SELECT * FROM skills WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_skill).transpose()
    }

    async fn search_skills(
        &self,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<Scored<Skill>>, StoreError> {
        let rows = sqlx::query("SELECT * FROM skills WHERE embedding IS NOT NULL")
            .fetch_all(&self.pool)
            .await?;
        let mut scored = Vec::new();
        for row in &rows {
            let skill = row_to_skill(row)?;
            let score = skill
                .embedding
                .as_deref()
                .map(|e| cosine(embedding, e))
                .unwrap_or(0.0);
            let id = skill.id.clone();
            scored.push((Scored::new(skill, score), id));
        }
        Ok(rank_scored(scored, top_k))
    }

    async fn insert_scheduled_action(&self, action: &ScheduledAction) -> Result<(), StoreError> {
        let tool_calls = serde_json::to_string(&action.tool_calls)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        sqlx::query(
            "INSERT INTO scheduled_actions (id, description, schedule, tool_calls, \
             synthesis_prompt, next_run, enabled, skill_id, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&action.id)
        .bind(&action.description)
        .bind(&action.schedule)
        .bind(tool_calls)
        .bind(&action.synthesis_prompt)
        .bind(action.next_run.to_rfc3339())
        .bind(action.enabled)
        .bind(&action.skill_id)
        .bind(action.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_scheduled_action(&self, action: &ScheduledAction) -> Result<(), StoreError> {
        let tool_calls = serde_json::to_string(&action.tool_calls)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        sqlx::query(
            "UPDATE scheduled_actions SET description = ?, schedule = ?, tool_calls = ?, \
             synthesis_prompt = ?, next_run = ?, enabled = ?, skill_id = ? WHERE id = ?",
        )
        .bind(&action.description)
        .bind(&action.schedule)
        .bind(tool_calls)
        .bind(&action.synthesis_prompt)
        .bind(action.next_run.to_rfc3339())
        .bind(action.enabled)
        .bind(&action.skill_id)
        .bind(&action.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn due_scheduled_actions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledAction>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM scheduled_actions WHERE enabled = 1 AND next_run <= ? \
             ORDER BY next_run ASC",
        )
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_action).collect()
    }

    async fn list_scheduled_actions(&self) -> Result<Vec<ScheduledAction>, StoreError> {
        let rows = sqlx::query("SELECT * FROM scheduled_actions ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_action).collect()
    }

    async fn delete_scheduled_action(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM scheduled_actions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_config(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT value FROM config WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    async fn set_config(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO config (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_config_if_absent(&self, key: &str, value: &str) -> Result<String, StoreError> {
        sqlx::query("INSERT INTO config (key, value) VALUES (?, ?) ON CONFLICT(key) DO NOTHING")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        let current = self.get_config(key).await?;
        Ok(current.unwrap_or_else(|| value.to_string()))
    }

    fn keyword(&self) -> Option<&dyn KeywordSearch> {
        Some(self)
    }

    fn graph(&self) -> Option<&dyn GraphStore> {
        Some(self)
    }
}

// ─────────────────────────────────────────────
// KeywordSearch impl
// ─────────────────────────────────────────────

#[async_trait]
impl KeywordSearch for SqliteStore {
    async fn search_chunks_keyword(
        &self,
        query: &str,
        top_k: usize,
        filters: &[ChunkFilter],
    ) -> Result<Vec<Scored<Chunk>>, StoreError> {
        let candidates = self.chunk_candidates(filters, false).await?;
        let docs: Vec<(String, String)> = candidates
            .iter()
            .map(|c| (c.id.clone(), c.content.clone()))
            .collect();
        let ranked = score_keyword(query, &docs);

        let mut by_id: std::collections::HashMap<String, Chunk> =
            candidates.into_iter().map(|c| (c.id.clone(), c)).collect();
        Ok(ranked
            .into_iter()
            .take(top_k)
            .filter_map(|(id, score)| by_id.remove(&id).map(|c| Scored::new(c, score as f32)))
            .collect())
    }
}

// ─────────────────────────────────────────────
// GraphStore impl
// ─────────────────────────────────────────────

#[async_trait]
impl GraphStore for SqliteStore {
    async fn store_edges(&self, edges: &[ChunkEdge]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for edge in edges {
            sqlx::query(
                "INSERT INTO chunk_edges (id, source_id, target_id, relation, weight) \
                 VALUES (?, ?, ?, ?, ?) \
                 ON CONFLICT(source_id, target_id, relation) DO UPDATE SET weight = excluded.weight",
            )
            .bind(&edge.id)
            .bind(&edge.source_id)
            .bind(&edge.target_id)
            .bind(edge.relation.as_str())
            .bind(edge.weight)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_edges(&self, source_id: &str) -> Result<Vec<ChunkEdge>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM chunk_edges WHERE source_id = ? ORDER BY weight DESC, target_id ASC",
        )
        .bind(source_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_edge).collect()
    }

    async fn get_incoming_edges(&self, target_id: &str) -> Result<Vec<ChunkEdge>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM chunk_edges WHERE target_id = ? ORDER BY weight DESC, source_id ASC",
        )
        .bind(target_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_edge).collect()
    }

    async fn prune_orphan_edges(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM chunk_edges WHERE \
             source_id NOT IN (SELECT id FROM chunks) OR \
             target_id NOT IN (SELECT id FROM chunks)",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
