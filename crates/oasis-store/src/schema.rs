//! SQLite schema.
//!
//! Timestamps are RFC 3339 TEXT (lexicographic order equals
//! chronological order), embeddings are little-endian f32 BLOBs, and
//! JSON columns hold serialised metadata/lists. The `references` list of
//! a skill is stored in a `refs` column to stay clear of the SQL keyword.

/// DDL statements, executed in order at store open.
pub const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS threads (
        id         TEXT PRIMARY KEY,
        chat_id    TEXT NOT NULL,
        title      TEXT NOT NULL,
        metadata   TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_threads_chat ON threads(chat_id, updated_at)",
    "CREATE TABLE IF NOT EXISTS messages (
        id         TEXT PRIMARY KEY,
        thread_id  TEXT NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
        role       TEXT NOT NULL,
        content    TEXT NOT NULL,
        embedding  BLOB,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(thread_id, created_at)",
    "CREATE TABLE IF NOT EXISTS documents (
        id         TEXT PRIMARY KEY,
        title      TEXT NOT NULL,
        source     TEXT NOT NULL,
        content    TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS chunks (
        id          TEXT PRIMARY KEY,
        document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
        parent_id   TEXT,
        content     TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        embedding   BLOB,
        meta        TEXT NOT NULL DEFAULT '{}',
        created_at  TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id)",
    "CREATE TABLE IF NOT EXISTS chunk_edges (
        id        TEXT PRIMARY KEY,
        source_id TEXT NOT NULL,
        target_id TEXT NOT NULL,
        relation  TEXT NOT NULL,
        weight    REAL NOT NULL DEFAULT 1.0,
        UNIQUE(source_id, target_id, relation)
    )",
    "CREATE INDEX IF NOT EXISTS idx_edges_source ON chunk_edges(source_id)",
    "CREATE INDEX IF NOT EXISTS idx_edges_target ON chunk_edges(target_id)",
    "CREATE TABLE IF NOT EXISTS skills (
        id           TEXT PRIMARY KEY,
        name         TEXT NOT NULL UNIQUE,
        description  TEXT NOT NULL,
        instructions TEXT NOT NULL,
        tools        TEXT NOT NULL DEFAULT '[]',
        model        TEXT,
        tags         TEXT NOT NULL DEFAULT '[]',
        created_by   TEXT NOT NULL,
        refs         TEXT NOT NULL DEFAULT '[]',
        embedding    BLOB,
        created_at   TEXT NOT NULL,
        updated_at   TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS scheduled_actions (
        id               TEXT PRIMARY KEY,
        description      TEXT NOT NULL,
        schedule         TEXT NOT NULL,
        tool_calls       TEXT NOT NULL DEFAULT '[]',
        synthesis_prompt TEXT,
        next_run         TEXT NOT NULL,
        enabled          INTEGER NOT NULL DEFAULT 1,
        skill_id         TEXT,
        created_at       TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_actions_due ON scheduled_actions(enabled, next_run)",
    "CREATE TABLE IF NOT EXISTS config (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )",
];

/// Encode an embedding as a little-endian f32 BLOB.
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(embedding.len() * 4);
    for v in embedding {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf
}

/// Decode a little-endian f32 BLOB back into an embedding.
pub fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
