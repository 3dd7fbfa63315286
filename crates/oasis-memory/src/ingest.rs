//! Ingestion pipeline: extract → chunk → embed → persist (+ edges).
//!
//! Chunks land in the store in one transaction with their document;
//! consecutive chunks get sibling edges when the store has a graph.

use std::sync::Arc;

use tracing::{debug, info, warn};

use oasis_core::model::{Chunk, ChunkEdge, Document, EdgeRelation};
use oasis_providers::EmbeddingProvider;
use oasis_store::Store;

use crate::chunker::{chunk_text, ChunkerConfig};
use crate::extract::{extractor_for, mime_from_filename, Extracted, PageMeta};

/// Summary of a completed ingest, for user-facing confirmation.
#[derive(Clone, Debug)]
pub struct IngestReport {
    pub document_id: String,
    pub title: String,
    pub chunk_count: usize,
}

/// Runs the extract → chunk → embed → store pipeline.
pub struct Ingestor {
    store: Arc<dyn Store>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: ChunkerConfig,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn Store>,
        embedder: Arc<dyn EmbeddingProvider>,
        chunker: ChunkerConfig,
    ) -> Self {
        Ingestor {
            store,
            embedder,
            chunker,
        }
    }

    /// Ingest raw file bytes. The extractor is picked from `mime` when
    /// given, otherwise from the file name.
    pub async fn ingest_bytes(
        &self,
        data: &[u8],
        filename: &str,
        mime: Option<&str>,
    ) -> anyhow::Result<IngestReport> {
        let mime = mime
            .map(str::to_string)
            .unwrap_or_else(|| mime_from_filename(filename).to_string());
        let extractor = extractor_for(&mime);
        debug!(filename, mime = %mime, extractor = extractor.name(), "extracting");
        let extracted = extractor.extract(data)?;
        self.persist(filename, filename, extracted).await
    }

    /// Ingest already-plain text (notes, fetched pages).
    pub async fn ingest_text(
        &self,
        title: &str,
        source: &str,
        text: &str,
    ) -> anyhow::Result<IngestReport> {
        self.persist(title, source, Extracted::text_only(text))
            .await
    }

    async fn persist(
        &self,
        title: &str,
        source: &str,
        extracted: Extracted,
    ) -> anyhow::Result<IngestReport> {
        let document = Document::new(title, source, extracted.text.clone());
        let pieces = chunk_text(&extracted.text, &self.chunker);

        let mut chunks: Vec<Chunk> = Vec::with_capacity(pieces.len());
        let mut cursor = 0usize;
        for (index, piece) in pieces.iter().enumerate() {
            let mut chunk = Chunk::new(&document.id, index as i64, piece.clone());
            if let Some(meta) =
                locate_page(&extracted.text, &extracted.pages, piece, &mut cursor)
            {
                chunk.meta.page = meta.page;
                chunk.meta.heading = meta.heading.clone();
                chunk.meta.images = meta.images.clone();
            }
            chunks.push(chunk);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        match self.embedder.embed(&texts).await {
            Ok(vectors) => {
                for (chunk, vector) in chunks.iter_mut().zip(vectors) {
                    chunk.embedding = Some(vector);
                }
            }
            // Chunks without embeddings still serve keyword search.
            Err(e) => warn!(error = %e, "embedding failed, storing chunks unembedded"),
        }

        self.store.insert_document(&document, &chunks).await?;

        if let Some(graph) = self.store.graph() {
            let edges: Vec<ChunkEdge> = chunks
                .windows(2)
                .map(|pair| ChunkEdge::new(&pair[0].id, &pair[1].id, EdgeRelation::Sibling, 1.0))
                .collect();
            if !edges.is_empty() {
                graph.store_edges(&edges).await?;
            }
        }

        info!(
            document = %document.id,
            title,
            chunks = chunks.len(),
            "document ingested"
        );
        Ok(IngestReport {
            document_id: document.id,
            title: title.to_string(),
            chunk_count: chunks.len(),
        })
    }
}

/// Find the section a chunk belongs to by locating the chunk's trailing
/// bytes in the source text past the moving cursor. Overlap prefixes
/// make chunks non-contiguous, so the probe anchors on the tail.
fn locate_page<'a>(
    text: &str,
    pages: &'a [PageMeta],
    piece: &str,
    cursor: &mut usize,
) -> Option<&'a PageMeta> {
    if pages.is_empty() {
        return None;
    }
    let mut probe_start = piece.len().saturating_sub(48);
    while probe_start < piece.len() && !piece.is_char_boundary(probe_start) {
        probe_start += 1;
    }
    let probe = &piece[probe_start..];
    let found = text.get(*cursor..)?.find(probe)? + *cursor;
    *cursor = found;
    pages
        .iter()
        .find(|p| p.start <= found && found < p.end.max(p.start + 1))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use oasis_store::SqliteStore;

    /// Embedder returning a constant unit vector per text.
    struct FixedEmbedder {
        dims: usize,
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            if self.fail {
                anyhow::bail!("embedding backend down");
            }
            Ok(texts
                .iter()
                .map(|_| {
                    let mut v = vec![0.0; self.dims];
                    v[0] = 1.0;
                    v
                })
                .collect())
        }

        fn dimensions(&self) -> usize {
            self.dims
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    async fn ingestor(fail_embeddings: bool) -> (Ingestor, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::open_in_memory(Some(3)).await.unwrap());
        let embedder = Arc::new(FixedEmbedder {
            dims: 3,
            fail: fail_embeddings,
        });
        let ingestor = Ingestor::new(
            store.clone(),
            embedder,
            ChunkerConfig {
                max_tokens: 16,
                overlap_bytes: 0,
            },
        );
        (ingestor, store)
    }

    #[tokio::test]
    async fn test_ingest_text_persists_chunks_and_edges() {
        let (ingestor, store) = ingestor(false).await;
        let text = "First paragraph about networks.\n\nSecond paragraph about tools.\n\n\
                    Third paragraph about agents and more agents.";
        let report = ingestor.ingest_text("notes", "note://1", text).await.unwrap();
        assert!(report.chunk_count >= 2);

        let results = store.search_chunks(&[1.0, 0.0, 0.0], 10, &[]).await.unwrap();
        assert_eq!(results.len(), report.chunk_count);

        // Consecutive chunks are linked as siblings.
        let first = results
            .iter()
            .map(|r| r.item.clone())
            .find(|c| c.chunk_index == 0)
            .unwrap();
        let edges = store.graph().unwrap().get_edges(&first.id).await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].relation, EdgeRelation::Sibling);
    }

    #[tokio::test]
    async fn test_ingest_survives_embedding_failure() {
        let (ingestor, store) = ingestor(true).await;
        let report = ingestor
            .ingest_text("notes", "note://2", "Some text to remember.")
            .await
            .unwrap();
        assert_eq!(report.chunk_count, 1);

        // Keyword search still finds the unembedded chunk.
        let hits = store
            .keyword()
            .unwrap()
            .search_chunks_keyword("remember", 5, &[])
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_ingest_markdown_bytes() {
        let (ingestor, store) = ingestor(false).await;
        let report = ingestor
            .ingest_bytes(b"# Title\n\nSome **bold** body.", "notes.md", None)
            .await
            .unwrap();
        assert_eq!(report.chunk_count, 1);

        let doc = store.get_document(&report.document_id).await.unwrap();
        assert_eq!(doc.content, "Title\n\nSome bold body.");
        assert_eq!(doc.source, "notes.md");
    }

    #[test]
    fn test_locate_page_assigns_section() {
        let text = "Intro\n\nBody of section one.\n\nDetails\n\nBody of section two.";
        let pages = vec![
            PageMeta {
                heading: Some("Intro".into()),
                start: 0,
                end: 29,
                ..Default::default()
            },
            PageMeta {
                heading: Some("Details".into()),
                start: 29,
                end: text.len(),
                ..Default::default()
            },
        ];
        let mut cursor = 0;
        let first = locate_page(text, &pages, "Intro\n\nBody of section one.", &mut cursor);
        assert_eq!(first.unwrap().heading.as_deref(), Some("Intro"));
        let second = locate_page(text, &pages, "Details\n\nBody of section two.", &mut cursor);
        assert_eq!(second.unwrap().heading.as_deref(), Some("Details"));
    }
}
