//! Hybrid retriever: dense + keyword search fused by Reciprocal Rank
//! Fusion, with an optional score threshold, graph expansion of the top
//! seeds, and an optional reranker.
//!
//! Graph expansion only enriches seed chunks — it never changes their
//! ranking.

use std::sync::Arc;

use tracing::{debug, warn};

use oasis_core::model::EdgeRelation;
use oasis_core::utils::truncate_string;
use oasis_providers::EmbeddingProvider;
use oasis_store::{ChunkFilter, Scored, Store};

/// RRF constant from the fusion literature.
const RRF_K: f32 = 60.0;

/// Neighbour context attached to a retrieved chunk.
#[derive(Clone, Debug)]
pub struct GraphContext {
    pub from_chunk_id: String,
    pub relation: EdgeRelation,
    pub description: String,
}

/// One ranked retrieval hit.
#[derive(Clone, Debug)]
pub struct RetrievalResult {
    pub chunk_id: String,
    pub content: String,
    pub score: f32,
    pub graph_context: Vec<GraphContext>,
}

/// Retriever tuning.
#[derive(Clone, Debug)]
pub struct RetrieverConfig {
    /// Blend of keyword vs dense contributions, in `[0, 1]`.
    pub keyword_weight: f32,
    /// Fused-score floor; hits below it are dropped.
    pub score_threshold: Option<f32>,
    /// How many top seeds get graph expansion.
    pub graph_top_n: usize,
    /// Max neighbour contexts attached per seed.
    pub max_graph_contexts: usize,
    /// Drop hits whose score falls below `top_score * ratio`.
    pub rerank_drop_ratio: Option<f32>,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            keyword_weight: 0.5,
            score_threshold: None,
            graph_top_n: 3,
            max_graph_contexts: 3,
            rerank_drop_ratio: None,
        }
    }
}

/// Fuses dense and keyword search over the store.
pub struct HybridRetriever {
    store: Arc<dyn Store>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: RetrieverConfig,
    /// Capability decisions, taken once at construction.
    has_keyword: bool,
    has_graph: bool,
}

impl HybridRetriever {
    pub fn new(
        store: Arc<dyn Store>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: RetrieverConfig,
    ) -> Self {
        let has_keyword = store.keyword().is_some();
        let has_graph = store.graph().is_some();
        HybridRetriever {
            store,
            embedder,
            config,
            has_keyword,
            has_graph,
        }
    }

    /// Retrieve up to `top_k` chunks for a query.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        filters: &[ChunkFilter],
    ) -> anyhow::Result<Vec<RetrievalResult>> {
        let vectors = self.embedder.embed(&[query.to_string()]).await?;
        let embedding = vectors
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("embedding provider returned no vector"))?;

        // Over-fetch both lists so fusion has real candidates to merge.
        let fetch_k = top_k.max(1) * 3;

        let dense_fut = self.store.search_chunks(&embedding, fetch_k, filters);
        let (dense, keyword_hits) = if self.has_keyword {
            let keyword = self.store.keyword().expect("capability checked");
            let keyword_fut = keyword.search_chunks_keyword(query, fetch_k, filters);
            let (dense, keyword_hits) = tokio::join!(dense_fut, keyword_fut);
            let keyword_hits = keyword_hits.unwrap_or_else(|e| {
                warn!(error = %e, "keyword search failed, dense only");
                Vec::new()
            });
            (dense?, keyword_hits)
        } else {
            (dense_fut.await?, Vec::new())
        };

        self.finish(query, dense, keyword_hits, top_k).await
    }

    async fn finish(
        &self,
        query: &str,
        dense: Vec<Scored<oasis_core::model::Chunk>>,
        keyword: Vec<Scored<oasis_core::model::Chunk>>,
        top_k: usize,
    ) -> anyhow::Result<Vec<RetrievalResult>> {
        debug!(
            query,
            dense = dense.len(),
            keyword = keyword.len(),
            "fusing result lists"
        );

        let dense_ranked: Vec<(String, f32)> = dense
            .iter()
            .map(|s| (s.item.id.clone(), s.score))
            .collect();
        let keyword_ranked: Vec<(String, f32)> = keyword
            .iter()
            .map(|s| (s.item.id.clone(), s.score))
            .collect();

        let fused = rrf_fuse(
            &dense_ranked,
            &keyword_ranked,
            RRF_K,
            self.config.keyword_weight,
        );

        let mut by_id: std::collections::HashMap<String, oasis_core::model::Chunk> = dense
            .into_iter()
            .chain(keyword)
            .map(|s| (s.item.id.clone(), s.item))
            .collect();

        let mut results: Vec<RetrievalResult> = fused
            .into_iter()
            .filter(|(_, score)| match self.config.score_threshold {
                Some(threshold) => *score >= threshold,
                None => true,
            })
            .filter_map(|(id, score)| {
                by_id.remove(&id).map(|chunk| RetrievalResult {
                    chunk_id: chunk.id,
                    content: chunk.content,
                    score,
                    graph_context: Vec::new(),
                })
            })
            .collect();

        if let Some(ratio) = self.config.rerank_drop_ratio {
            if let Some(top) = results.first().map(|r| r.score) {
                results.retain(|r| r.score >= top * ratio);
            }
        }
        results.truncate(top_k);

        if self.has_graph {
            self.expand_graph(&mut results).await;
        }
        Ok(results)
    }

    /// Attach neighbour context to the top seeds. Failures degrade to
    /// unexpanded results.
    async fn expand_graph(&self, results: &mut [RetrievalResult]) {
        let graph = match self.store.graph() {
            Some(g) => g,
            None => return,
        };
        let n = self.config.graph_top_n.min(results.len());
        for result in results.iter_mut().take(n) {
            let edges = match graph.get_edges(&result.chunk_id).await {
                Ok(edges) => edges,
                Err(e) => {
                    warn!(chunk = %result.chunk_id, error = %e, "graph expansion failed");
                    continue;
                }
            };
            for edge in edges.into_iter().take(self.config.max_graph_contexts) {
                match self.store.get_chunk(&edge.target_id).await {
                    Ok(neighbour) => result.graph_context.push(GraphContext {
                        from_chunk_id: edge.source_id,
                        relation: edge.relation,
                        description: truncate_string(&neighbour.content, 160),
                    }),
                    Err(e) => {
                        warn!(edge = %edge.id, error = %e, "dangling edge skipped")
                    }
                }
            }
        }
    }
}

/// Reciprocal Rank Fusion over a dense and a keyword ranking.
///
/// The fused score of a chunk is `(1-w)/(k + dense_rank) +
/// w/(k + keyword_rank)` over the lists it appears in (ranks are
/// 1-based). Ties break by original dense score, then by chunk id.
/// Deterministic for identical inputs.
pub fn rrf_fuse(
    dense: &[(String, f32)],
    keyword: &[(String, f32)],
    k: f32,
    keyword_weight: f32,
) -> Vec<(String, f32)> {
    let w = keyword_weight.clamp(0.0, 1.0);
    let mut fused: std::collections::HashMap<&str, f32> = std::collections::HashMap::new();
    let mut dense_scores: std::collections::HashMap<&str, f32> = std::collections::HashMap::new();

    for (rank, (id, score)) in dense.iter().enumerate() {
        *fused.entry(id.as_str()).or_insert(0.0) += (1.0 - w) / (k + (rank + 1) as f32);
        dense_scores.insert(id.as_str(), *score);
    }
    for (rank, (id, _)) in keyword.iter().enumerate() {
        *fused.entry(id.as_str()).or_insert(0.0) += w / (k + (rank + 1) as f32);
    }

    let mut out: Vec<(String, f32)> = fused
        .into_iter()
        .map(|(id, score)| (id.to_string(), score))
        .collect();
    out.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let da = dense_scores.get(a.0.as_str()).copied().unwrap_or(0.0);
                let db = dense_scores.get(b.0.as_str()).copied().unwrap_or(0.0);
                db.partial_cmp(&da).unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.0.cmp(&b.0))
    });
    out
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
