//! Long-term memory: text extraction, recursive chunking, ingestion,
//! and hybrid dense+keyword retrieval with graph expansion.

pub mod chunker;
pub mod extract;
pub mod ingest;
pub mod retriever;

pub use chunker::{chunk_text, ChunkerConfig};
pub use extract::{extractor_for, Extracted, Extractor, PageMeta};
pub use ingest::Ingestor;
pub use retriever::{GraphContext, HybridRetriever, RetrievalResult, RetrieverConfig};
