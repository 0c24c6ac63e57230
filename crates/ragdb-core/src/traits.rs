//! Capabilities the core consumes. Model clients, OCR, document parsers and
//! databases live behind these traits.

use std::path::Path;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::types::{Chunk, DocInfo, Document, KnowledgeFile, RetrievedDocument, ScoredChunk};

/// Format-specific document loader.
pub trait Loader: Send + Sync {
    fn load(&self, path: &Path) -> anyhow::Result<Vec<Document>>;

    /// Paged formats yield one unit per page that is indexed as-is.
    fn is_paged(&self) -> bool { false }
}

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Text-in, text-out language model.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;

    /// Streaming variant; the default yields the whole completion once.
    fn stream<'a>(&'a self, prompt: &'a str) -> BoxStream<'a, anyhow::Result<String>> {
        stream::once(async move { self.complete(prompt).await }).boxed()
    }
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> anyhow::Result<String>;

    async fn summarize_table(&self, table: &str) -> anyhow::Result<String> {
        self.summarize(table).await
    }
}

#[async_trait]
pub trait QueryRewriter: Send + Sync {
    async fn rewrite(&self, query: &str) -> anyhow::Result<Vec<String>>;
}

/// Nearest-neighbour chunk store.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Top `top_k` chunks by similarity, dropping hits below `score_threshold`.
    async fn search(&self, query: &str, top_k: usize, score_threshold: Option<f32>) -> anyhow::Result<Vec<(Chunk, f32)>>;

    /// Replace every chunk of `file` with `chunks`. Deletion completes before
    /// the insert is acknowledged.
    async fn update(&self, file: &KnowledgeFile, chunks: &[Chunk]) -> anyhow::Result<Vec<DocInfo>>;

    async fn get_by_id(&self, ids: &[String]) -> anyhow::Result<Vec<Chunk>>;

    async fn delete_file(&self, file: &KnowledgeFile) -> anyhow::Result<usize>;
}

/// Auxiliary retrieval backend (keyword index, web search, ...).
#[async_trait]
pub trait Retriever: Send + Sync {
    fn name(&self) -> &str;
    async fn retrieve(&self, query: &str) -> anyhow::Result<Vec<RetrievedDocument>>;
}

/// Secondary index fed by the indexing pipeline after vector persistence.
#[async_trait]
pub trait ChunkSink: Send + Sync {
    async fn replace_file(&self, file: &KnowledgeFile, chunks: &[Chunk]) -> anyhow::Result<()>;
}

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Reorder `candidates` for `query` and keep at most `top_k`.
    async fn rank(&self, query: &str, candidates: Vec<ScoredChunk>, top_k: usize) -> anyhow::Result<Vec<ScoredChunk>>;
}

/// Relational bookkeeping of files and their chunk records.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn delete_file(&self, file: &KnowledgeFile) -> anyhow::Result<()>;
    async fn add_file(&self, file: &KnowledgeFile, docs_count: usize) -> anyhow::Result<()>;
    async fn add_docs(&self, kb_name: &str, filename: &str, doc_infos: &[DocInfo]) -> anyhow::Result<()>;
}
