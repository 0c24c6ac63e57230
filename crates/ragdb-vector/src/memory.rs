use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use ragdb_core::traits::{Embedder, VectorStore};
use ragdb_core::types::{Chunk, DocInfo, KnowledgeFile, META_FILENAME, META_SOURCE};

struct Row {
    seq: u64,
    source: String,
    chunk: Chunk,
    vector: Vec<f32>,
}

#[derive(Default)]
struct Arena {
    next_seq: u64,
    rows: HashMap<String, Row>,
}

/// Chunk arena keyed by id with brute-force cosine search. Parent lookups
/// are plain id lookups; children only hold their parent's id.
pub struct InMemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    arena: RwLock<Arena>,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self { Self { embedder, arena: RwLock::new(Arena::default()) } }

    pub async fn len(&self) -> usize { self.arena.read().await.rows.len() }

    pub async fn is_empty(&self) -> bool { self.len().await == 0 }

    /// Chunks of `file` in insertion order.
    pub async fn chunks_of(&self, file: &KnowledgeFile) -> Vec<Chunk> {
        let key = file.source_key();
        let arena = self.arena.read().await;
        let mut rows: Vec<&Row> = arena.rows.values().filter(|r| r.source == key).collect();
        rows.sort_by_key(|r| r.seq);
        rows.into_iter().map(|r| r.chunk.clone()).collect()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn search(&self, query: &str, top_k: usize, score_threshold: Option<f32>) -> anyhow::Result<Vec<(Chunk, f32)>> {
        let q = self
            .embedder
            .embed_batch(&[query.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))?;
        let arena = self.arena.read().await;
        let mut hits: Vec<(u64, &Chunk, f32)> = arena
            .rows
            .values()
            .map(|r| (r.seq, &r.chunk, cosine(&q, &r.vector)))
            .filter(|(_, _, s)| score_threshold.map_or(true, |t| *s >= t))
            .collect();
        hits.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
        Ok(hits.into_iter().take(top_k).map(|(_, c, s)| (c.clone(), s)).collect())
    }

    async fn update(&self, file: &KnowledgeFile, chunks: &[Chunk]) -> anyhow::Result<Vec<DocInfo>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = if texts.is_empty() { Vec::new() } else { self.embedder.embed_batch(&texts)? };
        if vectors.len() != chunks.len() {
            anyhow::bail!("embedder returned {} vectors for {} chunks", vectors.len(), chunks.len());
        }
        let key = file.source_key();

        let mut arena = self.arena.write().await;
        arena.rows.retain(|_, r| r.source != key);
        let mut infos = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.iter().zip(vectors) {
            let mut chunk = chunk.clone();
            chunk.metadata.insert(META_SOURCE.to_string(), key.clone());
            chunk.metadata.insert(META_FILENAME.to_string(), file.filename.clone());
            infos.push(DocInfo::from(&chunk));
            let seq = arena.next_seq;
            arena.next_seq += 1;
            arena.rows.insert(chunk.id().to_string(), Row { seq, source: key.clone(), chunk, vector });
        }
        debug!(file = %file.filename, chunks = infos.len(), "replaced chunks in memory store");
        Ok(infos)
    }

    async fn get_by_id(&self, ids: &[String]) -> anyhow::Result<Vec<Chunk>> {
        let arena = self.arena.read().await;
        Ok(ids.iter().filter_map(|id| arena.rows.get(id).map(|r| r.chunk.clone())).collect())
    }

    async fn delete_file(&self, file: &KnowledgeFile) -> anyhow::Result<usize> {
        let key = file.source_key();
        let mut arena = self.arena.write().await;
        let before = arena.rows.len();
        arena.rows.retain(|_, r| r.source != key);
        Ok(before - arena.rows.len())
    }
}

pub(crate) fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}
