use std::collections::HashSet;

use async_trait::async_trait;

use ragdb_core::terms::tokens;
use ragdb_core::traits::Reranker;
use ragdb_core::types::ScoredChunk;

/// Scores each candidate by the share of distinct query terms its content
/// contains. Ties keep the incoming order.
#[derive(Debug, Default, Clone)]
pub struct TermOverlapReranker;

impl TermOverlapReranker {
    pub fn new() -> Self { Self }

    fn overlap(query_terms: &HashSet<String>, content: &str) -> f64 {
        if query_terms.is_empty() {
            return 0.0;
        }
        let doc: HashSet<String> = tokens(content).into_iter().collect();
        query_terms.intersection(&doc).count() as f64 / query_terms.len() as f64
    }
}

#[async_trait]
impl Reranker for TermOverlapReranker {
    async fn rank(&self, query: &str, candidates: Vec<ScoredChunk>, top_k: usize) -> anyhow::Result<Vec<ScoredChunk>> {
        let terms: HashSet<String> = tokens(query).into_iter().collect();
        let mut ranked: Vec<ScoredChunk> = candidates
            .into_iter()
            .map(|c| {
                let score = Self::overlap(&terms, &c.chunk.content);
                ScoredChunk { chunk: c.chunk, score }
            })
            .collect();
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(top_k);
        Ok(ranked)
    }
}
