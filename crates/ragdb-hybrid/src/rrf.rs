use std::collections::HashMap;

use ragdb_core::types::{Chunk, FusionResult, ScoredChunk};

pub const DEFAULT_RRF_K: f64 = 60.0;

/// Weighted reciprocal rank fusion.
///
/// Each list contributes `weight / (rank + k)` (rank from 1) to the chunk's
/// fused score. Chunks are identified by content, so identical text from
/// different backends is one candidate; the first-seen copy is kept. Lists
/// without a weight entry weigh 1.0. Equal scores keep first-seen order.
pub fn reciprocal_rank_fusion(lists: &[Vec<Chunk>], weights: &[f64], k: f64) -> FusionResult {
    let mut scores: HashMap<&str, f64> = HashMap::new();
    let mut order: Vec<&Chunk> = Vec::new();

    for (i, list) in lists.iter().enumerate() {
        let weight = weights.get(i).copied().unwrap_or(1.0);
        for (rank, chunk) in list.iter().enumerate() {
            let contribution = weight / ((rank + 1) as f64 + k);
            match scores.get_mut(chunk.content.as_str()) {
                Some(score) => *score += contribution,
                None => {
                    scores.insert(chunk.content.as_str(), contribution);
                    order.push(chunk);
                }
            }
        }
    }

    let mut fused: Vec<ScoredChunk> = order
        .into_iter()
        .map(|c| ScoredChunk { chunk: c.clone(), score: scores[c.content.as_str()] })
        .collect();
    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    fused
}
