use ragdb_core::types::ScoredChunk;

/// Passages scoring above `threshold`; the single best one when none do.
pub fn select_passages(results: &[ScoredChunk], threshold: f64) -> Vec<&ScoredChunk> {
    let picked: Vec<&ScoredChunk> = results.iter().filter(|r| r.score > threshold).collect();
    if !picked.is_empty() {
        return picked;
    }
    results
        .iter()
        .fold(None, |best: Option<&ScoredChunk>, r| match best {
            Some(b) if b.score >= r.score => Some(b),
            _ => Some(r),
        })
        .into_iter()
        .collect()
}

/// Numbered passages, one block each, ready to drop into a prompt.
pub fn build_context(passages: &[&ScoredChunk]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| format!("[{}] {}", i + 1, p.chunk.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
