//! Contextual chunk enrichment: a model writes a short note situating each
//! chunk among its neighbours, and the note is prepended to the chunk.

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

use ragdb_core::error::{Error, Result};
use ragdb_core::traits::Generator;
use ragdb_core::types::Chunk;

/// Neighbours on each side that make up a chunk's surrounding document.
const WINDOW: usize = 2;
const CONCURRENCY: usize = 4;

const CONTEXT_PROMPT: &str = "<document>\n{document}\n</document>\nHere is the chunk we want to situate within the \
whole document\n<chunk>\n{chunk}\n</chunk>\nGive a short context (at most 50 words) that situates this chunk within \
the document for search retrieval. Answer with the context only.";

fn prompt_for(chunks: &[Chunk], i: usize) -> String {
    let start = i.saturating_sub(WINDOW);
    let end = (i + WINDOW + 1).min(chunks.len());
    let document = chunks[start..end].iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join("\n\n");
    CONTEXT_PROMPT.replace("{document}", &document).replace("{chunk}", &chunks[i].content)
}

/// Prefix every chunk with `"{context}:"`, keeping order, ids and metadata.
/// Any generator failure fails the whole batch.
pub async fn add_context(generator: &dyn Generator, chunks: Vec<Chunk>) -> Result<Vec<Chunk>> {
    let prompts: Vec<String> = (0..chunks.len()).map(|i| prompt_for(&chunks, i)).collect();
    let contexts: Vec<String> = stream::iter(prompts)
        .map(|prompt| async move { generator.complete(&prompt).await })
        .buffered(CONCURRENCY)
        .try_collect()
        .await
        .map_err(|e| Error::Expansion(format!("contextual chunking: {e:#}")))?;

    debug!(chunks = chunks.len(), "contextualized");
    Ok(chunks
        .into_iter()
        .zip(contexts)
        .map(|(mut c, context)| {
            c.content = format!("{}:{}", context.trim(), c.content);
            c
        })
        .collect())
}
