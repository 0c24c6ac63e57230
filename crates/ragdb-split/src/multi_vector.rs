use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;
use uuid::Uuid;

use ragdb_core::error::{Error, Result};
use ragdb_core::traits::Summarizer;
use ragdb_core::types::{Chunk, Metadata, MultiVectorType, META_CONTENT_TYPE, META_MULTI_VECTOR_TYPE, META_PARENT_ID};

use crate::presets::SplitterKind;
use crate::splitter::RecursiveTextSplitter;

/// Summary requests in flight per expansion.
const SUMMARY_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Default)]
pub struct ExpansionConfig {
    /// Child chunk size; `None` or `0` disables small-to-big children.
    pub smaller_chunk_size: Option<usize>,
    pub summary: bool,
}

/// Derives children and summaries from parent chunks. Derived chunks only
/// point back at their parent through `metadata["parent_id"]`.
pub struct MultiVectorExpander {
    child_splitter: Option<RecursiveTextSplitter>,
    summarizer: Option<Arc<dyn Summarizer>>,
}

impl MultiVectorExpander {
    pub fn new(config: &ExpansionConfig, summarizer: Option<Arc<dyn Summarizer>>) -> Result<Self> {
        let child_splitter = match config.smaller_chunk_size {
            Some(size) if size > 0 => Some(SplitterKind::Recursive.build(size, 0)?),
            _ => None,
        };
        let summarizer = if config.summary {
            Some(summarizer.ok_or_else(|| Error::InvalidConfig("summary enabled without a summarizer".into()))?)
        } else {
            None
        };
        Ok(Self { child_splitter, summarizer })
    }

    pub fn is_enabled(&self) -> bool { self.child_splitter.is_some() || self.summarizer.is_some() }

    /// Children first (in parent order), then one summary per parent.
    /// Any summarizer failure fails the whole expansion.
    pub async fn expand(&self, parents: &[Chunk]) -> Result<Vec<Chunk>> {
        let mut derived = Vec::new();

        if let Some(splitter) = &self.child_splitter {
            for parent in parents {
                for piece in splitter.split_text(&parent.content) {
                    let mut meta = parent.metadata.clone();
                    meta.insert(META_PARENT_ID.to_string(), parent.id().to_string());
                    meta.insert(META_MULTI_VECTOR_TYPE.to_string(), MultiVectorType::SmallToBig.as_str().to_string());
                    derived.push(Chunk::new(new_id(), piece, meta));
                }
            }
            debug!(children = derived.len(), "split small-to-big children");
        }

        if let Some(summarizer) = &self.summarizer {
            let summaries: Vec<Chunk> = stream::iter(parents)
                .map(|p| summarize_one(summarizer.as_ref(), p))
                .buffered(SUMMARY_CONCURRENCY)
                .try_collect()
                .await
                .map_err(|e| Error::Expansion(format!("{e:#}")))?;
            derived.extend(summaries);
        }

        Ok(derived)
    }
}

async fn summarize_one(summarizer: &dyn Summarizer, parent: &Chunk) -> anyhow::Result<Chunk> {
    let is_table = parent.metadata.get(META_CONTENT_TYPE).is_some_and(|t| t == "table");
    let (text, kind) = if is_table {
        (summarizer.summarize_table(&parent.content).await?, MultiVectorType::TableSummary)
    } else {
        (summarizer.summarize(&parent.content).await?, MultiVectorType::TextSummary)
    };
    let mut meta = Metadata::new();
    meta.insert(META_PARENT_ID.to_string(), parent.id().to_string());
    meta.insert(META_MULTI_VECTOR_TYPE.to_string(), kind.as_str().to_string());
    Ok(Chunk::new(new_id(), text, meta))
}

pub(crate) fn new_id() -> String { Uuid::new_v4().to_string() }
