//! Small-chunk merging.
//!
//! A chunk shorter than `min_chunk_size` swallows its successors until it
//! reaches `2 * min_chunk_size` or the sequence ends. A short tail is folded
//! back into the chunk before it.

use std::collections::{BTreeMap, HashMap};

use ragdb_core::types::{Chunk, ChunkId, META_PARENT_ID};

use crate::splitter::char_len;

const JOINER: &str = "\n";

#[derive(Debug, Default)]
pub struct MergeOutcome {
    pub chunks: Vec<Chunk>,
    /// Absorbed chunk id -> id of the chunk now holding its text.
    pub absorbed: BTreeMap<ChunkId, ChunkId>,
}

pub fn merge_small_chunks(chunks: Vec<Chunk>, min_chunk_size: usize) -> Vec<Chunk> {
    merge_with_remap(chunks, min_chunk_size).chunks
}

pub fn merge_with_remap(chunks: Vec<Chunk>, min_chunk_size: usize) -> MergeOutcome {
    let mut out: Vec<Chunk> = Vec::with_capacity(chunks.len());
    let mut absorbed = BTreeMap::new();
    let mut iter = chunks.into_iter();

    while let Some(mut current) = iter.next() {
        if char_len(&current.content) < min_chunk_size {
            while char_len(&current.content) < min_chunk_size * 2 {
                let Some(next) = iter.next() else { break };
                append(&mut current, &next);
                absorbed.insert(next.id().to_string(), current.id().to_string());
            }
        }
        out.push(current);
    }

    if out.len() > 1 && out.last().is_some_and(|c| char_len(&c.content) < min_chunk_size) {
        if let Some(tail) = out.pop() {
            if let Some(prev) = out.last_mut() {
                append(prev, &tail);
                let survivor = prev.id().to_string();
                for target in absorbed.values_mut() {
                    if target.as_str() == tail.id() {
                        target.clone_from(&survivor);
                    }
                }
                absorbed.insert(tail.id().to_string(), survivor);
            }
        }
    }

    MergeOutcome { chunks: out, absorbed }
}

/// Merge parents, re-point derived chunks whose parent was absorbed, then
/// merge derived chunks within each parent group. Parents come first in the
/// result, followed by the derived groups in first-seen order.
pub fn merge_expanded(parents: Vec<Chunk>, derived: Vec<Chunk>, min_chunk_size: usize) -> Vec<Chunk> {
    let MergeOutcome { mut chunks, absorbed } = merge_with_remap(parents, min_chunk_size);

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Chunk>> = HashMap::new();
    for mut child in derived {
        let parent = child.parent_id().unwrap_or_default().to_string();
        let parent = match absorbed.get(&parent) {
            Some(survivor) => {
                child.metadata.insert(META_PARENT_ID.to_string(), survivor.clone());
                survivor.clone()
            }
            None => parent,
        };
        groups
            .entry(parent.clone())
            .or_insert_with(|| {
                order.push(parent);
                Vec::new()
            })
            .push(child);
    }

    for parent in order {
        if let Some(group) = groups.remove(&parent) {
            chunks.extend(merge_small_chunks(group, min_chunk_size));
        }
    }
    chunks
}

fn append(into: &mut Chunk, other: &Chunk) {
    into.content.push_str(JOINER);
    into.content.push_str(&other.content);
}
