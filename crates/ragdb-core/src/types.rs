//! Domain types shared by the splitter, the indexing pipeline and the
//! retrieval engines.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub type ChunkId = String;
pub type Metadata = BTreeMap<String, String>;

pub const META_ID: &str = "id";
pub const META_PARENT_ID: &str = "parent_id";
pub const META_MULTI_VECTOR_TYPE: &str = "multi_vector_type";
pub const META_KNOWLEDGE_PATH: &str = "knowledge_path";
pub const META_SOURCE: &str = "source";
pub const META_FILENAME: &str = "filename";
pub const META_PAGE_NUMBER: &str = "page_number";
pub const META_CONTENT_TYPE: &str = "content_type";

/// Raw loader output: one unit of text (a page, a section, a whole file)
/// plus whatever the loader knows about it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), metadata: Metadata::new() }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// How a derived chunk was produced from its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MultiVectorType {
    SmallToBig,
    TextSummary,
    TableSummary,
}

impl MultiVectorType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SmallToBig => "text small-to-big",
            Self::TextSummary => "text summary",
            Self::TableSummary => "table summary",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text small-to-big" => Some(Self::SmallToBig),
            "text summary" => Some(Self::TextSummary),
            "table summary" => Some(Self::TableSummary),
            _ => None,
        }
    }
}

/// The retrievable unit.
///
/// `id` is fixed at construction and mirrored into `metadata["id"]`, so a
/// chunk that went through a store and came back as a bag of key/values can
/// be rebuilt with [`Chunk::from_parts`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    id: ChunkId,
    pub content: String,
    pub metadata: Metadata,
}

impl Chunk {
    pub fn new(id: impl Into<ChunkId>, content: impl Into<String>, mut metadata: Metadata) -> Self {
        let id = id.into();
        metadata.insert(META_ID.to_string(), id.clone());
        Self { id, content: content.into(), metadata }
    }

    /// Rebuild a chunk from persisted parts; the id comes from the metadata
    /// when present and falls back to `fallback_id`.
    pub fn from_parts(fallback_id: &str, content: impl Into<String>, metadata: Metadata) -> Self {
        let id = metadata.get(META_ID).cloned().unwrap_or_else(|| fallback_id.to_string());
        Self::new(id, content, metadata)
    }

    pub fn id(&self) -> &str { &self.id }

    pub fn parent_id(&self) -> Option<&str> {
        self.metadata.get(META_PARENT_ID).map(String::as_str).filter(|p| !p.is_empty())
    }

    pub fn multi_vector_type(&self) -> Option<MultiVectorType> {
        self.metadata.get(META_MULTI_VECTOR_TYPE).and_then(|t| MultiVectorType::parse(t))
    }

    pub fn is_derived(&self) -> bool { self.parent_id().is_some() }
}

/// A chunk as returned by one retrieval backend. `score` only has meaning
/// relative to other hits from the same `retriever`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub chunk: Chunk,
    pub score: f32,
    pub retriever: String,
}

impl RetrievedDocument {
    pub fn new(chunk: Chunk, score: f32, retriever: impl Into<String>) -> Self {
        Self { chunk, score, retriever: retriever.into() }
    }
}

/// One entry of a fused ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f64,
}

/// Ordered, content-deduplicated, scores non-increasing.
pub type FusionResult = Vec<ScoredChunk>;

/// What the vector store reports back per inserted chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocInfo {
    pub id: ChunkId,
    pub metadata: Metadata,
    pub content: String,
}

impl From<&Chunk> for DocInfo {
    fn from(c: &Chunk) -> Self {
        Self { id: c.id().to_string(), metadata: c.metadata.clone(), content: c.content.clone() }
    }
}

/// A source file in a knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeFile {
    pub kb_name: String,
    pub filename: String,
    pub path: PathBuf,
    pub ext: String,
    pub splitter: String,
}

impl KnowledgeFile {
    pub fn new(kb_name: &str, path: &Path, splitter: &str) -> Self {
        let filename = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        Self {
            kb_name: kb_name.to_string(),
            filename,
            path: path.to_path_buf(),
            ext,
            splitter: splitter.to_string(),
        }
    }

    /// Deterministic key derived from the file name; every chunk of the file
    /// carries it as `metadata["source"]` so a re-index can find and delete
    /// the previous chunk set.
    pub fn source_key(&self) -> String {
        blake3::hash(self.filename.as_bytes()).to_hex().to_string()
    }

    /// File name without its extension, used as the filename prefix.
    pub fn stem(&self) -> &str {
        match self.filename.rfind('.') {
            Some(i) if i > 0 => &self.filename[..i],
            _ => &self.filename,
        }
    }
}
