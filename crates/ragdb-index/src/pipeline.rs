use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use ragdb_core::config::{expand_path, IndexingSettings};
use ragdb_core::error::{Error, Result};
use ragdb_core::traits::{ChunkSink, Generator, MetadataStore, Summarizer, VectorStore};
use ragdb_core::types::{Chunk, Document, KnowledgeFile, META_FILENAME, META_KNOWLEDGE_PATH, META_SOURCE};
use ragdb_split::{merge_expanded, splitter_for, ExpansionConfig, MultiVectorExpander};

use crate::contextual::add_context;
use crate::loader::LoaderRegistry;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub default_splitter: String,
    pub expansion: ExpansionConfig,
    pub knowledge_path_enhance: bool,
    pub embedding_filename: bool,
    pub merge_small_chunks: bool,
    pub min_chunk_size: usize,
    /// Prefix every chunk with a model-written situating context.
    pub contextual: bool,
    pub workers: usize,
    pub dump_chunks_dir: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn from_settings(ix: &IndexingSettings) -> Self {
        Self {
            chunk_size: ix.chunk_size,
            chunk_overlap: ix.chunk_overlap,
            default_splitter: ix.splitter.clone(),
            expansion: ExpansionConfig { smaller_chunk_size: ix.smaller_chunk_size, summary: ix.summary },
            knowledge_path_enhance: ix.knowledge_path_enhance,
            embedding_filename: ix.embedding_filename,
            merge_small_chunks: ix.merge_small_chunks,
            min_chunk_size: ix.min_chunk_size,
            contextual: ix.contextual,
            workers: ix.workers,
            dump_chunks_dir: ix.dump_chunks_dir.as_deref().map(expand_path),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self { Self::from_settings(&IndexingSettings::default()) }
}

/// Outcome of a batch: chunk counts for indexed files, messages for failed ones.
#[derive(Debug, Default)]
pub struct IndexReport {
    pub indexed: BTreeMap<String, usize>,
    pub failed: BTreeMap<String, String>,
}

/// load -> split -> expand -> merge -> annotate -> context -> persist, per file.
pub struct IndexingPipeline {
    config: PipelineConfig,
    loaders: LoaderRegistry,
    vector_store: Arc<dyn VectorStore>,
    metadata_store: Arc<dyn MetadataStore>,
    sinks: Vec<Arc<dyn ChunkSink>>,
    expander: MultiVectorExpander,
    context_generator: Option<Arc<dyn Generator>>,
}

impl IndexingPipeline {
    pub fn new(
        config: PipelineConfig,
        loaders: LoaderRegistry,
        vector_store: Arc<dyn VectorStore>,
        metadata_store: Arc<dyn MetadataStore>,
        summarizer: Option<Arc<dyn Summarizer>>,
    ) -> Result<Self> {
        if config.chunk_overlap >= config.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        let expander = MultiVectorExpander::new(&config.expansion, summarizer)?;
        Ok(Self { config, loaders, vector_store, metadata_store, sinks: Vec::new(), expander, context_generator: None })
    }

    /// Secondary index that receives every file's final chunks after the vector store.
    pub fn with_sink(mut self, sink: Arc<dyn ChunkSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Model used by the contextual stage when `contextual` is on.
    pub fn with_context_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.context_generator = Some(generator);
        self
    }

    pub fn config(&self) -> &PipelineConfig { &self.config }

    pub async fn load(&self, file: &KnowledgeFile) -> Result<(Vec<Document>, bool)> {
        let loader = self
            .loaders
            .get(&file.ext)
            .ok_or_else(|| Error::load(&file.filename, format!("no loader for extension '{}'", file.ext)))?;
        let paged = loader.is_paged();
        let path = file.path.clone();
        let docs = tokio::task::spawn_blocking(move || loader.load(&path))
            .await
            .map_err(|e| Error::load(&file.filename, e))?
            .map_err(|e| Error::load(&file.filename, format!("{e:#}")))?;
        Ok((docs, paged))
    }

    /// Split loaded documents into parent chunks with fresh ids. Paged
    /// documents become one chunk per page.
    pub fn split(&self, file: &KnowledgeFile, docs: Vec<Document>, paged: bool) -> Result<Vec<Chunk>> {
        let pieces = if paged {
            docs
        } else {
            let name = if file.splitter.is_empty() { self.config.default_splitter.as_str() } else { file.splitter.as_str() };
            splitter_for(name, self.config.chunk_size, self.config.chunk_overlap)?.split_documents(&docs)
        };
        Ok(pieces
            .into_iter()
            .filter(|d| !d.content.trim().is_empty())
            .map(|d| Chunk::new(Uuid::new_v4().to_string(), d.content, d.metadata))
            .collect())
    }

    fn annotate(&self, file: &KnowledgeFile, chunks: &mut [Chunk]) {
        if self.config.knowledge_path_enhance {
            for c in chunks.iter_mut() {
                if let Some(path) = c.metadata.get(META_KNOWLEDGE_PATH).filter(|p| !p.is_empty()) {
                    c.content = format!("{path}: \n{}", c.content);
                }
            }
        }
        if self.config.embedding_filename {
            let stem = file.stem();
            for c in chunks.iter_mut() {
                c.content = format!("{stem}: \n{}", c.content);
            }
        }
    }

    /// Every chunk the file contributes: parents first, then derived chunks.
    /// Merging sees the raw text; prefixes go on the final chunks.
    pub async fn file_to_chunks(&self, file: &KnowledgeFile) -> Result<Vec<Chunk>> {
        let (docs, paged) = self.load(file).await?;
        let parents = self.split(file, docs, paged)?;

        let derived = if self.expander.is_enabled() { self.expander.expand(&parents).await? } else { Vec::new() };
        debug!(file = %file.filename, parents = parents.len(), derived = derived.len(), "chunked");

        let mut chunks = if self.config.merge_small_chunks {
            merge_expanded(parents, derived, self.config.min_chunk_size)
        } else {
            parents.into_iter().chain(derived).collect()
        };
        self.annotate(file, &mut chunks);

        if self.config.contextual {
            let generator = self.context_generator.as_deref().ok_or_else(|| {
                Error::InvalidConfig("contextual chunking is enabled but no generator is configured".into())
            })?;
            chunks = add_context(generator, chunks).await?;
        }

        let source = file.source_key();
        for c in &mut chunks {
            c.metadata.insert(META_SOURCE.to_string(), source.clone());
            c.metadata.insert(META_FILENAME.to_string(), file.filename.clone());
        }
        Ok(chunks)
    }

    /// Supersede the file's previous records everywhere. Bookkeeping is
    /// cleared first, then the vector store and sinks replace the chunk set.
    pub async fn store(&self, file: &KnowledgeFile, chunks: &[Chunk]) -> Result<()> {
        let persist = |what: &str, e: anyhow::Error| Error::Persistence(format!("{what} for {}: {e:#}", file.filename));

        self.metadata_store.delete_file(file).await.map_err(|e| persist("metadata delete", e))?;
        let doc_infos = self.vector_store.update(file, chunks).await.map_err(|e| persist("vector store update", e))?;
        for sink in &self.sinks {
            sink.replace_file(file, chunks).await.map_err(|e| persist("chunk sink update", e))?;
        }
        self.metadata_store.add_file(file, chunks.len()).await.map_err(|e| persist("metadata add_file", e))?;
        self.metadata_store
            .add_docs(&file.kb_name, &file.filename, &doc_infos)
            .await
            .map_err(|e| persist("metadata add_docs", e))?;
        Ok(())
    }

    /// Chunk and persist one file; returns the number of chunks stored.
    pub async fn index_file(&self, file: &KnowledgeFile) -> Result<usize> {
        info!(file = %file.filename, "indexing");
        let chunks = self.file_to_chunks(file).await?;
        if let Some(dir) = &self.config.dump_chunks_dir {
            if let Err(e) = dump_chunks(dir, file, &chunks).await {
                warn!(file = %file.filename, error = %e, "could not dump chunks");
            }
        }
        self.store(file, &chunks).await?;
        info!(file = %file.filename, chunks = chunks.len(), "indexed");
        Ok(chunks.len())
    }

    pub async fn index_files(&self, files: Vec<KnowledgeFile>) -> IndexReport {
        self.index_files_with(files, |_, _| {}).await
    }

    /// Index `files` with at most `workers` in flight. Per-file errors never
    /// escape; they land in `IndexReport::failed`. `on_file` sees every
    /// outcome as it completes.
    pub async fn index_files_with<F>(&self, files: Vec<KnowledgeFile>, mut on_file: F) -> IndexReport
    where
        F: FnMut(&KnowledgeFile, &Result<usize>),
    {
        let workers = self.config.workers.max(1);
        let mut outcomes = stream::iter(files)
            .map(|file| async move {
                let res = self.index_file(&file).await;
                (file, res)
            })
            .buffer_unordered(workers);

        let mut report = IndexReport::default();
        while let Some((file, res)) = outcomes.next().await {
            on_file(&file, &res);
            match res {
                Ok(n) => {
                    report.indexed.insert(file.filename, n);
                }
                Err(e) => {
                    error!(file = %file.filename, error = %e, "indexing failed");
                    report.failed.insert(file.filename, e.to_string());
                }
            }
        }
        info!(indexed = report.indexed.len(), failed = report.failed.len(), "batch finished");
        report
    }
}

async fn dump_chunks(dir: &std::path::Path, file: &KnowledgeFile, chunks: &[Chunk]) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let mut out = String::new();
    for (i, c) in chunks.iter().enumerate() {
        out.push_str(&format!("--- Chunk {} ---\n{}\n\n", i + 1, c.content));
    }
    tokio::fs::write(dir.join(format!("{}.txt", file.filename)), out).await
}
