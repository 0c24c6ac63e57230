use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Value};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, warn};

use ragdb_core::traits::{ChunkSink, Retriever};
use ragdb_core::types::{Chunk, KnowledgeFile, Metadata, RetrievedDocument};

use crate::tantivy_utils::{build_schema, register_tokenizer, segment_cjk, F_CONTENT, F_ID, F_METADATA, F_SOURCE, F_TEXT};

/// BM25 keyword index over chunk content. Fed per file by the indexing
/// pipeline and queried as an auxiliary retriever.
pub struct KeywordIndex {
    name: String,
    top_k: usize,
    index: Index,
    reader: IndexReader,
    writer: Arc<Mutex<IndexWriter>>,
    fields: Fields,
}

#[derive(Clone, Copy)]
struct Fields {
    id: Field,
    source: Field,
    text: Field,
    content: Field,
    metadata: Field,
}

impl KeywordIndex {
    /// Wipe `index_dir` and start an empty index there.
    pub fn create(index_dir: &Path) -> Result<Self> {
        if index_dir.exists() {
            std::fs::remove_dir_all(index_dir)?;
        }
        std::fs::create_dir_all(index_dir)?;
        Self::from_index(Index::create_in_dir(index_dir, build_schema())?)
    }

    pub fn open_or_create(index_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(index_dir)?;
        Self::from_index(Index::open_or_create(MmapDirectory::open(index_dir)?, build_schema())?)
    }

    pub fn in_memory() -> Result<Self> { Self::from_index(Index::create_in_ram(build_schema())) }

    fn from_index(index: Index) -> Result<Self> {
        register_tokenizer(&index);
        let schema = index.schema();
        let reader: IndexReader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
        let writer: IndexWriter = index.writer(50_000_000)?;
        Ok(Self {
            name: "keyword".to_string(),
            top_k: 25,
            fields: Fields {
                id: schema.get_field(F_ID)?,
                source: schema.get_field(F_SOURCE)?,
                text: schema.get_field(F_TEXT)?,
                content: schema.get_field(F_CONTENT)?,
                metadata: schema.get_field(F_METADATA)?,
            },
            index,
            reader,
            writer: Arc::new(Mutex::new(writer)),
        })
    }

    /// Backend name reported on retrieved documents and used for RRF weights.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn num_docs(&self) -> u64 { self.reader.searcher().num_docs() }

    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<(Chunk, f32)>> {
        let searcher = self.reader.searcher();
        let qp = QueryParser::for_index(&self.index, vec![self.fields.text]);
        let (q, errors) = qp.parse_query_lenient(&segment_cjk(query));
        if !errors.is_empty() {
            debug!(query, errors = errors.len(), "lenient query parse dropped parts of the query");
        }
        let top_docs = searcher.search(&q, &TopDocs::with_limit(limit.max(1)))?;
        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, addr) in top_docs {
            let doc: TantivyDocument = searcher.doc(addr)?;
            let text = |f: Field| doc.get_first(f).and_then(|v| v.as_str()).unwrap_or("").to_string();
            let id = text(self.fields.id);
            let metadata: Metadata = serde_json::from_str(&text(self.fields.metadata)).unwrap_or_else(|e| {
                warn!(id = %id, error = %e, "unreadable stored metadata");
                Metadata::new()
            });
            hits.push((Chunk::from_parts(&id, text(self.fields.content), metadata), score));
        }
        Ok(hits)
    }

    /// Swap every document of `source_key` for `chunks`, commit and reload.
    /// Blocks on the commit.
    pub fn replace(&self, source_key: &str, chunks: &[Chunk]) -> Result<()> {
        write_source(&self.writer, &self.reader, self.fields, source_key, chunks)
    }
}

fn write_source(
    writer: &Mutex<IndexWriter>,
    reader: &IndexReader,
    fields: Fields,
    source_key: &str,
    chunks: &[Chunk],
) -> Result<()> {
    let mut writer = writer.lock().map_err(|_| anyhow!("keyword index writer lock poisoned"))?;
    writer.delete_term(Term::from_field_text(fields.source, source_key));
    for c in chunks {
        writer.add_document(doc!(
            fields.id => c.id().to_string(),
            fields.source => source_key.to_string(),
            fields.text => segment_cjk(&c.content),
            fields.content => c.content.clone(),
            fields.metadata => serde_json::to_string(&c.metadata)?,
        ))?;
    }
    writer.commit()?;
    drop(writer);
    reader.reload()?;
    Ok(())
}

#[async_trait]
impl Retriever for KeywordIndex {
    fn name(&self) -> &str { &self.name }

    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedDocument>> {
        Ok(self
            .search(query, self.top_k)?
            .into_iter()
            .map(|(chunk, score)| RetrievedDocument::new(chunk, score, self.name.clone()))
            .collect())
    }
}

#[async_trait]
impl ChunkSink for KeywordIndex {
    async fn replace_file(&self, file: &KnowledgeFile, chunks: &[Chunk]) -> Result<()> {
        let (writer, reader, fields) = (self.writer.clone(), self.reader.clone(), self.fields);
        let source_key = file.source_key();
        let chunks = chunks.to_vec();
        let n = chunks.len();
        tokio::task::spawn_blocking(move || write_source(&writer, &reader, fields, &source_key, &chunks)).await??;
        debug!(file = %file.filename, chunks = n, "replaced chunks in keyword index");
        Ok(())
    }
}
