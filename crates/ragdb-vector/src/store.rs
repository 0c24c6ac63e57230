use std::sync::Arc;

use anyhow::{anyhow, Result};
use arrow_array::{FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType};
use tracing::{debug, info};

use ragdb_core::traits::{Embedder, VectorStore};
use ragdb_core::types::{Chunk, DocInfo, KnowledgeFile, Metadata, META_FILENAME, META_SOURCE};

use crate::schema::{build_chunk_schema, COL_CONTENT, COL_ID, COL_METADATA, COL_SOURCE};
use crate::table::{ensure_table, open_db, sql_quote};

/// Vector store over one LanceDB table. Every row carries the blake3 source
/// key of its file so a re-index can delete the previous chunk set.
pub struct LanceVectorStore {
    conn: Connection,
    table_name: String,
    embedder: Arc<dyn Embedder>,
}

impl LanceVectorStore {
    pub async fn open(uri: &str, table_name: &str, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let conn = open_db(uri).await?;
        ensure_table(&conn, table_name, build_chunk_schema(dim_i32(embedder.as_ref())?)).await?;
        Ok(Self { conn, table_name: table_name.to_string(), embedder })
    }

    pub async fn count(&self) -> Result<usize> {
        let t = self.conn.open_table(&self.table_name).execute().await?;
        Ok(t.count_rows(None).await?)
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embedder.embed_batch(&[text.to_string()])?.pop().ok_or_else(|| anyhow!("embedder returned no vector"))
    }

    fn to_record_batch(&self, source: &str, chunks: &[Chunk], vectors: Vec<Vec<f32>>) -> Result<RecordBatch> {
        let dim = dim_i32(self.embedder.as_ref())?;
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.embedder.dim()) {
            return Err(anyhow!("embedding has {} dims, table expects {}", bad.len(), dim));
        }
        let mut ids = Vec::with_capacity(chunks.len());
        let mut contents = Vec::with_capacity(chunks.len());
        let mut metas = Vec::with_capacity(chunks.len());
        for c in chunks {
            ids.push(c.id().to_string());
            contents.push(c.content.clone());
            metas.push(serde_json::to_string(&c.metadata)?);
        }
        let sources = vec![source.to_string(); chunks.len()];
        let vectors = vectors.into_iter().map(|v| Some(v.into_iter().map(Some).collect::<Vec<_>>()));
        Ok(RecordBatch::try_new(
            build_chunk_schema(dim),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(sources)),
                Arc::new(StringArray::from(contents)),
                Arc::new(StringArray::from(metas)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, dim)),
            ],
        )?)
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn search(&self, query: &str, top_k: usize, score_threshold: Option<f32>) -> Result<Vec<(Chunk, f32)>> {
        let q = self.embed_one(query)?;
        let t = self.conn.open_table(&self.table_name).execute().await?;
        let mut stream = t.vector_search(q)?.distance_type(DistanceType::Cosine).limit(top_k).execute().await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            let chunks = batch_to_chunks(&batch)?;
            let dist = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>());
            for (i, chunk) in chunks.into_iter().enumerate() {
                let score = dist.map_or(0.0, |d| 1.0 - d.value(i));
                if score_threshold.map_or(true, |th| score >= th) {
                    hits.push((chunk, score));
                }
            }
        }
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(hits)
    }

    async fn update(&self, file: &KnowledgeFile, chunks: &[Chunk]) -> Result<Vec<DocInfo>> {
        let removed = self.delete_file(file).await?;
        let source = file.source_key();
        let stamped: Vec<Chunk> = chunks
            .iter()
            .map(|c| {
                let mut c = c.clone();
                c.metadata.insert(META_SOURCE.to_string(), source.clone());
                c.metadata.insert(META_FILENAME.to_string(), file.filename.clone());
                c
            })
            .collect();
        if stamped.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = stamped.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;
        if vectors.len() != stamped.len() {
            return Err(anyhow!("embedder returned {} vectors for {} chunks", vectors.len(), stamped.len()));
        }
        let batch = self.to_record_batch(&source, &stamped, vectors)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        let t = self.conn.open_table(&self.table_name).execute().await?;
        t.add(reader).execute().await?;
        info!(file = %file.filename, removed, inserted = stamped.len(), "updated chunks in lancedb");
        Ok(stamped.iter().map(DocInfo::from).collect())
    }

    async fn get_by_id(&self, ids: &[String]) -> Result<Vec<Chunk>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let list = ids.iter().map(|id| sql_quote(id)).collect::<Vec<_>>().join(", ");
        let t = self.conn.open_table(&self.table_name).execute().await?;
        let mut stream = t.query().only_if(format!("{COL_ID} IN ({list})")).execute().await?;
        let mut found = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            found.extend(batch_to_chunks(&batch)?);
        }
        // Keep the caller's id order.
        let mut out = Vec::with_capacity(found.len());
        for id in ids {
            if let Some(pos) = found.iter().position(|c| c.id() == id) {
                out.push(found.swap_remove(pos));
            }
        }
        Ok(out)
    }

    async fn delete_file(&self, file: &KnowledgeFile) -> Result<usize> {
        let filter = format!("{COL_SOURCE} = {}", sql_quote(&file.source_key()));
        let t = self.conn.open_table(&self.table_name).execute().await?;
        let existing = t.count_rows(Some(filter.clone())).await?;
        if existing > 0 {
            t.delete(&filter).await?;
        }
        debug!(file = %file.filename, existing, "deleted previous chunks");
        Ok(existing)
    }
}

fn dim_i32(embedder: &dyn Embedder) -> Result<i32> {
    i32::try_from(embedder.dim()).map_err(|_| anyhow!("embedding dim {} too large", embedder.dim()))
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("column '{name}' missing"))
}

fn batch_to_chunks(batch: &RecordBatch) -> Result<Vec<Chunk>> {
    let ids = string_col(batch, COL_ID)?;
    let contents = string_col(batch, COL_CONTENT)?;
    let metas = string_col(batch, COL_METADATA)?;
    (0..batch.num_rows())
        .map(|i| {
            let metadata: Metadata = serde_json::from_str(metas.value(i))?;
            Ok(Chunk::from_parts(ids.value(i), contents.value(i), metadata))
        })
        .collect()
}
