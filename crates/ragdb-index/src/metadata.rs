use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use ragdb_core::traits::MetadataStore;
use ragdb_core::types::{DocInfo, KnowledgeFile};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub kb_name: String,
    pub filename: String,
    pub ext: String,
    pub splitter: String,
    pub docs_count: usize,
    pub indexed_at: DateTime<Utc>,
}

type Key = (String, String);

#[derive(Default)]
struct Tables {
    files: BTreeMap<Key, FileRecord>,
    docs: BTreeMap<Key, Vec<DocInfo>>,
}

/// File and chunk bookkeeping kept in memory, keyed by (kb, filename).
#[derive(Default)]
pub struct InMemoryMetadataStore {
    tables: Mutex<Tables>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self { Self::default() }

    pub async fn file(&self, kb_name: &str, filename: &str) -> Option<FileRecord> {
        self.tables.lock().await.files.get(&(kb_name.to_string(), filename.to_string())).cloned()
    }

    pub async fn docs(&self, kb_name: &str, filename: &str) -> Vec<DocInfo> {
        self.tables.lock().await.docs.get(&(kb_name.to_string(), filename.to_string())).cloned().unwrap_or_default()
    }

    pub async fn file_count(&self) -> usize { self.tables.lock().await.files.len() }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn delete_file(&self, file: &KnowledgeFile) -> anyhow::Result<()> {
        let key = (file.kb_name.clone(), file.filename.clone());
        let mut t = self.tables.lock().await;
        t.files.remove(&key);
        t.docs.remove(&key);
        Ok(())
    }

    async fn add_file(&self, file: &KnowledgeFile, docs_count: usize) -> anyhow::Result<()> {
        let record = FileRecord {
            kb_name: file.kb_name.clone(),
            filename: file.filename.clone(),
            ext: file.ext.clone(),
            splitter: file.splitter.clone(),
            docs_count,
            indexed_at: Utc::now(),
        };
        self.tables.lock().await.files.insert((file.kb_name.clone(), file.filename.clone()), record);
        Ok(())
    }

    async fn add_docs(&self, kb_name: &str, filename: &str, doc_infos: &[DocInfo]) -> anyhow::Result<()> {
        self.tables
            .lock()
            .await
            .docs
            .entry((kb_name.to_string(), filename.to_string()))
            .or_default()
            .extend_from_slice(doc_infos);
        Ok(())
    }
}
