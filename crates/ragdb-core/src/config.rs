//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `RAGDB_*` env
//! vars. `RAGDB_INDEXING__CHUNK_SIZE=300` sets `indexing.chunk_size`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(&env_name)
    }

    pub fn load_for_env(env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("RAGDB_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub indexing: IndexingSettings,
    pub retrieval: RetrievalSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Named splitter used when a file does not pick one.
    pub splitter: String,
    /// Child chunk size for small-to-big retrieval; off when unset or zero.
    pub smaller_chunk_size: Option<usize>,
    pub summary: bool,
    pub knowledge_path_enhance: bool,
    pub embedding_filename: bool,
    pub merge_small_chunks: bool,
    pub min_chunk_size: usize,
    /// LLM-written context prefix per chunk; needs a generator.
    pub contextual: bool,
    pub workers: usize,
    pub dump_chunks_dir: Option<String>,
}

impl Default for IndexingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 250,
            chunk_overlap: 50,
            splitter: "chinese_recursive".to_string(),
            smaller_chunk_size: None,
            summary: false,
            knowledge_path_enhance: true,
            embedding_filename: true,
            merge_small_chunks: true,
            min_chunk_size: 80,
            contextual: false,
            workers: 4,
            dump_chunks_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub vectorstore_top_k: usize,
    pub rerank_top_k: usize,
    pub score_threshold: Option<f32>,
    pub multi_query: bool,
    pub hyde: bool,
    pub rrf_k: f64,
    /// Backend name -> RRF weight; unlisted backends weigh 1.0.
    pub weights: BTreeMap<String, f64>,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            vectorstore_top_k: 25,
            rerank_top_k: 5,
            score_threshold: Some(0.0),
            multi_query: false,
            hyde: false,
            rrf_k: 60.0,
            weights: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub lancedb_dir: String,
    pub table: String,
    pub keyword_index_dir: String,
    pub kb_name: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            lancedb_dir: "../dev_data/indexes/lancedb".to_string(),
            table: "chunks".to_string(),
            keyword_index_dir: "../dev_data/indexes/tantivy".to_string(),
            kb_name: "default".to_string(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> crate::error::Result<()> {
        let ix = &self.indexing;
        if ix.chunk_size == 0 {
            return Err(Error::InvalidConfig("indexing.chunk_size must be > 0".into()));
        }
        if ix.chunk_overlap >= ix.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "indexing.chunk_overlap ({}) must be smaller than chunk_size ({})",
                ix.chunk_overlap, ix.chunk_size
            )));
        }
        if ix.workers == 0 {
            return Err(Error::InvalidConfig("indexing.workers must be > 0".into()));
        }
        if self.retrieval.rrf_k < 0.0 {
            return Err(Error::InvalidConfig("retrieval.rrf_k must be >= 0".into()));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
