//! Query-time chain: rewrite, fan out to every backend, resolve derived
//! chunks to their parents, then fuse and optionally rerank.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use ragdb_core::config::RetrievalSettings;
use ragdb_core::error::Error;
use ragdb_core::traits::{QueryRewriter, Reranker, Retriever, VectorStore};
use ragdb_core::types::{Chunk, FusionResult, RetrievedDocument, ScoredChunk};

use crate::llm::HydeExpander;
use crate::rrf::{reciprocal_rank_fusion, DEFAULT_RRF_K};

/// Backend name of the vector store, used for weight lookup.
pub const VECTORSTORE_BACKEND: &str = "vectorstore";
pub const VECTORSTORE_KEY: &str = "vectorstore_retrieval_0";

#[derive(Debug, Clone)]
pub struct FusionConfig {
    pub vectorstore_top_k: usize,
    pub rerank_top_k: usize,
    pub score_threshold: Option<f32>,
    pub multi_query: bool,
    pub hyde: bool,
    pub rrf_k: f64,
    pub weights: BTreeMap<String, f64>,
}

impl FusionConfig {
    pub fn from_settings(r: &RetrievalSettings) -> Self {
        Self {
            vectorstore_top_k: r.vectorstore_top_k,
            rerank_top_k: r.rerank_top_k,
            score_threshold: r.score_threshold,
            multi_query: r.multi_query,
            hyde: r.hyde,
            rrf_k: r.rrf_k,
            weights: r.weights.clone(),
        }
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self { rrf_k: DEFAULT_RRF_K, ..Self::from_settings(&RetrievalSettings::default()) }
    }
}

/// One backend's hits for one query, best first.
#[derive(Debug, Clone)]
pub struct RankedList {
    /// Unique per request, e.g. `vectorstore_retrieval_0`, `keyword_1`, `2_keyword_1`.
    pub key: String,
    /// Backend name; rewrites of the same backend share it.
    pub backend: String,
    pub docs: Vec<RetrievedDocument>,
}

pub struct RetrievalFusion {
    config: FusionConfig,
    vector_store: Option<Arc<dyn VectorStore>>,
    retrievers: Vec<Arc<dyn Retriever>>,
    reranker: Option<Arc<dyn Reranker>>,
    rewriter: Option<Arc<dyn QueryRewriter>>,
    hyde: Option<HydeExpander>,
}

impl RetrievalFusion {
    pub fn new(config: FusionConfig) -> Self {
        Self { config, vector_store: None, retrievers: Vec::new(), reranker: None, rewriter: None, hyde: None }
    }

    pub fn with_vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retrievers.push(retriever);
        self
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn with_rewriter(mut self, rewriter: Arc<dyn QueryRewriter>) -> Self {
        self.rewriter = Some(rewriter);
        self
    }

    pub fn with_hyde(mut self, hyde: HydeExpander) -> Self {
        self.hyde = Some(hyde);
        self
    }

    pub fn config(&self) -> &FusionConfig { &self.config }

    /// Query rewrites for multi-query retrieval. Empty when disabled or when
    /// the rewriter fails.
    pub async fn pre_retrieval(&self, query: &str) -> Vec<String> {
        if !self.config.multi_query {
            return Vec::new();
        }
        let Some(rewriter) = &self.rewriter else {
            warn!("multi_query is enabled but no query rewriter is configured");
            return Vec::new();
        };
        match rewriter.rewrite(query).await {
            Ok(rewrites) => {
                debug!(rewrites = rewrites.len(), "query rewritten");
                rewrites
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "query rewrite failed, using the original query only");
                Vec::new()
            }
        }
    }

    async fn search_query(&self, query: &str) -> String {
        if !self.config.hyde {
            return query.to_string();
        }
        let Some(hyde) = &self.hyde else {
            warn!("hyde is enabled but no expander is configured");
            return query.to_string();
        };
        match hyde.expand(query).await {
            Ok(expanded) => {
                debug!(query = %expanded, "hyde query");
                expanded
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "hyde expansion failed, using the original query");
                query.to_string()
            }
        }
    }

    /// Query every backend concurrently. A failing backend is logged and
    /// left out; the others are unaffected.
    pub async fn retrieval(&self, query: &str) -> Vec<RankedList> {
        let vector = async {
            match &self.vector_store {
                Some(store) => Some(store.search(query, self.config.vectorstore_top_k, self.config.score_threshold).await),
                None => None,
            }
        };
        let aux = join_all(self.retrievers.iter().map(|r| r.retrieve(query)));
        let (vector, aux) = futures::join!(vector, aux);

        let mut lists = Vec::new();
        match vector {
            Some(Ok(hits)) => lists.push(RankedList {
                key: VECTORSTORE_KEY.to_string(),
                backend: VECTORSTORE_BACKEND.to_string(),
                docs: hits.into_iter().map(|(c, s)| RetrievedDocument::new(c, s, VECTORSTORE_BACKEND)).collect(),
            }),
            Some(Err(e)) => log_backend_failure(VECTORSTORE_KEY, &e),
            None => {}
        }
        for (i, (retriever, res)) in self.retrievers.iter().zip(aux).enumerate() {
            let key = format!("{}_{}", retriever.name(), i + 1);
            match res {
                Ok(docs) => lists.push(RankedList { key, backend: retriever.name().to_string(), docs }),
                Err(e) => log_backend_failure(&key, &e),
            }
        }
        lists
    }

    /// Swap derived chunks for their parents, keeping the hit's score. Falls
    /// back to the derived chunk when the parent cannot be fetched. A parent
    /// reached twice in one list keeps its best rank only.
    pub async fn resolve_parents(&self, lists: Vec<RankedList>) -> Vec<RankedList> {
        let Some(store) = &self.vector_store else { return lists };

        let mut seen = HashSet::new();
        let wanted: Vec<String> = lists
            .iter()
            .flat_map(|l| l.docs.iter())
            .filter_map(|d| d.chunk.parent_id())
            .filter(|p| seen.insert(p.to_string()))
            .map(str::to_string)
            .collect();
        if wanted.is_empty() {
            return lists;
        }

        let parents: HashMap<String, Chunk> = match store.get_by_id(&wanted).await {
            Ok(found) => found.into_iter().map(|c| (c.id().to_string(), c)).collect(),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "parent lookup failed, keeping derived chunks");
                return lists;
            }
        };

        lists
            .into_iter()
            .map(|mut list| {
                let mut ids = HashSet::new();
                list.docs = std::mem::take(&mut list.docs)
                    .into_iter()
                    .filter_map(|mut d| {
                        if let Some(pid) = d.chunk.parent_id().map(str::to_string) {
                            match parents.get(&pid) {
                                Some(parent) => d.chunk = parent.clone(),
                                None => warn!(parent = %pid, "parent chunk not found"),
                            }
                        }
                        ids.insert(d.chunk.id().to_string()).then_some(d)
                    })
                    .collect();
                list
            })
            .collect()
    }

    fn weight_of(&self, backend: &str) -> f64 { self.config.weights.get(backend).copied().unwrap_or(1.0) }

    /// Fuse the per-backend lists into one ranking.
    ///
    /// Empty lists are ignored. One list passes through with its own scores
    /// (deduplicated by id); several are combined with weighted RRF. With a
    /// reranker and more than one candidate, the reranker's order and
    /// truncation win; if it fails the fused order is kept.
    pub async fn post_retrieval(&self, query: &str, lists: Vec<RankedList>) -> FusionResult {
        let lists: Vec<RankedList> = lists.into_iter().filter(|l| !l.docs.is_empty()).collect();

        let fused: FusionResult = match lists.len() {
            0 => return Vec::new(),
            1 => {
                let mut ids = HashSet::new();
                lists
                    .into_iter()
                    .flat_map(|l| l.docs)
                    .filter(|d| ids.insert(d.chunk.id().to_string()))
                    .map(|d| ScoredChunk { chunk: d.chunk, score: f64::from(d.score) })
                    .collect()
            }
            _ => {
                let weights: Vec<f64> = lists.iter().map(|l| self.weight_of(&l.backend)).collect();
                let chunk_lists: Vec<Vec<Chunk>> =
                    lists.into_iter().map(|l| l.docs.into_iter().map(|d| d.chunk).collect()).collect();
                reciprocal_rank_fusion(&chunk_lists, &weights, self.config.rrf_k)
            }
        };

        match &self.reranker {
            Some(reranker) if fused.len() > 1 => {
                match reranker.rank(query, fused.clone(), self.config.rerank_top_k).await {
                    Ok(ranked) => ranked,
                    Err(e) => {
                        error!(error = %format!("{e:#}"), "rerank failed, keeping fused order");
                        fused
                    }
                }
            }
            _ => fused,
        }
    }

    /// pre_retrieval -> retrieval (original, then each rewrite under an
    /// `{i}_` key prefix) -> parent resolution -> post_retrieval.
    pub async fn retrieve(&self, query: &str) -> FusionResult {
        let rewrites = self.pre_retrieval(query).await;
        let search_query = self.search_query(query).await;

        let mut lists = self.retrieval(&search_query).await;
        for (i, rewrite) in rewrites.iter().enumerate() {
            for mut list in self.retrieval(rewrite).await {
                list.key = format!("{}_{}", i + 1, list.key);
                lists.push(list);
            }
        }
        debug!(lists = lists.len(), "retrieved");

        let lists = self.resolve_parents(lists).await;
        let results = self.post_retrieval(query, lists).await;
        info!(results = results.len(), "retrieval finished");
        results
    }
}

fn log_backend_failure(key: &str, e: &anyhow::Error) {
    let err = Error::Backend { backend: key.to_string(), message: format!("{e:#}") };
    error!(backend = key, error = %err, "retrieval backend failed");
}
