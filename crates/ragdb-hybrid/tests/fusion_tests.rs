use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use ragdb_core::traits::{ChunkSink, Generator, QueryRewriter, Reranker, Retriever, VectorStore};
use ragdb_core::types::{Chunk, DocInfo, KnowledgeFile, Metadata, RetrievedDocument, ScoredChunk, META_PARENT_ID};
use ragdb_hybrid::{
    FusionConfig, HydeExpander, LlmQueryRewriter, RankedList, RetrievalFusion, TermOverlapReranker, VECTORSTORE_KEY,
};
use ragdb_text::KeywordIndex;
use ragdb_vector::{HashEmbedder, InMemoryVectorStore};

fn chunk(id: &str, content: &str) -> Chunk { Chunk::new(id, content, Metadata::new()) }

fn child(id: &str, content: &str, parent: &str) -> Chunk {
    let mut meta = Metadata::new();
    meta.insert(META_PARENT_ID.into(), parent.into());
    Chunk::new(id, content, meta)
}

fn list(backend: &str, hits: &[(&str, &str, f32)]) -> RankedList {
    RankedList {
        key: format!("{backend}_1"),
        backend: backend.to_string(),
        docs: hits.iter().map(|(id, c, s)| RetrievedDocument::new(chunk(id, c), *s, backend)).collect(),
    }
}

/// Returns the same hits for any query and records what it was asked.
struct StaticRetriever {
    name: &'static str,
    hits: Vec<(Chunk, f32)>,
    seen: Mutex<Vec<String>>,
}

impl StaticRetriever {
    fn new(name: &'static str, hits: &[(&str, &str, f32)]) -> Self {
        Self { name, hits: hits.iter().map(|(id, c, s)| (chunk(id, c), *s)).collect(), seen: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    fn name(&self) -> &str { self.name }

    async fn retrieve(&self, query: &str) -> anyhow::Result<Vec<RetrievedDocument>> {
        self.seen.lock().unwrap().push(query.to_string());
        Ok(self.hits.iter().map(|(c, s)| RetrievedDocument::new(c.clone(), *s, self.name)).collect())
    }
}

struct BrokenRetriever;

#[async_trait]
impl Retriever for BrokenRetriever {
    fn name(&self) -> &str { "broken" }

    async fn retrieve(&self, _query: &str) -> anyhow::Result<Vec<RetrievedDocument>> { anyhow::bail!("connection refused") }
}

struct BrokenReranker;

#[async_trait]
impl Reranker for BrokenReranker {
    async fn rank(&self, _q: &str, _c: Vec<ScoredChunk>, _k: usize) -> anyhow::Result<Vec<ScoredChunk>> {
        anyhow::bail!("reranker unavailable")
    }
}

struct FixedRewriter(Vec<String>);

#[async_trait]
impl QueryRewriter for FixedRewriter {
    async fn rewrite(&self, _query: &str) -> anyhow::Result<Vec<String>> { Ok(self.0.clone()) }
}

struct CannedGenerator(&'static str);

#[async_trait]
impl Generator for CannedGenerator {
    async fn complete(&self, _prompt: &str) -> anyhow::Result<String> { Ok(self.0.to_string()) }
}

fn memory_store() -> Arc<InMemoryVectorStore> { Arc::new(InMemoryVectorStore::new(Arc::new(HashEmbedder::new(128)))) }

#[tokio::test]
async fn single_backend_passes_through_with_original_scores() {
    let fusion = RetrievalFusion::new(FusionConfig::default());
    let out = fusion
        .post_retrieval("q", vec![list("keyword", &[("a", "alpha", 0.9), ("b", "beta", 0.5), ("a", "alpha", 0.4), ("c", "gamma", 0.1)])])
        .await;
    assert_eq!(out.iter().map(|s| s.chunk.id()).collect::<Vec<_>>(), vec!["a", "b", "c"]);
    assert_eq!(out.iter().map(|s| s.score).collect::<Vec<_>>(), vec![f64::from(0.9f32), f64::from(0.5f32), f64::from(0.1f32)]);
}

#[tokio::test]
async fn empty_lists_yield_an_empty_result() {
    let fusion = RetrievalFusion::new(FusionConfig::default());
    assert!(fusion.post_retrieval("q", Vec::new()).await.is_empty());

    // An empty list does not count as a backend.
    let out = fusion.post_retrieval("q", vec![list("a", &[]), list("b", &[("1", "one", 0.3)])]).await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].score, f64::from(0.3f32));
}

#[tokio::test]
async fn configured_weight_reorders_a_tie() {
    let lists = || vec![list("a", &[("x", "x", 0.9), ("y", "y", 0.8)]), list("b", &[("y", "y", 0.9), ("x", "x", 0.8)])];

    let even = RetrievalFusion::new(FusionConfig::default()).post_retrieval("q", lists()).await;
    assert_eq!(even[0].score, even[1].score);

    let mut config = FusionConfig::default();
    config.weights.insert("b".into(), 2.0);
    let weighted = RetrievalFusion::new(config).post_retrieval("q", lists()).await;
    assert_eq!(weighted[0].chunk.content, "y");
    assert!(weighted[0].score > weighted[1].score);
}

#[tokio::test]
async fn failing_backend_is_excluded() {
    let good = Arc::new(StaticRetriever::new("static", &[("a", "alpha", 0.7), ("b", "beta", 0.2)]));
    let fusion = RetrievalFusion::new(FusionConfig::default()).with_retriever(Arc::new(BrokenRetriever)).with_retriever(good);

    let lists = fusion.retrieval("q").await;
    assert_eq!(lists.iter().map(|l| l.key.as_str()).collect::<Vec<_>>(), vec!["static_2"]);

    let out = fusion.retrieve("q").await;
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].score, f64::from(0.7f32));

    let nothing = RetrievalFusion::new(FusionConfig::default()).with_retriever(Arc::new(BrokenRetriever));
    assert!(nothing.retrieve("q").await.is_empty());
}

#[tokio::test]
async fn rewrites_are_retrieved_under_prefixed_keys() {
    let backend = Arc::new(StaticRetriever::new("static", &[("a", "alpha", 0.7), ("b", "beta", 0.2)]));
    let config = FusionConfig { multi_query: true, ..FusionConfig::default() };
    let fusion = RetrievalFusion::new(config)
        .with_retriever(backend.clone())
        .with_rewriter(Arc::new(FixedRewriter(vec!["first rewrite".into(), "second rewrite".into()])));

    let out = fusion.retrieve("original").await;
    assert_eq!(*backend.seen.lock().unwrap(), vec!["original", "first rewrite", "second rewrite"]);
    assert_eq!(out.len(), 2);
    assert!((out[0].score - 3.0 / 61.0).abs() < 1e-12);
    assert_eq!(out[0].chunk.id(), "a");
}

#[tokio::test]
async fn multi_query_without_rewriter_uses_the_original_query() {
    let backend = Arc::new(StaticRetriever::new("static", &[("a", "alpha", 0.7)]));
    let fusion = RetrievalFusion::new(FusionConfig { multi_query: true, ..FusionConfig::default() }).with_retriever(backend.clone());
    assert!(fusion.pre_retrieval("q").await.is_empty());
    assert_eq!(fusion.retrieve("q").await.len(), 1);
    assert_eq!(backend.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn hyde_appends_the_generated_hint() {
    let backend = Arc::new(StaticRetriever::new("static", &[("a", "alpha", 0.7)]));
    let fusion = RetrievalFusion::new(FusionConfig { hyde: true, ..FusionConfig::default() })
        .with_retriever(backend.clone())
        .with_hyde(HydeExpander::new(Arc::new(CannedGenerator("  pump priming steps \n"))));
    fusion.retrieve("how do I prime the pump").await;
    assert_eq!(*backend.seen.lock().unwrap(), vec!["how do I prime the pump\npump priming steps"]);
}

#[tokio::test]
async fn rewriter_splits_generator_lines() {
    let rewriter = LlmQueryRewriter::new(Arc::new(CannedGenerator("pump maintenance\n\n  priming a pump  \nwell pump care\n")));
    assert_eq!(rewriter.rewrite("pump?").await.unwrap(), vec!["pump maintenance", "priming a pump", "well pump care"]);
}

#[tokio::test]
async fn derived_hits_resolve_to_parents_with_their_score() {
    let store = memory_store();
    let file = KnowledgeFile::new("kb", Path::new("manual.txt"), "");
    store
        .update(&file, &[chunk("P", "the full parent passage about pump priming"), child("c1", "pump priming", "P"), child("c2", "orphan", "gone")])
        .await
        .unwrap();
    let fusion = RetrievalFusion::new(FusionConfig::default()).with_vector_store(store);

    let mut l = list("keyword", &[]);
    l.docs = vec![
        RetrievedDocument::new(child("c1", "pump priming", "P"), 0.42, "keyword"),
        RetrievedDocument::new(chunk("P", "the full parent passage about pump priming"), 0.1, "keyword"),
        RetrievedDocument::new(child("c2", "orphan", "gone"), 0.05, "keyword"),
    ];
    let resolved = fusion.resolve_parents(vec![l]).await;
    let docs = &resolved[0].docs;

    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].chunk.id(), "P");
    assert_eq!(docs[0].score, 0.42);
    assert_eq!(docs[0].chunk.content, "the full parent passage about pump priming");
    assert_eq!(docs[1].chunk.id(), "c2");
}

/// Searches fine but cannot look chunks up by id.
struct NoLookupStore;

#[async_trait]
impl VectorStore for NoLookupStore {
    async fn search(&self, _q: &str, _k: usize, _t: Option<f32>) -> anyhow::Result<Vec<(Chunk, f32)>> { Ok(Vec::new()) }

    async fn update(&self, _file: &KnowledgeFile, _chunks: &[Chunk]) -> anyhow::Result<Vec<DocInfo>> { Ok(Vec::new()) }

    async fn get_by_id(&self, _ids: &[String]) -> anyhow::Result<Vec<Chunk>> { anyhow::bail!("table is locked") }

    async fn delete_file(&self, _file: &KnowledgeFile) -> anyhow::Result<usize> { Ok(0) }
}

#[tokio::test]
async fn failed_parent_lookup_keeps_derived_hits() {
    let fusion = RetrievalFusion::new(FusionConfig::default()).with_vector_store(Arc::new(NoLookupStore));
    let mut l = list("keyword", &[]);
    l.docs = vec![
        RetrievedDocument::new(child("c1", "prime the pump", "P"), 0.42, "keyword"),
        RetrievedDocument::new(chunk("Q", "unrelated parent"), 0.2, "keyword"),
        RetrievedDocument::new(child("c2", "fill the casing", "P"), 0.1, "keyword"),
    ];
    let resolved = fusion.resolve_parents(vec![l]).await;
    let docs = &resolved[0].docs;

    let got: Vec<(&str, f32)> = docs.iter().map(|d| (d.chunk.id(), d.score)).collect();
    assert_eq!(got, vec![("c1", 0.42), ("Q", 0.2), ("c2", 0.1)]);
    assert_eq!(docs[0].chunk.parent_id(), Some("P"));
    assert_eq!(docs[0].chunk.content, "prime the pump");
}

#[tokio::test]
async fn vector_hits_on_children_come_back_as_parents() {
    let store = memory_store();
    let file = KnowledgeFile::new("kb", Path::new("manual.txt"), "");
    store
        .update(&file, &[chunk("P", "open the bleed valve then fill the casing with water"), child("c1", "bleed valve", "P")])
        .await
        .unwrap();
    let fusion = RetrievalFusion::new(FusionConfig::default()).with_vector_store(store);

    let lists = fusion.retrieval("bleed valve").await;
    assert_eq!(lists[0].key, VECTORSTORE_KEY);

    let out = fusion.retrieve("bleed valve").await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].chunk.id(), "P");
    assert!(!out[0].chunk.is_derived());
}

#[tokio::test]
async fn reranker_reorders_and_truncates() {
    let config = FusionConfig { rerank_top_k: 1, ..FusionConfig::default() };
    let fusion = RetrievalFusion::new(config).with_reranker(Arc::new(TermOverlapReranker::new()));
    let lists = vec![
        list("a", &[("1", "solar inverter sizing", 0.9), ("2", "rain barrel overflow", 0.8)]),
        list("b", &[("2", "rain barrel overflow", 0.9)]),
    ];
    let out = fusion.post_retrieval("solar inverter", lists).await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].chunk.content, "solar inverter sizing");
    assert_eq!(out[0].score, 1.0);

    // One candidate: no rerank, no truncation semantics to apply.
    let single = fusion.post_retrieval("unrelated", vec![list("a", &[("1", "solar inverter sizing", 0.9)])]).await;
    assert_eq!(single[0].score, f64::from(0.9f32));
}

#[tokio::test]
async fn failed_rerank_keeps_the_fused_order() {
    let fusion = RetrievalFusion::new(FusionConfig { rerank_top_k: 1, ..FusionConfig::default() }).with_reranker(Arc::new(BrokenReranker));
    let lists = vec![list("a", &[("1", "one", 0.9), ("2", "two", 0.8)]), list("b", &[("2", "two", 0.9)])];
    let out = fusion.post_retrieval("q", lists).await;
    assert_eq!(out.iter().map(|s| s.chunk.content.as_str()).collect::<Vec<_>>(), vec!["two", "one"]);
}

#[tokio::test]
async fn vector_and_keyword_backends_fuse_without_duplicates() {
    let store = memory_store();
    let keyword = Arc::new(KeywordIndex::in_memory().unwrap());
    let file = KnowledgeFile::new("kb", Path::new("garden.txt"), "");
    let chunks = vec![
        chunk("g1", "compost improves soil structure"),
        chunk("g2", "mulch keeps soil moist in summer"),
        chunk("g3", "chickens need a dry coop"),
    ];
    store.update(&file, &chunks).await.unwrap();
    keyword.replace_file(&file, &chunks).await.unwrap();

    let fusion = RetrievalFusion::new(FusionConfig::default()).with_vector_store(store).with_retriever(keyword);
    let out = fusion.retrieve("soil").await;

    assert!(!out.is_empty());
    let mut seen: Vec<&str> = out.iter().map(|s| s.chunk.content.as_str()).collect();
    let total = seen.len();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), total);
    assert!(out.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(out[0].chunk.content.contains("soil"));
}
