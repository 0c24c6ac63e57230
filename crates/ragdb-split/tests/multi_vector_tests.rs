use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use ragdb_core::error::Error;
use ragdb_core::traits::Summarizer;
use ragdb_core::types::{Chunk, Metadata, MultiVectorType, META_CONTENT_TYPE};
use ragdb_split::{ExpansionConfig, MultiVectorExpander};

struct EchoSummarizer;

#[async_trait]
impl Summarizer for EchoSummarizer {
    async fn summarize(&self, text: &str) -> anyhow::Result<String> { Ok(format!("summary of {text}")) }

    async fn summarize_table(&self, table: &str) -> anyhow::Result<String> { Ok(format!("table {table}")) }
}

struct BrokenSummarizer;

#[async_trait]
impl Summarizer for BrokenSummarizer {
    async fn summarize(&self, _text: &str) -> anyhow::Result<String> { anyhow::bail!("model offline") }
}

/// Earlier parents take longer; tracks how many calls overlap.
#[derive(Default)]
struct SlowSummarizer {
    current: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Summarizer for SlowSummarizer {
    async fn summarize(&self, text: &str) -> anyhow::Result<String> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let n: u64 = text.trim_start_matches('p').parse()?;
        tokio::time::sleep(Duration::from_millis(5 * (12 - n))).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(format!("s{n}"))
    }
}

fn parent(id: &str, content: &str) -> Chunk { Chunk::new(id, content, Metadata::new()) }

#[tokio::test]
async fn disabled_expander_derives_nothing() {
    let ex = MultiVectorExpander::new(&ExpansionConfig::default(), None).unwrap();
    assert!(!ex.is_enabled());
    assert!(ex.expand(&[parent("p", "text")]).await.unwrap().is_empty());

    let zero = ExpansionConfig { smaller_chunk_size: Some(0), summary: false };
    assert!(!MultiVectorExpander::new(&zero, None).unwrap().is_enabled());
}

#[tokio::test]
async fn children_point_at_their_parent() {
    let cfg = ExpansionConfig { smaller_chunk_size: Some(5), summary: false };
    let ex = MultiVectorExpander::new(&cfg, None).unwrap();
    let mut p = parent("p1", "aaaa bbbb cccc");
    p.metadata.insert("knowledge_path".into(), "guide".into());
    let kids = ex.expand(&[p]).await.unwrap();

    let texts: Vec<&str> = kids.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(texts, vec!["aaaa", "bbbb", "cccc"]);
    for k in &kids {
        assert_eq!(k.parent_id(), Some("p1"));
        assert_eq!(k.multi_vector_type(), Some(MultiVectorType::SmallToBig));
        assert_ne!(k.id(), "p1");
        assert_eq!(k.metadata.get("knowledge_path").map(String::as_str), Some("guide"));
    }
}

#[tokio::test]
async fn one_summary_per_parent_and_tables_get_table_summaries() {
    let cfg = ExpansionConfig { smaller_chunk_size: None, summary: true };
    let ex = MultiVectorExpander::new(&cfg, Some(Arc::new(EchoSummarizer))).unwrap();
    let mut table = parent("t", "| a | b |");
    table.metadata.insert(META_CONTENT_TYPE.into(), "table".into());
    let out = ex.expand(&[parent("p", "body"), table]).await.unwrap();

    assert_eq!(out.len(), 2);
    assert_eq!(out[0].content, "summary of body");
    assert_eq!(out[0].multi_vector_type(), Some(MultiVectorType::TextSummary));
    assert_eq!(out[0].parent_id(), Some("p"));
    assert_eq!(out[1].content, "table | a | b |");
    assert_eq!(out[1].multi_vector_type(), Some(MultiVectorType::TableSummary));
    assert_eq!(out[1].parent_id(), Some("t"));
}

#[tokio::test]
async fn summarizer_failure_is_an_expansion_error() {
    let cfg = ExpansionConfig { smaller_chunk_size: Some(5), summary: true };
    let ex = MultiVectorExpander::new(&cfg, Some(Arc::new(BrokenSummarizer))).unwrap();
    let err = ex.expand(&[parent("p", "aaaa bbbb")]).await.unwrap_err();
    assert!(matches!(err, Error::Expansion(ref m) if m.contains("model offline")), "{err}");
}

#[test]
fn summary_without_summarizer_is_a_config_error() {
    let cfg = ExpansionConfig { smaller_chunk_size: None, summary: true };
    assert!(matches!(MultiVectorExpander::new(&cfg, None), Err(Error::InvalidConfig(_))));
}

#[tokio::test]
async fn summaries_keep_parent_order_with_bounded_concurrency() {
    let summarizer = Arc::new(SlowSummarizer::default());
    let cfg = ExpansionConfig { smaller_chunk_size: None, summary: true };
    let ex = MultiVectorExpander::new(&cfg, Some(summarizer.clone())).unwrap();
    let parents: Vec<Chunk> = (0..10).map(|i| parent(&format!("id{i}"), &format!("p{i}"))).collect();

    let out = ex.expand(&parents).await.unwrap();
    let texts: Vec<&str> = out.iter().map(|c| c.content.as_str()).collect();
    let expected: Vec<String> = (0..10).map(|i| format!("s{i}")).collect();
    assert_eq!(texts, expected);
    for (summary, p) in out.iter().zip(&parents) {
        assert_eq!(summary.parent_id(), Some(p.id()));
    }
    let peak = summarizer.peak.load(Ordering::SeqCst);
    assert!(peak > 1 && peak <= 4, "peak {peak}");
}
