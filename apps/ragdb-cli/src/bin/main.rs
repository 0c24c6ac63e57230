use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ragdb_core::config::{expand_path, Config, Settings};
use ragdb_core::files::discover;
use ragdb_core::types::META_FILENAME;
use ragdb_hybrid::{build_context, select_passages, FusionConfig, RetrievalFusion, TermOverlapReranker};
use ragdb_index::{IndexingPipeline, InMemoryMetadataStore, LoaderRegistry, PagedTextLoader, PipelineConfig};
use ragdb_text::KeywordIndex;
use ragdb_vector::{HashEmbedder, LanceVectorStore};

#[derive(Parser)]
#[command(name = "ragdb", about = "Index documents and query them with fused vector + keyword retrieval")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk and index every supported file under DIR.
    Index {
        dir: PathBuf,
        /// Index at most this many files.
        #[arg(long)]
        limit: Option<usize>,
        /// Drop the keyword index before indexing.
        #[arg(long)]
        fresh: bool,
    },
    /// Retrieve passages for a question.
    Query {
        text: String,
        /// Rerank the fused candidates by query-term overlap.
        #[arg(long)]
        rerank: bool,
        /// Print the numbered context block instead of the ranked list.
        #[arg(long)]
        context: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {e:#}");
        e
    })?;
    let settings = config.settings()?;

    match Cli::parse().command {
        Command::Index { dir, limit, fresh } => index(&settings, &dir, limit, fresh).await,
        Command::Query { text, rerank, context } => query(&settings, &text, rerank, context).await,
    }
}

async fn open_stores(settings: &Settings, fresh: bool) -> anyhow::Result<(Arc<LanceVectorStore>, Arc<KeywordIndex>)> {
    let lance_dir = expand_path(&settings.storage.lancedb_dir);
    std::fs::create_dir_all(&lance_dir)?;
    let uri = lance_dir.to_string_lossy();
    let vectors = LanceVectorStore::open(&uri, &settings.storage.table, Arc::new(HashEmbedder::default())).await?;

    let keyword_dir = expand_path(&settings.storage.keyword_index_dir);
    let keyword = if fresh { KeywordIndex::create(&keyword_dir)? } else { KeywordIndex::open_or_create(&keyword_dir)? };
    Ok((Arc::new(vectors), Arc::new(keyword.with_top_k(settings.retrieval.vectorstore_top_k))))
}

async fn index(settings: &Settings, dir: &std::path::Path, limit: Option<usize>, fresh: bool) -> anyhow::Result<()> {
    let (vectors, keyword) = open_stores(settings, fresh).await?;

    let mut loaders = LoaderRegistry::with_defaults();
    loaders.register(".pages", Arc::new(PagedTextLoader));
    let files = discover(dir, &settings.storage.kb_name, "", &loaders.extensions(), limit);
    info!(dir = %dir.display(), files = files.len(), "discovered files");

    let pipeline = IndexingPipeline::new(
        PipelineConfig::from_settings(&settings.indexing),
        loaders,
        vectors.clone(),
        Arc::new(InMemoryMetadataStore::new()),
        None,
    )?
    .with_sink(keyword);

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}")?
            .progress_chars("#>-"),
    );
    let report = pipeline
        .index_files_with(files, |file, res| {
            pb.set_message(file.filename.clone());
            if let Err(e) = res {
                pb.println(format!("failed: {} ({e})", file.filename));
            }
            pb.inc(1);
        })
        .await;
    pb.finish_with_message("done");

    let chunks: usize = report.indexed.values().sum();
    println!("Indexed {} files ({chunks} chunks), {} failed", report.indexed.len(), report.failed.len());
    for (file, msg) in &report.failed {
        println!("  {file}: {msg}");
    }
    println!("Vector table now holds {} rows", vectors.count().await?);
    Ok(())
}

async fn query(settings: &Settings, text: &str, rerank: bool, context: bool) -> anyhow::Result<()> {
    let (vectors, keyword) = open_stores(settings, false).await?;
    let mut fusion =
        RetrievalFusion::new(FusionConfig::from_settings(&settings.retrieval)).with_vector_store(vectors).with_retriever(keyword);
    if rerank {
        fusion = fusion.with_reranker(Arc::new(TermOverlapReranker::new()));
    }

    let results = fusion.retrieve(text).await;
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    if context {
        println!("{}", build_context(&select_passages(&results, 0.0)));
        return Ok(());
    }
    for (i, r) in results.iter().enumerate() {
        let file = r.chunk.metadata.get(META_FILENAME).map(String::as_str).unwrap_or("?");
        let preview: String = r.chunk.content.chars().take(120).collect();
        println!("{:>2}. [{:.4}] {file}: {}", i + 1, r.score, preview.replace('\n', " "));
    }
    Ok(())
}
