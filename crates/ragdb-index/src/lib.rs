//! Indexing: loaders, OCR, summaries and the concurrent per-file pipeline.

pub mod contextual;
pub mod loader;
pub mod metadata;
pub mod ocr;
pub mod pipeline;
pub mod summarizer;

pub use contextual::add_context;
pub use loader::{LoaderRegistry, MarkdownLoader, PagedTextLoader, TextLoader};
pub use metadata::InMemoryMetadataStore;
pub use ocr::{OcrBackend, OcrEngine, OcrImageLoader};
pub use pipeline::{IndexReport, IndexingPipeline, PipelineConfig};
pub use summarizer::LlmSummarizer;
