//! Retrieval: weighted RRF over several backends, parent resolution,
//! reranking and the query-side LLM adapters.

pub mod context;
pub mod fusion;
pub mod llm;
pub mod rerank;
pub mod rrf;

pub use context::{build_context, select_passages};
pub use fusion::{FusionConfig, RankedList, RetrievalFusion, VECTORSTORE_BACKEND, VECTORSTORE_KEY};
pub use llm::{HydeExpander, LlmQueryRewriter};
pub use rerank::TermOverlapReranker;
pub use rrf::{reciprocal_rank_fusion, DEFAULT_RRF_K};
