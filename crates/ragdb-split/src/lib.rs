//! Text splitting: the recursive splitter and its named presets, small-chunk
//! merging, multi-vector expansion and markdown heading sections.

pub mod markdown;
pub mod merge;
pub mod multi_vector;
pub mod presets;
pub mod splitter;

pub use markdown::split_markdown_by_headings;
pub use merge::{merge_expanded, merge_small_chunks, merge_with_remap, MergeOutcome};
pub use multi_vector::{ExpansionConfig, MultiVectorExpander};
pub use presets::{splitter_for, SplitterKind};
pub use splitter::RecursiveTextSplitter;
