use ragdb_core::error::{Error, Result};

use crate::splitter::RecursiveTextSplitter;

/// Generic ladder: paragraphs, lines, words, characters.
pub const GENERIC_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Ladder for Chinese documents, most structural marker first.
pub const CHINESE_SEPARATORS: &[&str] = &[
    r"[\n]\s*[一二三四五六七八九十]+、.+",
    r"[\n]\s*（[一二三四五六七八九十]+）",
    r"0\d\s{1,2}",
    "\n\n",
    "。|！|？",
    r"\n\d\.",
    r"\.\s|!\s|\?\s",
    r"；|;\s",
    r"，|,\s",
];

/// Only cuts at Chinese numbered headings ("一、...").
pub const HEADING_SEPARATORS: &[&str] = &[r"[一二三四五六七八九十]+、.+"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitterKind {
    Recursive,
    ChineseRecursive,
    HeadingRecursive,
}

impl SplitterKind {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "recursive" | "RecursiveCharacterTextSplitter" => Ok(Self::Recursive),
            "chinese_recursive" | "ChineseRecursiveTextSplitter" => Ok(Self::ChineseRecursive),
            "heading_recursive" | "SemanticChineseRecursiveTextSplitter" => Ok(Self::HeadingRecursive),
            other => Err(Error::Split(format!("unknown splitter '{other}'"))),
        }
    }

    pub fn build(self, chunk_size: usize, chunk_overlap: usize) -> Result<RecursiveTextSplitter> {
        match self {
            Self::Recursive => RecursiveTextSplitter::new(GENERIC_SEPARATORS, false, chunk_size, chunk_overlap),
            Self::ChineseRecursive => RecursiveTextSplitter::new(CHINESE_SEPARATORS, true, chunk_size, chunk_overlap),
            Self::HeadingRecursive => RecursiveTextSplitter::new(HEADING_SEPARATORS, true, chunk_size, chunk_overlap),
        }
    }
}

/// Resolve `name` and build the splitter in one go.
pub fn splitter_for(name: &str, chunk_size: usize, chunk_overlap: usize) -> Result<RecursiveTextSplitter> {
    SplitterKind::from_name(name)?.build(chunk_size, chunk_overlap)
}
