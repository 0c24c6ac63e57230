//! Recursive separator-ladder splitter.
//!
//! The first separator that occurs in the text cuts it; pieces shorter than
//! `chunk_size` are greedily packed back together (carrying `chunk_overlap`
//! characters of trailing context), longer pieces recurse with the remaining
//! separators. Lengths are counted in chars.

use std::collections::VecDeque;

use regex::Regex;
use tracing::warn;

use ragdb_core::error::{Error, Result};
use ragdb_core::types::Document;

#[derive(Debug, Clone)]
struct Separator {
    raw: String,
    is_regex: bool,
    /// `None` for the empty separator, which means "split into characters".
    re: Option<Regex>,
}

impl Separator {
    fn new(raw: &str, is_regex: bool) -> Result<Self> {
        if raw.is_empty() {
            return Ok(Self { raw: String::new(), is_regex, re: None });
        }
        let pattern = if is_regex { raw.to_string() } else { regex::escape(raw) };
        let re = Regex::new(&pattern).map_err(|e| Error::Split(format!("bad separator {raw:?}: {e}")))?;
        Ok(Self { raw: raw.to_string(), is_regex, re: Some(re) })
    }
}

#[derive(Debug, Clone)]
pub struct RecursiveTextSplitter {
    separators: Vec<Separator>,
    keep_separator: bool,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveTextSplitter {
    pub fn new(separators: &[&str], is_regex: bool, chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Split("chunk_size must be > 0".into()));
        }
        if chunk_overlap > chunk_size {
            return Err(Error::Split(format!(
                "chunk_overlap ({chunk_overlap}) is larger than chunk_size ({chunk_size})"
            )));
        }
        let separators = separators.iter().map(|s| Separator::new(s, is_regex)).collect::<Result<Vec<_>>>()?;
        Ok(Self { separators, keep_separator: true, chunk_size, chunk_overlap })
    }

    /// When kept (the default), a matched separator stays at the start of the
    /// segment that follows it.
    pub fn keep_separator(mut self, keep: bool) -> Self {
        self.keep_separator = keep;
        self
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        self.split_recursive(text, &self.separators, &mut out);
        out.iter().filter_map(|c| normalize(c)).collect()
    }

    /// Split each document; every piece inherits a copy of its document's metadata.
    pub fn split_documents(&self, docs: &[Document]) -> Vec<Document> {
        docs.iter()
            .flat_map(|doc| {
                self.split_text(&doc.content)
                    .into_iter()
                    .map(|content| Document { content, metadata: doc.metadata.clone() })
            })
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[Separator], out: &mut Vec<String>) {
        let (sep, fallback) = pick_separator(text, separators);
        let splits = self.split_on(text, sep);
        let joiner = match sep {
            Some(s) if !self.keep_separator && !s.is_regex => s.raw.as_str(),
            _ => "",
        };

        let mut good: Vec<&str> = Vec::new();
        for s in splits {
            if char_len(s) < self.chunk_size {
                good.push(s);
                continue;
            }
            if !good.is_empty() {
                out.extend(self.merge_splits(&good, joiner));
                good.clear();
            }
            if fallback.is_empty() {
                out.push(s.to_string());
            } else {
                self.split_recursive(s, fallback, out);
            }
        }
        if !good.is_empty() {
            out.extend(self.merge_splits(&good, joiner));
        }
    }

    fn split_on<'t>(&self, text: &'t str, sep: Option<&Separator>) -> Vec<&'t str> {
        let Some(re) = sep.and_then(|s| s.re.as_ref()) else {
            return text.char_indices().map(|(i, c)| &text[i..i + c.len_utf8()]).collect();
        };
        let mut pieces = Vec::new();
        let mut last = 0;
        for m in re.find_iter(text) {
            pieces.push(&text[last..m.start()]);
            last = if self.keep_separator { m.start() } else { m.end() };
        }
        pieces.push(&text[last..]);
        pieces.retain(|p| !p.is_empty());
        pieces
    }

    /// Greedy packing of small pieces into chunks of at most `chunk_size`,
    /// keeping up to `chunk_overlap` chars of the previous chunk's tail.
    fn merge_splits(&self, splits: &[&str], joiner: &str) -> Vec<String> {
        let joiner_len = char_len(joiner);
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = char_len(piece);
            let gap = |cur: &VecDeque<&str>| if cur.is_empty() { 0 } else { joiner_len };
            if total + len + gap(&current) > self.chunk_size {
                if total > self.chunk_size {
                    warn!(total, chunk_size = self.chunk_size, "created a chunk larger than chunk_size");
                }
                if !current.is_empty() {
                    if let Some(doc) = join_pieces(&current, joiner) {
                        docs.push(doc);
                    }
                    while total > self.chunk_overlap || (total > 0 && total + len + gap(&current) > self.chunk_size) {
                        let extra = if current.len() > 1 { joiner_len } else { 0 };
                        let Some(front) = current.pop_front() else { break };
                        total = total.saturating_sub(char_len(front) + extra);
                    }
                }
            }
            current.push_back(piece);
            total += len + if current.len() > 1 { joiner_len } else { 0 };
        }
        if let Some(doc) = join_pieces(&current, joiner) {
            docs.push(doc);
        }
        docs
    }
}

/// First separator present in `text` plus the ones after it. The empty
/// separator is taken as soon as it is reached; if nothing matches the last
/// separator is used with no fallbacks.
fn pick_separator<'s>(text: &str, separators: &'s [Separator]) -> (Option<&'s Separator>, &'s [Separator]) {
    for (i, sep) in separators.iter().enumerate() {
        match &sep.re {
            None => return (Some(sep), &[]),
            Some(re) if re.is_match(text) => return (Some(sep), &separators[i + 1..]),
            Some(_) => {}
        }
    }
    (separators.last(), &[])
}

fn join_pieces(pieces: &VecDeque<&str>, joiner: &str) -> Option<String> {
    let joined = pieces.iter().copied().collect::<Vec<_>>().join(joiner);
    let trimmed = joined.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}

/// Trim, collapse runs of newlines to one, drop empties.
fn normalize(chunk: &str) -> Option<String> {
    let trimmed = chunk.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut out = String::with_capacity(trimmed.len());
    let mut prev_newline = false;
    for c in trimmed.chars() {
        if c == '\n' {
            if prev_newline {
                continue;
            }
            prev_newline = true;
        } else {
            prev_newline = false;
        }
        out.push(c);
    }
    Some(out)
}

pub(crate) fn char_len(s: &str) -> usize { s.chars().count() }
