use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use ragdb_core::traits::Loader;
use ragdb_core::types::{Document, META_PAGE_NUMBER};
use ragdb_split::split_markdown_by_headings;

/// Extension (".txt", lowercase with the dot) -> loader.
#[derive(Clone, Default)]
pub struct LoaderRegistry {
    loaders: BTreeMap<String, Arc<dyn Loader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self { Self::default() }

    /// Plain text and markdown.
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        reg.register(".txt", Arc::new(TextLoader));
        reg.register(".md", Arc::new(MarkdownLoader));
        reg
    }

    pub fn register(&mut self, ext: &str, loader: Arc<dyn Loader>) {
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.loaders.insert(format!(".{ext}"), loader);
    }

    pub fn get(&self, ext: &str) -> Option<Arc<dyn Loader>> { self.loaders.get(&ext.to_lowercase()).cloned() }

    pub fn extensions(&self) -> Vec<&str> { self.loaders.keys().map(String::as_str).collect() }
}

pub(crate) fn read_text(path: &Path) -> anyhow::Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(path)?).to_string()),
    }
}

/// Whole file as one document; invalid UTF-8 is replaced rather than rejected.
pub struct TextLoader;

impl Loader for TextLoader {
    fn load(&self, path: &Path) -> anyhow::Result<Vec<Document>> { Ok(vec![Document::new(read_text(path)?)]) }
}

/// One document per heading section, each tagged with its knowledge path.
pub struct MarkdownLoader;

impl Loader for MarkdownLoader {
    fn load(&self, path: &Path) -> anyhow::Result<Vec<Document>> { Ok(split_markdown_by_headings(&read_text(path)?)) }
}

/// Text split on form feeds, one document per page. Stands in for slide and
/// page-oriented formats whose pages are indexed as-is.
pub struct PagedTextLoader;

impl Loader for PagedTextLoader {
    fn load(&self, path: &Path) -> anyhow::Result<Vec<Document>> {
        Ok(read_text(path)?
            .split('\u{c}')
            .enumerate()
            .filter(|(_, page)| !page.trim().is_empty())
            .map(|(i, page)| Document::new(page.trim()).with_meta(META_PAGE_NUMBER, (i + 1).to_string()))
            .collect())
    }

    fn is_paged(&self) -> bool { true }
}
