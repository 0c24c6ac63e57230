use std::path::{Path, PathBuf};

use crate::types::KnowledgeFile;

/// Walk `root` and collect files whose lowercase extension (with the dot,
/// e.g. ".md") is in `extensions`. Sorted for stable batch order.
pub fn list_files(root: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
        let path = entry.path();
        let ext = path.extension().map(|e| format!(".{}", e.to_string_lossy().to_lowercase()));
        if ext.as_deref().is_some_and(|e| extensions.contains(&e)) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    files
}

/// Like [`list_files`], wrapped as knowledge files of `kb_name` using `splitter`.
pub fn discover(root: &Path, kb_name: &str, splitter: &str, extensions: &[&str], limit: Option<usize>) -> Vec<KnowledgeFile> {
    let mut paths = list_files(root, extensions);
    if let Some(limit) = limit {
        paths.truncate(limit);
    }
    paths.iter().map(|p| KnowledgeFile::new(kb_name, p, splitter)).collect()
}
