use ragdb_core::types::{Document, META_KNOWLEDGE_PATH};

const MAX_LEVEL: usize = 5;

/// Split markdown into one document per heading section. Heading lines are
/// dropped from the content; the titles of the active headings are kept as
/// `h1`..`h5` metadata and joined with `-` into `knowledge_path`.
pub fn split_markdown_by_headings(md: &str) -> Vec<Document> {
    let mut docs = Vec::new();
    let mut stack: Vec<(usize, String)> = Vec::new();
    let mut lines: Vec<&str> = Vec::new();
    let mut in_code = false;

    for raw in md.lines() {
        let line = raw.trim();
        if line.starts_with("```") || line.starts_with("~~~") {
            in_code = !in_code;
        }
        if !in_code {
            if let Some((level, title)) = parse_heading(line) {
                flush(&mut docs, &mut lines, &stack);
                stack.retain(|(l, _)| *l < level);
                stack.push((level, title.to_string()));
                continue;
            }
        }
        lines.push(raw);
    }
    flush(&mut docs, &mut lines, &stack);
    docs
}

fn parse_heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > MAX_LEVEL {
        return None;
    }
    let rest = &line[level..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    Some((level, rest.trim()))
}

fn flush(docs: &mut Vec<Document>, lines: &mut Vec<&str>, stack: &[(usize, String)]) {
    let content = lines.join("\n");
    lines.clear();
    let content = content.trim();
    if content.is_empty() {
        return;
    }
    let mut doc = Document::new(content);
    for (level, title) in stack {
        doc.metadata.insert(format!("h{level}"), title.clone());
    }
    let path = stack.iter().map(|(_, t)| t.as_str()).collect::<Vec<_>>().join("-");
    if !path.is_empty() {
        doc.metadata.insert(META_KNOWLEDGE_PATH.to_string(), path);
    }
    docs.push(doc);
}
