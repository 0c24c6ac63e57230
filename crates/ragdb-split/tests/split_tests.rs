use ragdb_core::types::{Chunk, Document, Metadata, META_KNOWLEDGE_PATH, META_PARENT_ID};
use ragdb_split::{merge_expanded, merge_small_chunks, merge_with_remap, split_markdown_by_headings, splitter_for, RecursiveTextSplitter, SplitterKind};

fn chunk(id: &str, content: &str) -> Chunk { Chunk::new(id, content, Metadata::new()) }

fn child(id: &str, parent: &str, content: &str) -> Chunk {
    let mut meta = Metadata::new();
    meta.insert(META_PARENT_ID.to_string(), parent.to_string());
    Chunk::new(id, content, meta)
}

fn contents(chunks: &[Chunk]) -> Vec<&str> { chunks.iter().map(|c| c.content.as_str()).collect() }

#[test]
fn unknown_splitter_name_is_an_error() {
    let err = SplitterKind::from_name("nope").unwrap_err();
    assert!(err.to_string().contains("nope"));
    assert!(splitter_for("recursive", 100, 10).is_ok());
}

#[test]
fn overlap_larger_than_size_is_rejected() {
    assert!(RecursiveTextSplitter::new(&["\n"], false, 10, 11).is_err());
    assert!(RecursiveTextSplitter::new(&["\n"], false, 0, 0).is_err());
}

#[test]
fn empty_text_yields_nothing() {
    let s = splitter_for("chinese_recursive", 50, 0).unwrap();
    assert!(s.split_text("").is_empty());
    let bare = RecursiveTextSplitter::new(&[], true, 50, 0).unwrap();
    assert!(bare.split_text("").is_empty());
    assert!(s.split_text("  \n\n ").is_empty());
}

#[test]
fn separator_free_run_is_kept_whole_when_no_fallback_remains() {
    let text = "a".repeat(30);
    let s = splitter_for("chinese_recursive", 10, 0).unwrap();
    assert_eq!(s.split_text(&text), vec![text.clone()]);
}

#[test]
fn character_fallback_bounds_chunk_size() {
    let text = "a".repeat(30);
    let s = splitter_for("recursive", 10, 0).unwrap();
    let chunks = s.split_text(&text);
    assert_eq!(chunks.len(), 3);
    assert!(chunks.iter().all(|c| c.chars().count() <= 10));
}

#[test]
fn numbered_heading_stays_with_its_content() {
    let text = "前言\n一、总则\n内容甲。\n二、范围\n内容乙。";
    let s = splitter_for("chinese_recursive", 12, 0).unwrap();
    assert_eq!(s.split_text(text), vec!["前言\n一、总则\n内容甲。", "二、范围\n内容乙。"]);
}

#[test]
fn overlap_carries_trailing_pieces() {
    let s = splitter_for("recursive", 10, 4).unwrap();
    assert_eq!(s.split_text("aa bb cc dd ee ff"), vec!["aa bb cc", "cc dd ee", "ee ff"]);
}

#[test]
fn blank_line_runs_collapse() {
    let s = splitter_for("recursive", 100, 0).unwrap();
    assert_eq!(s.split_text("甲\n\n\n乙"), vec!["甲\n乙"]);
}

#[test]
fn splitting_is_deterministic_and_bounded() {
    let text = "第一段内容，包含逗号。第二句话！还有问题？\n\n另一段落; more text, here. And again! Done? ".repeat(8);
    let s = splitter_for("chinese_recursive", 40, 10).unwrap();
    let a = s.split_text(&text);
    let b = s.split_text(&text);
    assert_eq!(a, b);
    assert!(!a.is_empty());
    assert!(a.iter().all(|c| c.chars().count() <= 40), "{a:?}");
}

#[test]
fn split_documents_copies_metadata() {
    let s = splitter_for("recursive", 5, 0).unwrap();
    let doc = Document::new("aaaa bbbb").with_meta("page_number", "2");
    let out = s.split_documents(&[doc]);
    assert_eq!(out.len(), 2);
    assert!(out.iter().all(|d| d.metadata.get("page_number").map(String::as_str) == Some("2")));
}

#[test]
fn small_chunks_absorb_successors_and_tail_folds_back() {
    let input = vec![chunk("a", "ab"), chunk("b", "cd"), chunk("c", "efghij"), chunk("d", "klmnopq"), chunk("e", "x")];
    let out = merge_with_remap(input, 5);
    assert_eq!(contents(&out.chunks), vec!["ab\ncd\nefghij", "klmnopq\nx"]);
    assert_eq!(out.absorbed.get("b").map(String::as_str), Some("a"));
    assert_eq!(out.absorbed.get("c").map(String::as_str), Some("a"));
    assert_eq!(out.absorbed.get("e").map(String::as_str), Some("d"));
}

#[test]
fn absorbed_ids_follow_a_folded_tail() {
    let input = vec![chunk("a", "long enough"), chunk("b", "x"), chunk("c", "y")];
    let out = merge_with_remap(input, 8);
    assert_eq!(contents(&out.chunks), vec!["long enough\nx\ny"]);
    assert_eq!(out.absorbed.get("c").map(String::as_str), Some("a"));
    assert_eq!(out.absorbed.get("b").map(String::as_str), Some("a"));
}

#[test]
fn merge_is_idempotent_and_respects_lower_bound() {
    let sizes = [3usize, 90, 12, 7, 150, 1, 1, 60, 200, 5, 79, 80, 2];
    let input: Vec<Chunk> = sizes.iter().enumerate().map(|(i, n)| chunk(&format!("c{i}"), &"z".repeat(*n))).collect();
    let once = merge_small_chunks(input, 80);
    assert!(once.len() > 1);
    assert!(once.iter().all(|c| c.content.chars().count() >= 80));
    let twice = merge_small_chunks(once.clone(), 80);
    assert_eq!(once, twice);
}

#[test]
fn lone_short_chunk_is_left_alone() {
    let out = merge_small_chunks(vec![chunk("a", "tiny")], 80);
    assert_eq!(contents(&out), vec!["tiny"]);
}

#[test]
fn derived_chunks_follow_their_absorbed_parent() {
    let parents = vec![chunk("p1", "first parent text"), chunk("p2", "ok"), chunk("p3", "zzzz")];
    let derived = vec![child("k1", "p1", "child one"), child("k3", "p3", "child of three")];
    let out = merge_expanded(parents, derived, 5);
    let ids: Vec<&str> = out.iter().map(Chunk::id).collect();
    assert_eq!(ids, vec!["p1", "p2", "k1", "k3"]);
    assert_eq!(out[3].parent_id(), Some("p2"));
    assert_eq!(out[1].content, "ok\nzzzz");
}

#[test]
fn derived_chunks_merge_only_within_their_group() {
    let parents = vec![chunk("p1", "parent one is long"), chunk("p2", "parent two is long")];
    let derived = vec![child("a", "p1", "a1"), child("b", "p2", "b1"), child("c", "p1", "a2")];
    let out = merge_expanded(parents, derived, 10);
    let kids: Vec<&Chunk> = out.iter().filter(|c| c.is_derived()).collect();
    assert_eq!(kids.len(), 2);
    assert_eq!(kids[0].content, "a1\na2");
    assert_eq!(kids[1].content, "b1");
}

#[test]
fn markdown_headings_become_knowledge_paths() {
    let md = "# 手册\n简介\n## 安装\n步骤一\n步骤二\n## 使用\n说明\n```\n# not a heading\n```\n";
    let docs = split_markdown_by_headings(md);
    let paths: Vec<&str> = docs.iter().map(|d| d.metadata[META_KNOWLEDGE_PATH].as_str()).collect();
    assert_eq!(paths, vec!["手册", "手册-安装", "手册-使用"]);
    assert_eq!(docs[1].content, "步骤一\n步骤二");
    assert!(docs[2].content.contains("# not a heading"));
    assert_eq!(docs[1].metadata.get("h2").map(String::as_str), Some("安装"));
}

#[test]
fn markdown_without_headings_has_no_path() {
    let docs = split_markdown_by_headings("plain\ntext");
    assert_eq!(docs.len(), 1);
    assert!(!docs[0].metadata.contains_key(META_KNOWLEDGE_PATH));
}
