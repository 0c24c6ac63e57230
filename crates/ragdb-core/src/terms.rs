//! Term extraction shared by the hash embedder and lexical rerankers.

/// Lowercased whitespace tokens, with CJK ideographs split one per token.
pub fn tokens(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for word in text.split_whitespace() {
        let mut buf = String::new();
        for c in word.chars() {
            if is_cjk(c) {
                if !buf.is_empty() {
                    out.push(std::mem::take(&mut buf));
                }
                out.push(c.to_string());
            } else if c.is_alphanumeric() {
                buf.extend(c.to_lowercase());
            } else if !buf.is_empty() {
                out.push(std::mem::take(&mut buf));
            }
        }
        if !buf.is_empty() {
            out.push(buf);
        }
    }
    out
}

pub fn is_cjk(c: char) -> bool { matches!(c as u32, 0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0xF900..=0xFAFF) }
