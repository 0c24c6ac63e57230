use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

use ragdb_core::terms::is_cjk;

pub const TOKENIZER: &str = "text_with_stopwords";

pub const F_ID: &str = "id";
pub const F_SOURCE: &str = "source";
pub const F_TEXT: &str = "text";
pub const F_CONTENT: &str = "content";
pub const F_METADATA: &str = "metadata";

pub fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();
    schema_builder.add_text_field(F_ID, STRING | STORED);
    schema_builder.add_text_field(F_SOURCE, STRING | STORED);
    let text_field_indexing = TextFieldIndexing::default()
        .set_tokenizer(TOKENIZER)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    // Indexed form is CJK-segmented; the original content is stored separately.
    let text_options = TextOptions::default().set_indexing_options(text_field_indexing);
    schema_builder.add_text_field(F_TEXT, text_options);
    schema_builder.add_text_field(F_CONTENT, STORED);
    schema_builder.add_text_field(F_METADATA, STORED);
    schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
    let stop_words = [
        "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "in", "is", "it", "its", "of", "on",
        "that", "the", "to", "was", "will", "with", "or", "but", "not", "this", "these", "they", "there", "then",
        "so", "if", "when", "where", "how", "what", "which", "who", "can", "do", "does", "did", "have", "had",
    ];
    let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .filter(StopWordFilter::remove(stop_words.into_iter().map(|s| s.to_string())))
        .build();
    index.tokenizers().register(TOKENIZER, tokenizer);
}

/// Put spaces around CJK ideographs so the simple tokenizer indexes them one
/// character at a time. Applied to both documents and queries.
pub fn segment_cjk(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 2);
    for c in text.chars() {
        if is_cjk(c) {
            out.push(' ');
            out.push(c);
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out
}
