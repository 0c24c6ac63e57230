use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const COL_ID: &str = "id";
pub const COL_SOURCE: &str = "source";
pub const COL_CONTENT: &str = "content";
/// Chunk metadata serialized as a JSON object of strings.
pub const COL_METADATA: &str = "metadata";
pub const COL_VECTOR: &str = "vector";

pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(COL_ID, DataType::Utf8, false),
        Field::new(COL_SOURCE, DataType::Utf8, false),
        Field::new(COL_CONTENT, DataType::Utf8, false),
        Field::new(COL_METADATA, DataType::Utf8, false),
        Field::new(COL_VECTOR, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
    ]))
}
