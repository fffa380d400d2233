use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Documents table: `metadata` holds the flat-encoded JSON map.
pub fn build_documents_schema(dimension: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("content", DataType::Utf8, false),
		Field::new("source", DataType::Utf8, false),
		Field::new("metadata", DataType::Utf8, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dimension), true),
	]))
}
