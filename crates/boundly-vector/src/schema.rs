use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

pub const DEFAULT_EMBEDDING_DIM: usize = 1536;

pub const COL_ID: &str = "id";
pub const COL_SOURCE: &str = "source";
pub const COL_CONTENT: &str = "content";
pub const COL_VECTOR: &str = "vector";
pub const COL_DISTANCE: &str = "_distance";

pub fn vector_field(dim: usize) -> Field {
	Field::new(
		COL_VECTOR,
		DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32),
		true,
	)
}

/// One row per chunk. `id` matches the text index document id.
pub fn build_chunks_schema(dim: usize) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new(COL_ID, DataType::Utf8, false),
		Field::new(COL_SOURCE, DataType::Utf8, false),
		Field::new(COL_CONTENT, DataType::Utf8, false),
		Field::new("page", DataType::Int32, false),
		Field::new("chunk_index", DataType::Int32, false),
		Field::new("embedder_id", DataType::Utf8, false),
		Field::new("ingested_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
		vector_field(dim),
	]))
}

/// Dimension of the `vector` column, if the schema has one.
pub fn vector_dim(schema: &Schema) -> Option<usize> {
	match schema.field_with_name(COL_VECTOR).ok()?.data_type() {
		DataType::FixedSizeList(_, n) => usize::try_from(*n).ok(),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn dim_is_read_back_from_schema() {
		assert_eq!(vector_dim(&build_chunks_schema(1536)), Some(1536));
		assert_eq!(vector_dim(&Schema::new(vec![Field::new("id", DataType::Utf8, false)])), None);
	}
}
