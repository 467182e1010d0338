use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use boundly_core::types::{ChunkId, EmbeddedChunk};
use boundly_core::{Error, Result};

use crate::schema::{build_chunks_schema, COL_ID};
use crate::{LanceStore, OrIndexError};

/// Columnar form of `(id, chunk)` rows for one append.
pub fn chunks_to_record_batch(rows: &[(ChunkId, &EmbeddedChunk)], embedder_id: &str, dim: usize) -> Result<RecordBatch> {
	let now = Utc::now().timestamp_millis();
	let mut ids = Vec::with_capacity(rows.len());
	let mut sources = Vec::with_capacity(rows.len());
	let mut contents = Vec::with_capacity(rows.len());
	let mut pages = Vec::with_capacity(rows.len());
	let mut chunk_indices = Vec::with_capacity(rows.len());
	let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(rows.len());
	for (id, e) in rows {
		if e.vector.len() != dim {
			return Err(Error::InvalidConfig(format!("vector for {id} has {} dims, table expects {dim}", e.vector.len())));
		}
		ids.push(id.clone());
		sources.push(e.chunk.source.clone());
		contents.push(e.chunk.content.clone());
		pages.push(i32::try_from(e.chunk.page).unwrap_or(i32::MAX));
		chunk_indices.push(i32::try_from(e.chunk.chunk_index).unwrap_or(i32::MAX));
		vectors.push(Some(e.vector.iter().map(|&x| Some(x)).collect()));
	}
	let n = rows.len();
	RecordBatch::try_new(
		build_chunks_schema(dim),
		vec![
			Arc::new(StringArray::from(ids)),
			Arc::new(StringArray::from(sources)),
			Arc::new(StringArray::from(contents)),
			Arc::new(Int32Array::from(pages)),
			Arc::new(Int32Array::from(chunk_indices)),
			Arc::new(StringArray::from(vec![embedder_id.to_string(); n])),
			Arc::new(TimestampMillisecondArray::from(vec![now; n])),
			Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), dim as i32)),
		],
	)
	.write_err("chunk record batch")
}

impl LanceStore {
	/// Append rows to the chunk table. All-or-nothing per call.
	pub async fn add(&self, rows: &[(ChunkId, &EmbeddedChunk)]) -> Result<usize> {
		if rows.is_empty() {
			return Ok(0);
		}
		let record_batch = chunks_to_record_batch(rows, &self.embedder_id, self.dim)?;
		let schema = record_batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		let table = self.open_table().await?;
		table.add(reader).execute().await.write_err("vector append")?;
		debug!(table = %self.table_name, count = rows.len(), "vector append");
		Ok(rows.len())
	}

	/// Remove rows by id. Ids that are not present are ignored.
	pub async fn delete_ids(&self, ids: &[ChunkId]) -> Result<()> {
		if ids.is_empty() {
			return Ok(());
		}
		let table = self.open_table().await?;
		table.delete(&id_predicate(ids)).await.write_err("vector delete")?;
		debug!(table = %self.table_name, count = ids.len(), "vector delete");
		Ok(())
	}
}

/// `id IN ('a', 'b')` with single quotes escaped.
pub(crate) fn id_predicate(ids: &[ChunkId]) -> String {
	let quoted: Vec<String> = ids.iter().map(|id| format!("'{}'", id.replace('\'', "''"))).collect();
	format!("{COL_ID} IN ({})", quoted.join(", "))
}
