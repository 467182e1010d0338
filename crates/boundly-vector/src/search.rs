use arrow_array::{Float32Array, RecordBatch, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::DistanceType;

use boundly_core::types::{SearchHit, SourceKind};
use boundly_core::{Error, Result};

use crate::schema::{COL_CONTENT, COL_DISTANCE, COL_ID, COL_SOURCE};
use crate::{LanceStore, OrIndexError};

impl LanceStore {
	/// Top `k` chunks by cosine similarity, best first.
	///
	/// When `candidate_pool > k` the ANN index re-ranks `candidate_pool`
	/// candidates by exact distance before keeping `k`.
	pub async fn search(&self, query_vec: &[f32], k: usize, candidate_pool: usize) -> Result<Vec<SearchHit>> {
		if k == 0 {
			return Ok(Vec::new());
		}
		if query_vec.len() != self.dim {
			return Err(Error::InvalidConfig(format!(
				"query vector has {} dims, table '{}' expects {}",
				query_vec.len(),
				self.table_name,
				self.dim
			)));
		}
		let table = self.open_table().await?;
		if table.count_rows(None).await.query_err("count rows")? == 0 {
			return Ok(Vec::new());
		}
		let mut query = table
			.vector_search(query_vec.to_vec())
			.query_err("vector query")?
			.distance_type(DistanceType::Cosine)
			.select(Select::columns(&[COL_ID, COL_SOURCE, COL_CONTENT]))
			.limit(k);
		if candidate_pool > k {
			query = query.refine_factor(u32::try_from(candidate_pool.div_ceil(k)).unwrap_or(u32::MAX));
		}
		let mut stream = query.execute().await.query_err("vector query")?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await.query_err("vector query stream")? {
			hits.extend(batch_to_hits(&batch)?);
		}
		hits.sort_by(|a, b| b.score.total_cmp(&a.score));
		hits.truncate(k);
		Ok(hits)
	}
}

/// Convert one result batch into hits; score is `1 - cosine distance`.
pub fn batch_to_hits(batch: &RecordBatch) -> Result<Vec<SearchHit>> {
	let strings = |name: &str| {
		batch
			.column_by_name(name)
			.and_then(|c| c.as_any().downcast_ref::<StringArray>())
			.ok_or_else(|| Error::index_query(format!("vector result is missing '{name}'")))
	};
	let ids = strings(COL_ID)?;
	let sources = strings(COL_SOURCE)?;
	let contents = strings(COL_CONTENT)?;
	let distances = batch
		.column_by_name(COL_DISTANCE)
		.and_then(|c| c.as_any().downcast_ref::<Float32Array>())
		.ok_or_else(|| Error::index_query("vector result is missing '_distance'"))?;
	Ok((0..batch.num_rows())
		.map(|i| SearchHit {
			id: ids.value(i).to_string(),
			score: 1.0 - distances.value(i),
			origin: SourceKind::Vector,
			content: contents.value(i).to_string(),
			source: sources.value(i).to_string(),
		})
		.collect())
}

#[cfg(test)]
mod tests {
	use super::*;
	use arrow_schema::{DataType, Field, Schema};
	use std::sync::Arc;

	#[test]
	fn distance_becomes_similarity() {
		let schema = Arc::new(Schema::new(vec![
			Field::new(COL_ID, DataType::Utf8, false),
			Field::new(COL_SOURCE, DataType::Utf8, false),
			Field::new(COL_CONTENT, DataType::Utf8, false),
			Field::new(COL_DISTANCE, DataType::Float32, true),
		]));
		let rb = RecordBatch::try_new(
			schema,
			vec![
				Arc::new(StringArray::from(vec!["a", "b"])),
				Arc::new(StringArray::from(vec!["Case001.pdf", "Case002.pdf"])),
				Arc::new(StringArray::from(vec!["x", "y"])),
				Arc::new(Float32Array::from(vec![0.25, 1.5])),
			],
		)
		.unwrap();
		let hits = batch_to_hits(&rb).unwrap();
		assert_eq!(hits[0].score, 0.75);
		assert_eq!(hits[1].score, -0.5);
		assert_eq!(hits[1].source, "Case002.pdf");
	}

	#[test]
	fn missing_columns_are_query_errors() {
		let schema = Arc::new(Schema::new(vec![Field::new(COL_ID, DataType::Utf8, false)]));
		let rb = RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(vec!["a"]))]).unwrap();
		assert!(matches!(batch_to_hits(&rb), Err(Error::IndexQuery(_))));
	}
}
