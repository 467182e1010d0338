//! Training/build/flip utilities for IVF_PQ indices in Lance.
//!
//! Typical flow:
//! 1) Count rows; below the PQ training minimum the table stays on flat search
//! 2) Compute params from the row count and dimension; build IVF_PQ under a unique name
//! 3) Validate on a tiny sample; flip the active index pointer in meta
use arrow_array::cast::AsArray;
use arrow_array::{Array, FixedSizeListArray};
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::index::{vector::IvfPqIndexBuilder, Index};
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::DistanceType;
use tracing::{info, warn};

use boundly_core::{Error, Result};

use crate::schema::COL_VECTOR;
use crate::table::{get_meta, set_meta};
use crate::{LanceStore, OrIndexError};

/// PQ codebooks with 8-bit codes need at least this many training rows.
pub const MIN_ROWS_FOR_ANN: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IvfPqParams {
    pub nlist: usize,
    pub m: usize,
    pub nbits: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexBuildOutcome {
    Skipped { rows: usize },
    Built { name: String, rows: usize, params: IvfPqParams },
}

pub fn compute_ivfpq_params(total_ready: usize, dim: usize) -> IvfPqParams {
    let sqrt_n = (total_ready as f64).sqrt() as usize;
    // Keep roughly 256 rows per partition so every centroid gets trained.
    let nlist = sqrt_n.min(total_ready / MIN_ROWS_FOR_ANN).clamp(1, 65536);
    let m = [96, 64, 48, 32, 16, 8, 4, 2]
        .into_iter()
        .find(|m| dim % m == 0 && dim / m >= 8)
        .unwrap_or(1);
    IvfPqParams { nlist, m, nbits: 8 }
}

pub async fn build_ivfpq_index(store: &LanceStore, index_name: &str, params: &IvfPqParams) -> Result<()> {
    let table = store.open_table().await?;
    table
        .create_index(
            &[COL_VECTOR],
            Index::IvfPq(
                IvfPqIndexBuilder::default()
                    .distance_type(DistanceType::Cosine)
                    .num_partitions(params.nlist as u32)
                    .num_sub_vectors(params.m as u32),
            ),
        )
        .name(index_name.to_string())
        .execute()
        .await
        .write_err("build IVF_PQ index")?;
    Ok(())
}

/// Very simple validation: sample up to `sample` vectors and ensure top-k returns non-empty.
pub async fn validate_index(store: &LanceStore, k: usize, sample: usize) -> Result<bool> {
    let tbl = store.open_table().await?;
    let mut stream = tbl
        .query()
        .select(Select::columns(&[COL_VECTOR]))
        .limit(sample)
        .execute()
        .await
        .query_err("sample vectors")?;
    let mut ok = 0usize;
    while let Some(batch) = stream.try_next().await.query_err("sample vectors")? {
        let Some(fsl) = batch.column_by_name(COL_VECTOR).and_then(|a| a.as_any().downcast_ref::<FixedSizeListArray>()) else {
            continue;
        };
        for i in 0..batch.num_rows() {
            if !fsl.is_valid(i) {
                continue;
            }
            let inner = fsl.value(i);
            let q = inner.as_primitive::<arrow_array::types::Float32Type>().values().to_vec();
            let mut s = tbl
                .vector_search(q)
                .query_err("validation query")?
                .distance_type(DistanceType::Cosine)
                .limit(k)
                .execute()
                .await
                .query_err("validation query")?;
            if let Some(rb) = s.try_next().await.query_err("validation query")? {
                if rb.num_rows() > 0 {
                    ok += 1;
                }
            }
        }
    }
    Ok(ok > 0)
}

fn active_index_key(table: &str) -> String {
    format!("active_index_id:{table}")
}

/// Flip active index pointer in meta (keyed by chunk table name)
pub async fn flip_active_index(store: &LanceStore, index_id: &str) -> Result<()> {
    set_meta(store.connection(), &active_index_key(store.table_name()), index_id).await
}

pub async fn active_index(store: &LanceStore) -> Result<Option<String>> {
    get_meta(store.connection(), &active_index_key(store.table_name())).await
}

/// Build a fresh ANN index when the table is large enough to train one.
pub async fn rebuild_ann_index(store: &LanceStore) -> Result<IndexBuildOutcome> {
    let rows = store.count_rows().await?;
    if rows < MIN_ROWS_FOR_ANN {
        info!(rows, min = MIN_ROWS_FOR_ANN, "too few rows for IVF_PQ, keeping flat search");
        return Ok(IndexBuildOutcome::Skipped { rows });
    }
    let params = compute_ivfpq_params(rows, store.dim());
    let name = format!("{}_ivfpq_{}", store.table_name(), Utc::now().format("%Y%m%d%H%M%S"));
    info!(rows, nlist = params.nlist, m = params.m, index = %name, "building IVF_PQ index");
    build_ivfpq_index(store, &name, &params).await?;
    if !validate_index(store, 5, 8).await? {
        warn!(index = %name, "validation returned no hits");
        return Err(Error::index_write(format!("index {name} failed validation")));
    }
    flip_active_index(store, &name).await?;
    Ok(IndexBuildOutcome::Built { name, rows, params })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_scale_with_rows_and_divide_dim() {
        let p = compute_ivfpq_params(1_000_000, 1536);
        assert_eq!(p.nlist, 1000);
        assert_eq!(1536 % p.m, 0);
        assert_eq!(p.nbits, 8);

        let small = compute_ivfpq_params(300, 4);
        assert_eq!(small.nlist, 1);
        assert_eq!(small.m, 1);
    }
}
