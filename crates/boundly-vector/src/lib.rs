//! boundly-vector
//!
//! LanceDB-backed dense half of the document index. One chunk table per
//! corpus; the embedder id and dimension it was built with are pinned in the
//! meta table so a table is never queried with vectors from another model.

use std::fmt::Display;
use std::path::Path;

use lancedb::{Connection, Table};
use tracing::info;

use boundly_core::{Error, Result};

pub mod index_build;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

use schema::{build_chunks_schema, vector_dim};
use table::{ensure_table, get_meta, open_db, set_meta};

/// Attach index context to foreign errors.
pub(crate) trait OrIndexError<T> {
	fn query_err(self, what: &str) -> Result<T>;
	fn write_err(self, what: &str) -> Result<T>;
}

impl<T, E: Display> OrIndexError<T> for std::result::Result<T, E> {
	fn query_err(self, what: &str) -> Result<T> {
		self.map_err(|e| Error::index_query(format!("{what}: {e}")))
	}

	fn write_err(self, what: &str) -> Result<T> {
		self.map_err(|e| Error::index_write(format!("{what}: {e}")))
	}
}

#[derive(Clone)]
pub struct LanceStore {
	pub(crate) conn: Connection,
	pub(crate) table_name: String,
	pub(crate) embedder_id: String,
	pub(crate) dim: usize,
}

impl LanceStore {
	/// Open (creating if needed) the chunk table under `dir`.
	///
	/// Fails with [`Error::InvalidConfig`] if the table was built with another
	/// embedder or dimension.
	pub async fn open(dir: &Path, table_name: &str, embedder_id: &str, dim: usize) -> Result<Self> {
		std::fs::create_dir_all(dir)?;
		let conn = open_db(&dir.to_string_lossy()).await?;
		let store = Self { conn, table_name: table_name.to_string(), embedder_id: embedder_id.to_string(), dim };
		store.guard_embedder().await?;
		ensure_table(&store.conn, table_name, build_chunks_schema(dim)).await?;

		let schema = store.open_table().await?.schema().await.query_err("read table schema")?;
		match vector_dim(&schema) {
			Some(d) if d == dim => {}
			other => {
				return Err(Error::InvalidConfig(format!(
					"table '{table_name}' has vector dimension {other:?}, configured {dim}"
				)))
			}
		}
		info!(path = %dir.display(), table = table_name, embedder_id, dim, "vector store open");
		Ok(store)
	}

	async fn guard_embedder(&self) -> Result<()> {
		let id_key = format!("embedder_id:{}", self.table_name);
		let dim_key = format!("dimension:{}", self.table_name);
		match get_meta(&self.conn, &id_key).await? {
			Some(existing) if existing != self.embedder_id => {
				return Err(Error::InvalidConfig(format!(
					"table '{}' was built with embedder '{existing}', configured '{}'",
					self.table_name, self.embedder_id
				)));
			}
			Some(_) => {}
			None => set_meta(&self.conn, &id_key, &self.embedder_id).await?,
		}
		match get_meta(&self.conn, &dim_key).await? {
			Some(existing) if existing != self.dim.to_string() => Err(Error::InvalidConfig(format!(
				"table '{}' was built with dimension {existing}, configured {}",
				self.table_name, self.dim
			))),
			Some(_) => Ok(()),
			None => set_meta(&self.conn, &dim_key, &self.dim.to_string()).await,
		}
	}

	pub(crate) async fn open_table(&self) -> Result<Table> {
		self.conn.open_table(&self.table_name).execute().await.query_err("open vector table")
	}

	pub async fn count_rows(&self) -> Result<usize> {
		self.open_table().await?.count_rows(None).await.query_err("count rows")
	}

	pub fn connection(&self) -> &Connection {
		&self.conn
	}

	pub fn table_name(&self) -> &str {
		&self.table_name
	}

	pub fn dim(&self) -> usize {
		self.dim
	}

	pub fn embedder_id(&self) -> &str {
		&self.embedder_id
	}
}
