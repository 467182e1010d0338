use std::path::Path;
use std::sync::{Arc, Mutex};

use tantivy::directory::MmapDirectory;
use tantivy::{doc, Index, IndexReader, ReloadPolicy};
use tracing::{debug, info};

use boundly_core::types::{ChunkId, DocumentChunk};
use boundly_core::{Error, Result};

use crate::tantivy_utils::{build_schema, register_tokenizer, Fields};

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Handle on one on-disk (or in-memory) tantivy index. Cheap to clone.
///
/// All methods block; async callers run them on `spawn_blocking`.
#[derive(Clone)]
pub struct TantivyIndex {
	pub(crate) index: Index,
	pub(crate) reader: IndexReader,
	pub(crate) fields: Fields,
	// tantivy allows one writer per index at a time.
	write_lock: Arc<Mutex<()>>,
}

impl TantivyIndex {
	/// Open the index under `dir`, creating it on first use. Existing
	/// documents are kept.
	pub fn open_or_create(dir: &Path) -> Result<Self> {
		std::fs::create_dir_all(dir)?;
		let directory = MmapDirectory::open(dir)
			.map_err(|e| Error::InvalidConfig(format!("text index dir {}: {e}", dir.display())))?;
		let index = Index::open_or_create(directory, build_schema())
			.map_err(|e| Error::InvalidConfig(format!("text index at {}: {e}", dir.display())))?;
		let this = Self::from_index(index)?;
		info!(path = %dir.display(), docs = this.num_docs(), "text index open");
		Ok(this)
	}

	pub fn in_memory() -> Result<Self> {
		Self::from_index(Index::create_in_ram(build_schema()))
	}

	fn from_index(index: Index) -> Result<Self> {
		register_tokenizer(&index);
		let fields = Fields::resolve(&index.schema())?;
		let reader: IndexReader = index
			.reader_builder()
			.reload_policy(ReloadPolicy::OnCommitWithDelay)
			.try_into()
			.map_err(|e| Error::index_query(format!("text index reader: {e}")))?;
		Ok(Self { index, reader, fields, write_lock: Arc::new(Mutex::new(())) })
	}

	pub fn num_docs(&self) -> u64 {
		self.reader.searcher().num_docs()
	}

	/// Append `(id, chunk)` pairs in one commit. Returns how many were written.
	pub fn add(&self, docs: &[(ChunkId, DocumentChunk)]) -> Result<usize> {
		if docs.is_empty() {
			return Ok(0);
		}
		let _guard = self.write_lock.lock().map_err(|_| Error::index_write("text index writer lock poisoned"))?;
		let mut writer = self
			.index
			.writer(WRITER_HEAP_BYTES)
			.map_err(|e| Error::index_write(format!("text index writer: {e}")))?;
		let f = self.fields;
		for (id, chunk) in docs {
			writer
				.add_document(doc!(
					f.id => id.clone(),
					f.source => chunk.source.clone(),
					f.content => chunk.content.clone(),
					f.page => u64::from(chunk.page),
					f.chunk_index => chunk.chunk_index as u64,
				))
				.map_err(|e| Error::index_write(format!("text index add: {e}")))?;
		}
		writer.commit().map_err(|e| Error::index_write(format!("text index commit: {e}")))?;
		// Make the commit visible to the next search without waiting for the watcher.
		self.reader.reload().map_err(|e| Error::index_write(format!("text index reload: {e}")))?;
		debug!(count = docs.len(), "text index commit");
		Ok(docs.len())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn chunk(source: &str, i: usize, content: &str) -> DocumentChunk {
		DocumentChunk { source: source.into(), page: 1, chunk_index: i, content: content.into() }
	}

	#[test]
	fn reopening_keeps_documents() {
		let tmp = tempfile::tempdir().unwrap();
		let idx = TantivyIndex::open_or_create(tmp.path()).unwrap();
		idx.add(&[("a".into(), chunk("Case001.pdf", 0, "bachelor degree"))]).unwrap();
		drop(idx);

		let idx = TantivyIndex::open_or_create(tmp.path()).unwrap();
		assert_eq!(idx.num_docs(), 1);
		idx.add(&[("b".into(), chunk("Case002.pdf", 0, "master degree"))]).unwrap();
		assert_eq!(idx.num_docs(), 2);
	}

	#[test]
	fn empty_add_is_a_no_op() {
		let idx = TantivyIndex::in_memory().unwrap();
		assert_eq!(idx.add(&[]).unwrap(), 0);
		assert_eq!(idx.num_docs(), 0);
	}
}
