use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{TantivyDocument, Term};

use boundly_core::types::{SearchHit, SourceKind};
use boundly_core::{Error, Result};

use crate::index::TantivyIndex;
use crate::tantivy_utils::analyze;

impl TantivyIndex {
	/// BM25 over `content`, best first.
	///
	/// The query is run through the content analyzer and the surviving terms
	/// are OR-ed together, so free text with punctuation never fails to
	/// parse. A query that analyzes to nothing matches nothing.
	pub fn search(&self, query_text: &str, limit: usize) -> Result<Vec<SearchHit>> {
		if limit == 0 {
			return Ok(Vec::new());
		}
		let f = self.fields;
		let terms = analyze(&self.index, f.content, query_text)?;
		if terms.is_empty() {
			return Ok(Vec::new());
		}
		let clauses: Vec<(Occur, Box<dyn Query>)> = terms
			.iter()
			.map(|t| {
				let q: Box<dyn Query> =
					Box::new(TermQuery::new(Term::from_field_text(f.content, t), IndexRecordOption::WithFreqs));
				(Occur::Should, q)
			})
			.collect();
		let query = BooleanQuery::new(clauses);

		let searcher = self.reader.searcher();
		let top_docs = searcher
			.search(&query, &TopDocs::with_limit(limit))
			.map_err(|e| Error::index_query(format!("text search: {e}")))?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument =
				searcher.doc(addr).map_err(|e| Error::index_query(format!("text doc fetch: {e}")))?;
			let text = |field| doc.get_first(field).and_then(|v| v.as_str()).unwrap_or("").to_string();
			hits.push(SearchHit {
				id: text(f.id),
				score,
				origin: SourceKind::Text,
				content: text(f.content),
				source: text(f.source),
			});
		}
		Ok(hits)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use boundly_core::types::DocumentChunk;

	fn seeded() -> TantivyIndex {
		let idx = TantivyIndex::in_memory().unwrap();
		let docs = [
			("c1", "Case001.pdf", "The beneficiary holds a bachelor degree in computer science."),
			("c2", "Case002.pdf", "Prevailing wage level was not addressed by the petitioner."),
			("c3", "Case003.pdf", "Computer programmer roles are not always a specialty occupation; a computer degree helps."),
		];
		let batch: Vec<_> = docs
			.iter()
			.enumerate()
			.map(|(i, (id, src, text))| {
				(id.to_string(), DocumentChunk { source: src.to_string(), page: 1, chunk_index: i, content: text.to_string() })
			})
			.collect();
		idx.add(&batch).unwrap();
		idx
	}

	#[test]
	fn ranks_by_bm25_and_returns_stored_fields() {
		let idx = seeded();
		let hits = idx.search("computer degree", 10).unwrap();
		assert_eq!(hits.len(), 2);
		assert!(hits[0].score >= hits[1].score);
		assert!(hits.iter().all(|h| h.origin == SourceKind::Text));
		let c1 = hits.iter().find(|h| h.id == "c1").expect("c1 matches");
		assert_eq!(c1.source, "Case001.pdf");
		assert!(c1.content.contains("bachelor"));
	}

	#[test]
	fn punctuation_heavy_queries_do_not_fail() {
		let idx = seeded();
		let hits = idx.search("wage?? (level) \"petitioner\" AND:", 5).unwrap();
		assert_eq!(hits.first().map(|h| h.id.as_str()), Some("c2"));
	}

	#[test]
	fn negations_are_searchable() {
		let idx = seeded();
		let mut ids: Vec<_> = idx.search("not", 5).unwrap().into_iter().map(|h| h.id).collect();
		ids.sort();
		assert_eq!(ids, vec!["c2", "c3"]);
	}

	#[test]
	fn termless_or_zero_limit_is_empty() {
		let idx = seeded();
		assert!(idx.search("?? -- !", 5).unwrap().is_empty());
		assert!(idx.search("computer", 0).unwrap().is_empty());
		assert!(idx.search("zebra", 5).unwrap().is_empty());
	}

	#[test]
	fn limit_caps_results() {
		let idx = seeded();
		assert_eq!(idx.search("computer wage", 1).unwrap().len(), 1);
	}
}
