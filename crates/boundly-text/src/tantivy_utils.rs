use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, INDEXED, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, TextAnalyzer};
use tantivy::Index;

use boundly_core::{Error, Result};

pub const CONTENT_TOKENIZER: &str = "boundly_plain";

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field("id", STRING | STORED);
	schema_builder.add_text_field("source", STRING | STORED);
	let content_indexing = TextFieldIndexing::default()
		.set_tokenizer(CONTENT_TOKENIZER)
		.set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let content_options = TextOptions::default().set_indexing_options(content_indexing).set_stored();
	schema_builder.add_text_field("content", content_options);
	schema_builder.add_u64_field("page", STORED);
	schema_builder.add_u64_field("chunk_index", INDEXED | STORED);
	schema_builder.build()
}

/// Lowercased alphanumeric runs; every word is kept, "not" included.
pub fn register_tokenizer(index: &Index) {
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default()).filter(LowerCaser).build();
	index.tokenizers().register(CONTENT_TOKENIZER, tokenizer);
}

#[derive(Debug, Clone, Copy)]
pub struct Fields {
	pub id: Field,
	pub source: Field,
	pub content: Field,
	pub page: Field,
	pub chunk_index: Field,
}

impl Fields {
	/// Resolve fields by name; an on-disk index built with another layout fails here.
	pub fn resolve(schema: &Schema) -> Result<Self> {
		let get = |name: &str| {
			schema
				.get_field(name)
				.map_err(|e| Error::InvalidConfig(format!("text index schema is missing '{name}': {e}")))
		};
		Ok(Self {
			id: get("id")?,
			source: get("source")?,
			content: get("content")?,
			page: get("page")?,
			chunk_index: get("chunk_index")?,
		})
	}
}

/// Terms the content analyzer produces for `text`, first occurrence order, no duplicates.
pub fn analyze(index: &Index, field: Field, text: &str) -> Result<Vec<String>> {
	let mut analyzer = index
		.tokenizer_for_field(field)
		.map_err(|e| Error::index_query(format!("tokenizer: {e}")))?;
	let mut stream = analyzer.token_stream(text);
	let mut terms: Vec<String> = Vec::new();
	stream.process(&mut |token| {
		if !terms.iter().any(|t| t == &token.text) {
			terms.push(token.text.clone());
		}
	});
	Ok(terms)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn analyzer_keeps_every_word_and_drops_punctuation() {
		let index = Index::create_in_ram(build_schema());
		register_tokenizer(&index);
		let fields = Fields::resolve(&index.schema()).unwrap();
		let terms = analyze(&index, fields.content, "Does a BS in Computer Science not qualify for the H-1B? Computer!").unwrap();
		assert_eq!(terms, vec!["does", "a", "bs", "in", "computer", "science", "not", "qualify", "for", "the", "h", "1b"]);
	}
}
