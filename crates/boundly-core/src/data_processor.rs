//! Deterministic recursive text splitting.
//!
//! Text is cut on the coarsest separator that occurs (`"\n\n"`, then `"\n"`,
//! then `" "`, then between characters). Pieces are merged back up to
//! `chunk_size` characters, carrying up to `chunk_overlap` characters from
//! the end of one chunk into the start of the next. There is no randomness
//! and no dependence on global state: the same input under the same
//! [`ChunkingConfig`] always yields the same chunk boundaries.

use std::collections::VecDeque;

use crate::config::ChunkingSettings;
use crate::types::DocumentChunk;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 512, chunk_overlap: 64 }
    }
}

impl From<&ChunkingSettings> for ChunkingConfig {
    fn from(s: &ChunkingSettings) -> Self {
        Self { chunk_size: s.chunk_size.max(1), chunk_overlap: s.chunk_overlap.min(s.chunk_size.saturating_sub(1)) }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

fn char_len(s: &str) -> usize {
    s.chars().count()
}

impl DataProcessor {
    pub fn new(chunking_config: ChunkingConfig) -> Self {
        Self { chunking_config }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.chunking_config
    }

    /// Split every page of one source, numbering chunks across pages.
    pub fn chunk_pages(&self, source: &str, pages: &[(u32, String)]) -> Vec<DocumentChunk> {
        let mut chunks = Vec::new();
        for (page, text) in pages {
            for content in self.split_text(text) {
                chunks.push(DocumentChunk { source: source.to_string(), page: *page, chunk_index: chunks.len(), content });
            }
        }
        chunks
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_with(text, &SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let idx = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s))
            .unwrap_or(separators.len().saturating_sub(1));
        let Some(sep) = separators.get(idx).copied() else { return vec![text.to_string()] };
        let finer = &separators[idx + 1..];

        let pieces: Vec<String> = if sep.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(sep).filter(|p| !p.is_empty()).map(str::to_string).collect()
        };

        let mut out = Vec::new();
        let mut fitting: Vec<String> = Vec::new();
        for piece in pieces {
            if char_len(&piece) <= self.chunking_config.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                out.extend(self.merge(&fitting, sep));
                fitting.clear();
            }
            if finer.is_empty() {
                out.push(piece.trim().to_string());
            } else {
                out.extend(self.split_with(&piece, finer));
            }
        }
        if !fitting.is_empty() {
            out.extend(self.merge(&fitting, sep));
        }
        out.retain(|c| !c.is_empty());
        out
    }

    fn merge(&self, splits: &[String], sep: &str) -> Vec<String> {
        let ChunkingConfig { chunk_size, chunk_overlap } = self.chunking_config;
        let sep_len = char_len(sep);
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        // Character length of `current` joined by `sep`.
        let mut total = 0usize;

        for split in splits {
            let len = char_len(split);
            let joiner = if current.is_empty() { 0 } else { sep_len };
            if total + len + joiner > chunk_size && !current.is_empty() {
                push_joined(&mut docs, &current, sep);
                while let Some(first) = current.front() {
                    let joiner = if current.is_empty() { 0 } else { sep_len };
                    let over_overlap = total > chunk_overlap;
                    let no_room = total + len + joiner > chunk_size && total > 0;
                    if !(over_overlap || no_room) {
                        break;
                    }
                    total -= char_len(first) + if current.len() > 1 { sep_len } else { 0 };
                    current.pop_front();
                }
            }
            total += len + if current.is_empty() { 0 } else { sep_len };
            current.push_back(split);
        }
        push_joined(&mut docs, &current, sep);
        docs
    }
}

fn push_joined(docs: &mut Vec<String>, parts: &VecDeque<&str>, sep: &str) {
    let joined = parts.iter().copied().collect::<Vec<_>>().join(sep);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}
