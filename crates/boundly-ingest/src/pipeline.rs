use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use indicatif::ProgressBar;
use tracing::{error, info, warn};

use boundly_core::config::IngestSettings;
use boundly_core::data_processor::DataProcessor;
use boundly_core::error::IngestionBatchError;
use boundly_core::retry::RetryPolicy;
use boundly_core::traits::{Embedder, IndexWriter};
use boundly_core::types::{DocumentChunk, EmbeddedChunk, WriteReport};
use boundly_core::{Error, Result};

use crate::extract::extract_pages;

#[derive(Debug, Default)]
pub struct IngestReport {
    pub files: usize,
    pub failed_files: usize,
    pub pages: usize,
    pub chunks: usize,
    pub embedded: usize,
    pub skipped_batches: Vec<IngestionBatchError>,
    pub write: WriteReport,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "files={} failed_files={} pages={} chunks={} embedded={} skipped_batches={} indexed={} failed_items={}",
            self.files,
            self.failed_files,
            self.pages,
            self.chunks,
            self.embedded,
            self.skipped_batches.len(),
            self.write.indexed,
            self.write.failed.len()
        )
    }
}

/// Offline corpus build: extract, split, embed in paced batches, bulk write.
///
/// Failures are tolerated at every step: an unreadable file, an embedding
/// batch that exhausts its retries, or a write that is rejected is logged and
/// reported while the rest of the corpus proceeds.
pub struct IngestPipeline {
    embedder: Arc<dyn Embedder>,
    writer: Arc<dyn IndexWriter>,
    processor: DataProcessor,
    batch_size: usize,
    pacing: Duration,
    embed_policy: RetryPolicy,
    progress: ProgressBar,
}

impl IngestPipeline {
    pub fn new(embedder: Arc<dyn Embedder>, writer: Arc<dyn IndexWriter>, processor: DataProcessor) -> Self {
        Self {
            embedder,
            writer,
            processor,
            batch_size: 20,
            pacing: Duration::from_secs(1),
            embed_policy: RetryPolicy::default(),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_settings(mut self, settings: &IngestSettings) -> Self {
        self.batch_size = settings.batch_size.max(1);
        self.pacing = Duration::from_millis(settings.pacing_ms);
        self.embed_policy = RetryPolicy::from(&settings.embed_retry);
        self
    }

    pub fn with_batching(mut self, batch_size: usize, pacing: Duration, embed_policy: RetryPolicy) -> Self {
        self.batch_size = batch_size.max(1);
        self.pacing = pacing;
        self.embed_policy = embed_policy;
        self
    }

    /// Progress is reported per embedding batch; hidden unless set.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub async fn run(&self, files: &[PathBuf]) -> Result<IngestReport> {
        let mut report = IngestReport { files: files.len(), ..IngestReport::default() };
        let mut chunks: Vec<DocumentChunk> = Vec::new();
        for path in files {
            let source = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            let owned = path.clone();
            let pages = match tokio::task::spawn_blocking(move || extract_pages(&owned)).await {
                Ok(Ok(pages)) => pages,
                Ok(Err(e)) => {
                    warn!(path = %path.display(), error = %e, "extraction failed, skipping file");
                    report.failed_files += 1;
                    continue;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "extraction task failed, skipping file");
                    report.failed_files += 1;
                    continue;
                }
            };
            report.pages += pages.len();
            let file_chunks = self.processor.chunk_pages(&source, &pages);
            info!(source = %source, pages = pages.len(), chunks = file_chunks.len(), "split");
            chunks.extend(file_chunks);
        }
        report.chunks = chunks.len();

        let (embedded, skipped) = self.embed_chunks(chunks).await;
        report.embedded = embedded.len();
        report.skipped_batches = skipped;

        report.write = self.writer.bulk_write(embedded).await?;
        info!(%report, "ingestion finished");
        Ok(report)
    }

    /// Embed in fixed-size batches with a pause between them. A batch that
    /// exhausts its retries is dropped and returned as an error value.
    pub async fn embed_chunks(&self, chunks: Vec<DocumentChunk>) -> (Vec<EmbeddedChunk>, Vec<IngestionBatchError>) {
        let total = chunks.len();
        let mut embedded = Vec::with_capacity(total);
        let mut skipped = Vec::new();
        self.progress.set_length(total as u64);

        let mut remaining = chunks.into_iter().peekable();
        let mut batch_no = 0usize;
        let mut start = 0usize;
        while remaining.peek().is_some() {
            let batch: Vec<DocumentChunk> = remaining.by_ref().take(self.batch_size).collect();
            let end = start + batch.len();
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();

            match self.embed_batch(&texts).await {
                Ok(vectors) => {
                    embedded.extend(batch.into_iter().zip(vectors).map(|(chunk, vector)| EmbeddedChunk { chunk, vector }));
                }
                Err(source) => {
                    let attempts = match &source {
                        Error::RetriesExhausted { attempts, .. } => *attempts,
                        _ => 1,
                    };
                    let err = IngestionBatchError { batch: batch_no, start, end, attempts, source };
                    error!(error = %err, "embedding batch skipped");
                    skipped.push(err);
                }
            }
            self.progress.inc((end - start) as u64);

            batch_no += 1;
            start = end;
            if remaining.peek().is_some() && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
        }
        self.progress.finish_and_clear();
        (embedded, skipped)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_policy
            .run("embed batch", || async {
                let vectors = self.embedder.embed_batch(texts).await?;
                if vectors.len() != texts.len() {
                    return Err(Error::embedding(format!("expected {} vectors, got {}", texts.len(), vectors.len())));
                }
                Ok(vectors)
            })
            .await
    }
}
