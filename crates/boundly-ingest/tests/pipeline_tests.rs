use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use boundly_core::data_processor::{ChunkingConfig, DataProcessor};
use boundly_core::retry::RetryPolicy;
use boundly_core::traits::{Embedder, IndexWriter};
use boundly_core::types::{EmbeddedChunk, WriteReport};
use boundly_core::{Error, Result};
use boundly_ingest::{discover, IngestPipeline};

/// Fails every call whose batch contains "POISON".
struct PickyEmbedder {
    calls: AtomicUsize,
}

#[async_trait]
impl Embedder for PickyEmbedder {
    fn embedder_id(&self) -> &str {
        "picky"
    }
    fn dim(&self) -> usize {
        3
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if texts.iter().any(|t| t.contains("POISON")) {
            return Err(Error::embedding("HTTP 503"));
        }
        Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0, 0.0]).collect())
    }
}

#[derive(Default)]
struct RecordingWriter {
    items: Mutex<Vec<EmbeddedChunk>>,
}

#[async_trait]
impl IndexWriter for RecordingWriter {
    async fn bulk_write(&self, items: Vec<EmbeddedChunk>) -> Result<WriteReport> {
        let n = items.len();
        self.items.lock().unwrap().extend(items);
        Ok(WriteReport { indexed: n, failed: vec![] })
    }
}

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        min_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(2),
        jitter: true,
        attempt_timeout: Some(Duration::from_secs(5)),
    }
}

fn pipeline(embedder: Arc<PickyEmbedder>, writer: Arc<RecordingWriter>, chunk_size: usize) -> IngestPipeline {
    let processor = DataProcessor::new(ChunkingConfig { chunk_size, chunk_overlap: 0 });
    IngestPipeline::new(embedder, writer, processor).with_batching(2, Duration::ZERO, fast_policy(3))
}

#[tokio::test]
async fn failing_batch_is_skipped_and_others_are_written() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("articles");
    fs::create_dir_all(&root).unwrap();
    // No two paragraphs fit one chunk, so each is its own; batches of two.
    let paragraphs = [
        "alpha paragraph one",
        "bravo paragraph two",
        "charlie POISON three",
        "delta paragraph four",
        "echo paragraph five",
        "foxtrot paragraph six",
    ];
    fs::write(root.join("a.txt"), paragraphs.join("\n\n")).unwrap();

    let embedder = Arc::new(PickyEmbedder { calls: AtomicUsize::new(0) });
    let writer = Arc::new(RecordingWriter::default());
    let files = discover(&[root], &["txt".to_string()]);
    let report = pipeline(embedder.clone(), writer.clone(), 24).run(&files).await.unwrap();

    assert_eq!(report.files, 1);
    assert_eq!(report.chunks, 6);
    assert_eq!(report.skipped_batches.len(), 1);
    let skipped = &report.skipped_batches[0];
    assert_eq!((skipped.batch, skipped.start, skipped.end, skipped.attempts), (1, 2, 4, 3));
    assert_eq!(report.embedded, 4);
    assert_eq!(report.write.indexed, 4);

    let written: Vec<String> = writer.items.lock().unwrap().iter().map(|e| e.chunk.content.clone()).collect();
    assert_eq!(written, vec!["alpha paragraph one", "bravo paragraph two", "echo paragraph five", "foxtrot paragraph six"]);
    // two good batches once each, the poisoned one three times
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn unreadable_files_are_counted_not_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("broken.pdf"), b"%PDF-garbage").unwrap();
    fs::write(tmp.path().join("ok.md"), "Wage level guidance.").unwrap();

    let files = discover(&[tmp.path().to_path_buf()], &["pdf".to_string(), "md".to_string()]);
    let writer = Arc::new(RecordingWriter::default());
    let report = pipeline(Arc::new(PickyEmbedder { calls: AtomicUsize::new(0) }), writer, 40).run(&files).await.unwrap();
    assert_eq!(report.files, 2);
    assert_eq!(report.failed_files, 1);
    assert_eq!(report.write.indexed, 1);
    assert!(report.skipped_batches.is_empty());
}

fn write_pdf(path: &Path, pages: &[&str]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }
    let count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

#[tokio::test]
async fn pdf_pages_become_chunks_with_basename_source() {
    let tmp = tempfile::tempdir().unwrap();
    let cases = tmp.path().join("cases");
    fs::create_dir_all(&cases).unwrap();
    write_pdf(&cases.join("Case001.pdf"), &["The beneficiary holds a BS in Computer Science.", "Approved."]);

    let files = discover(&[cases], &["pdf".to_string()]);
    let writer = Arc::new(RecordingWriter::default());
    let report = pipeline(Arc::new(PickyEmbedder { calls: AtomicUsize::new(0) }), writer.clone(), 40).run(&files).await.unwrap();
    assert_eq!(report.pages, 2);

    let items = writer.items.lock().unwrap();
    assert!(items.iter().all(|e| e.chunk.source == "Case001.pdf"));
    assert!(items.iter().any(|e| e.chunk.content.contains("Computer") && e.chunk.page == 1));
    assert!(items.iter().any(|e| e.chunk.page == 2));
}
