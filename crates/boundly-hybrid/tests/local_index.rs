use std::sync::Arc;

use boundly_core::config::{EmbeddingProviderKind, EmbeddingSettings, Settings};
use boundly_core::retry::RetryPolicy;
use boundly_core::traits::{DocumentIndex, Embedder, IndexWriter};
use boundly_core::types::{DocumentChunk, EmbeddedChunk};
use boundly_embed::FakeEmbedder;
use boundly_hybrid::{HybridRetriever, LocalDocumentIndex};

const DIM: usize = 64;

fn settings() -> Settings {
    let mut s = Settings::default();
    s.embedding = EmbeddingSettings { provider: EmbeddingProviderKind::Fake, dimension: DIM, ..EmbeddingSettings::default() };
    s.ingest.write_batch_size = 2;
    s
}

fn chunk(source: &str, i: usize, content: &str) -> DocumentChunk {
    DocumentChunk { source: source.into(), page: 1, chunk_index: i, content: content.into() }
}

async fn embed_all(embedder: &FakeEmbedder, chunks: Vec<DocumentChunk>) -> Vec<EmbeddedChunk> {
    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let vectors = embedder.embed_batch(&texts).await.unwrap();
    chunks.into_iter().zip(vectors).map(|(chunk, vector)| EmbeddedChunk { chunk, vector }).collect()
}

#[tokio::test]
async fn bulk_write_reports_rejects_and_indexes_the_rest() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let embedder = FakeEmbedder::new(DIM);
    let index = LocalDocumentIndex::open(&settings(), tmp.path(), embedder.embedder_id(), DIM).await?;

    let mut items = embed_all(
        &embedder,
        vec![
            chunk("Case001.pdf", 0, "The beneficiary has a BS in Computer Science."),
            chunk("Case002.pdf", 0, "The petitioner did not establish a specialty occupation."),
            chunk("Case003.pdf", 0, "Prevailing wage level one was certified."),
            chunk("Case004.pdf", 0, "   "),
        ],
    )
    .await;
    items.push(EmbeddedChunk { chunk: chunk("Case005.pdf", 0, "short vector"), vector: vec![0.5; 3] });

    let report = index.bulk_write(items).await?;
    assert_eq!(report.indexed, 3);
    assert_eq!(report.failed.len(), 2);
    let failed: Vec<_> = report.failed.iter().map(|f| f.source.as_str()).collect();
    assert!(failed.contains(&"Case004.pdf"));
    assert!(failed.contains(&"Case005.pdf"));

    assert_eq!(index.vector().count_rows().await?, 3);
    assert_eq!(index.text().num_docs(), 3);
    Ok(())
}

#[tokio::test]
async fn both_halves_share_ids_and_fuse() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let embedder = Arc::new(FakeEmbedder::new(DIM));
    let index = LocalDocumentIndex::open(&settings(), tmp.path(), embedder.embedder_id(), DIM).await?;
    let items = embed_all(
        &embedder,
        vec![
            chunk("Case001.pdf", 0, "The beneficiary holds a BS in Computer Science from a US university."),
            chunk("Case002.pdf", 0, "Financial analyst duties were found too generic."),
        ],
    )
    .await;
    index.bulk_write(items).await?;

    let q = "Does a BA in Computer Science qualify for H-1B?";
    let qv = embedder.embed_text(q);
    let dense = index.vector_search(&qv, 5, 20).await?;
    let sparse = index.text_search(q, 5).await?;
    let top_sparse = sparse.first().expect("lexical match");
    assert_eq!(top_sparse.source, "Case001.pdf");
    let same = dense.iter().find(|h| h.id == top_sparse.id).expect("same id in both halves");

    let index: Arc<dyn DocumentIndex> = Arc::new(index);
    let retriever = HybridRetriever::new(embedder, index).with_embed_policy(RetryPolicy::once());
    let results = retriever.search(q, 5, 5).await?;
    assert!(results.len() <= 10);
    assert_eq!(results.len(), 2, "two chunks, each listed once");
    let fused = results.iter().find(|r| r.doc_id == top_sparse.id).expect("fused entry");
    assert!((fused.score - (same.score + top_sparse.score)).abs() < 1e-4);
    assert_eq!(results[0].source, "Case001.pdf");
    Ok(())
}

#[tokio::test]
async fn empty_index_returns_no_results() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let embedder = Arc::new(FakeEmbedder::new(DIM));
    let index = LocalDocumentIndex::open(&settings(), tmp.path(), embedder.embedder_id(), DIM).await?;
    let retriever = HybridRetriever::new(embedder, Arc::new(index));
    assert!(retriever.search("specialty occupation", 5, 5).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn failed_text_write_rolls_back_vectors_and_reports_every_item() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let embedder = FakeEmbedder::new(DIM);
    let index = LocalDocumentIndex::open(&settings(), tmp.path(), embedder.embedder_id(), DIM)
        .await?
        .with_write_policy(RetryPolicy::once(), 2);

    let first = embed_all(
        &embedder,
        vec![
            chunk("Case001.pdf", 0, "The beneficiary holds a BS in Computer Science."),
            chunk("Case001.pdf", 1, "The offered role requires that degree."),
        ],
    )
    .await;
    assert_eq!(index.bulk_write(first).await?.indexed, 2);

    // Another writer owns the text index, so every text commit fails.
    let outside = tantivy::Index::open_in_dir(settings().index.text_dir(tmp.path()))?;
    let held: tantivy::IndexWriter = outside.writer_with_num_threads(1, 15_000_000)?;

    let second = embed_all(
        &embedder,
        vec![
            chunk("Case007.pdf", 0, "Market research analyst duties were generic."),
            chunk("Case007.pdf", 1, "The petition was denied."),
            chunk("Case008.pdf", 0, "Wage level two was certified."),
        ],
    )
    .await;
    let report = index.bulk_write(second).await?;
    assert_eq!(report.indexed, 0);
    assert_eq!(report.failed.len(), 3, "both write batches are attempted and reported");
    assert!(report.failed.iter().all(|f| f.reason.contains("text index writer")));

    assert_eq!(index.vector().count_rows().await?, 2);
    assert_eq!(index.text().num_docs(), 2);
    let query = embedder.embed_text("Market research analyst duties were generic.");
    let hits = index.vector_search(&query, 10, 10).await?;
    assert!(hits.iter().all(|h| h.source == "Case001.pdf"), "rolled-back chunks are not searchable");

    drop(held);
    let retry = embed_all(&embedder, vec![chunk("Case008.pdf", 0, "Wage level two was certified.")]).await;
    assert_eq!(index.bulk_write(retry).await?.indexed, 1);
    assert_eq!(index.vector().count_rows().await?, 3);
    assert_eq!(index.text().num_docs(), 3);
    Ok(())
}
