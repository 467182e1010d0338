use std::sync::Arc;

use clap::Parser;

use boundly_cli::{init_tracing, load_settings, open_index};
use boundly_core::retry::RetryPolicy;
use boundly_hybrid::HybridRetriever;

/// Run hybrid retrieval and print the fused ranking.
#[derive(Parser)]
#[command(name = "boundly-search")]
struct Args {
    query: String,
    /// Defaults to `retrieval.k_dense`.
    #[arg(long)]
    k_dense: Option<usize>,
    /// Defaults to `retrieval.k_sparse`.
    #[arg(long)]
    k_sparse: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let (settings, base) = load_settings()?;
    let (embedder, index) = open_index(&settings, &base).await?;

    let retriever = HybridRetriever::new(embedder, Arc::new(index))
        .with_oversample(settings.retrieval.oversample)
        .with_embed_policy(RetryPolicy::from(&settings.retrieval.embed_retry));
    let k_dense = args.k_dense.unwrap_or(settings.retrieval.k_dense);
    let k_sparse = args.k_sparse.unwrap_or(settings.retrieval.k_sparse);
    let results = retriever.search(&args.query, k_dense, k_sparse).await?;

    if results.is_empty() {
        println!("no results");
    }
    for (rank, r) in results.iter().enumerate() {
        let preview: String = r.content.chars().take(160).collect();
        println!("{:>2}. {:.4}  {}  [{}]\n    {}", rank + 1, r.score, r.source, r.doc_id, preview.replace('\n', " "));
    }
    Ok(())
}
