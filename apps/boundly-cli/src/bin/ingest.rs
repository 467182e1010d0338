use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use boundly_cli::{init_tracing, load_settings, open_index};
use boundly_core::config::resolve_with_base;
use boundly_core::data_processor::{ChunkingConfig, DataProcessor};
use boundly_ingest::{discover, IngestPipeline};

/// Build the document index from the source corpus.
#[derive(Parser)]
#[command(name = "boundly-ingest")]
struct Args {
    /// Source roots; defaults to `ingest.roots`.
    roots: Vec<PathBuf>,
    /// File extensions to pick up; defaults to `ingest.extensions`.
    #[arg(long = "ext")]
    extensions: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let (settings, base) = load_settings()?;

    let roots: Vec<PathBuf> = if args.roots.is_empty() {
        settings.ingest.roots.iter().map(|r| resolve_with_base(&base, r)).collect()
    } else {
        args.roots
    };
    let extensions = if args.extensions.is_empty() { settings.ingest.extensions.clone() } else { args.extensions };

    let files = discover(&roots, &extensions);
    if files.is_empty() {
        warn!(?roots, ?extensions, "no source files found");
        return Ok(());
    }
    info!(files = files.len(), "discovered source files");

    let (embedder, index) = open_index(&settings, &base).await?;
    let bar = ProgressBar::new(0);
    bar.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} chunks embedded ({eta})")?);

    let pipeline = IngestPipeline::new(embedder, Arc::new(index), DataProcessor::new(ChunkingConfig::from(&settings.chunking)))
        .with_settings(&settings.ingest)
        .with_progress(bar);
    let report = pipeline.run(&files).await?;

    println!("{report}");
    for skipped in &report.skipped_batches {
        println!("  skipped: {skipped}");
    }
    for failed in &report.write.failed {
        println!("  not indexed: {}#{}: {}", failed.source, failed.chunk_index, failed.reason);
    }
    Ok(())
}
