use clap::Parser;

use boundly_cli::{init_tracing, load_settings, open_index};
use boundly_vector::index_build::{rebuild_ann_index, IndexBuildOutcome};

/// Build and activate an IVF_PQ index over the chunk table.
#[derive(Parser)]
#[command(name = "boundly-build-index")]
struct Args {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let _ = Args::parse();
    let (settings, base) = load_settings()?;
    let (_, index) = open_index(&settings, &base).await?;

    match rebuild_ann_index(index.vector()).await? {
        IndexBuildOutcome::Skipped { rows } => println!("skipped: {rows} rows is below the IVF_PQ minimum, flat search stays in use"),
        IndexBuildOutcome::Built { name, rows, params } => {
            println!("built {name} over {rows} rows (nlist={} m={} nbits={})", params.nlist, params.m, params.nbits);
        }
    }
    Ok(())
}
