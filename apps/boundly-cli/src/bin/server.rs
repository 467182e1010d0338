use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use boundly_answer::{router, AnsweringService};
use boundly_cli::{init_tracing, load_settings};

/// Serve `POST /boundly/query`.
#[derive(Parser)]
#[command(name = "boundly-server")]
struct Args {
    /// Overrides `server.host`.
    #[arg(long)]
    host: Option<String>,
    /// Overrides `server.port`.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let (settings, base) = load_settings()?;

    let service = AnsweringService::from_settings(&settings, &base).await?;
    let app = router(Arc::new(service));

    let host = args.host.unwrap_or_else(|| settings.server.host.clone());
    let port = args.port.unwrap_or(settings.server.port);
    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("binding {host}:{port}"))?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
