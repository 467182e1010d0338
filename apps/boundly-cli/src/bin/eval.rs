use std::path::PathBuf;

use clap::Parser;

use boundly_answer::eval::{evaluate, load_questions};
use boundly_answer::AnsweringService;
use boundly_cli::{init_tracing, load_settings};
use boundly_core::config::resolve_with_base;

/// Score decisions and explanations against labelled questions.
#[derive(Parser)]
#[command(name = "boundly-eval")]
struct Args {
    /// Defaults to `eval.questions_dir`.
    #[arg(long)]
    dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let (settings, base) = load_settings()?;
    let dir = args.dir.unwrap_or_else(|| resolve_with_base(&base, &settings.eval.questions_dir));

    let set = load_questions(&dir)?;
    let service = AnsweringService::from_settings(&settings, &base).await?;
    let report = evaluate(&service, &set).await;

    println!("Exact-match accuracy: {:.3} ({}/{})", report.accuracy, report.correct, report.answered);
    println!("ROUGE-L F1: {:.3} over {} explanations", report.rouge_l, report.rouge_scored);
    if report.failed > 0 {
        println!("Failed questions: {}", report.failed);
    }
    if report.unreadable > 0 {
        println!("Unreadable question files: {}", report.unreadable);
        for path in &set.unreadable {
            println!("  {}", path.display());
        }
    }
    Ok(())
}
