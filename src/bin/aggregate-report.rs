use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use videc_bench::report::{OutputLayout, load_individual_summaries, write_report_file};

#[derive(Parser, Debug)]
#[command(about = "Rebuild report.md from individual_summary/*.csv")]
struct Args {
    #[arg(long, default_value = "benchmark-results")]
    output_dir: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let layout = OutputLayout::new(&args.output_dir);
    let summaries = load_individual_summaries(&layout).with_context(|| {
        format!(
            "failed to load summaries under {}",
            args.output_dir.display()
        )
    })?;
    if summaries.is_empty() {
        bail!(
            "no summary CSV files in {}",
            layout.root().join("individual_summary").display()
        );
    }

    let path = write_report_file(&layout, &summaries).context("write report")?;
    println!(
        "aggregated {} variants, report written to: {}",
        summaries.len(),
        path.display()
    );
    Ok(())
}
