//! Extract command - tables from a single file.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use tabgrid_core::{FormatHint, Pipeline, RecognitionMode};

use super::output::{OutputFormat, format_result};
use super::{StrategyArg, load_config};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input file (PDF or image)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Grid detection strategy for images
    #[arg(short, long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Tesseract page segmentation mode for cells (3, 6, 7, 8 or 11)
    #[arg(long)]
    psm: Option<u8>,
}

pub async fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(strategy) = args.strategy {
        config.grid.strategy = strategy.into();
    }
    if let Some(psm) = args.psm {
        config.ocr.recognition_mode = RecognitionMode::from_psm(psm)
            .ok_or_else(|| anyhow::anyhow!("Unsupported page segmentation mode: {}", psm))?;
    }

    // Check input file exists
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    FormatHint::from_path(&args.input)?;

    info!("Processing file: {}", args.input.display());

    let pipeline = Arc::new(Pipeline::new(config)?);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.set_message(format!("Extracting tables from {}", args.input.display()));
    pb.enable_steady_tick(Duration::from_millis(100));

    let input = args.input.clone();
    let result = tokio::task::spawn_blocking(move || pipeline.process(&input)).await?;
    pb.finish_and_clear();
    let result = result?;

    let output = format_result(&result, args.format)?;

    // Write output
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} {} tables written to {}",
            style("✓").green(),
            result.total_tables(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}
