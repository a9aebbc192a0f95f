//! Tabula - command line entry point

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tabula::charts::{DiscardSink, PlotSink, StaticChartRenderer};
use tabula::recipes::{self, Report};
use tabula::DatasetConfig;

#[derive(Parser)]
#[command(name = "tabula", version, about = "Exploratory analysis of tabular data")]
struct Args {
    #[command(subcommand)]
    recipe: Recipe,
    /// Dataset config (JSON); replaces the recipe's preset
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Input file; overrides the configured source path
    #[arg(short, long, global = true)]
    input: Option<PathBuf>,
    /// Read at most this many data rows
    #[arg(short, long, global = true)]
    rows: Option<usize>,
    /// Write PNG charts into this directory
    #[arg(long, global = true)]
    charts: Option<PathBuf>,
}

#[derive(Subcommand, Clone, Copy)]
enum Recipe {
    /// NYC 311 service requests
    ServiceRequests,
    /// Kyoto cherry blossom full-flowering dates
    BloomDates,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DatasetConfig::from_json_file(path)?,
        None => match args.recipe {
            Recipe::ServiceRequests => DatasetConfig::service_requests(),
            Recipe::BloomDates => DatasetConfig::bloom_dates(),
        },
    };
    if let Some(input) = args.input {
        config = config.with_input(input);
    }
    if let Some(rows) = args.rows {
        config = config.with_max_rows(rows);
    }
    if let Some(dir) = args.charts {
        config = config.with_chart_dir(dir);
    }

    let rows = tabula::prepare(&config)
        .with_context(|| format!("Failed to prepare {}", config.source.path.display()))?;

    let mut renderer;
    let mut discard = DiscardSink;
    let sink: &mut dyn PlotSink = match &config.charts.out_dir {
        Some(dir) => {
            renderer = StaticChartRenderer::new(dir);
            &mut renderer
        }
        None => &mut discard,
    };
    let report = Report::new(sink, (config.charts.width, config.charts.height));

    let findings = match args.recipe {
        Recipe::ServiceRequests => recipes::service_requests(&rows, report)?,
        Recipe::BloomDates => recipes::bloom_dates(&rows, report)?,
    };

    for finding in &findings {
        println!("{finding}\n");
    }
    Ok(())
}
