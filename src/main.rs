//! CLI entry point for the transit tap ETL.
//!
//! Each stage can be invoked on its own so a scheduler can sequence and
//! retry them, or all three can run in one process with `run`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use transit_tap_etl::{
    config::PipelineConfig, extract::Extractor, load::Loader, output::print_json,
    pipeline::run_pipeline, transform::Transformer,
};

#[derive(Parser)]
#[command(name = "transit_tap_etl")]
#[command(about = "Daily smart-card tap aggregation pipeline", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: PipelineConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage the transaction files and read every source relation
    Extract,
    /// Clean the staged transactions and compute the aggregates
    Transform,
    /// Recompute the aggregates and persist them to files and output tables
    Load,
    /// Run extract, transform and load in sequence
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/transit_tap_etl.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("transit_tap_etl.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    match cli.command {
        Commands::Extract => {
            let data = Extractor::new(&config).run().await?;
            print_json(&data.report())?;
        }
        Commands::Transform => {
            let output = Transformer::new(&config).run().await?;
            print_json(&output.report)?;
        }
        Commands::Load => {
            let report = Loader::new(&config).run().await?;
            print_json(&report)?;
        }
        Commands::Run => {
            let summary = run_pipeline(&config).await?;
            print_json(&summary)?;
        }
    }

    info!("Done");
    Ok(())
}
