//! Full run: extract, transform, load.
//!
//! Stages run one after another and each must finish before the next
//! starts; the first failure ends the run.

use anyhow::Result;
use chrono::Utc;
use tracing::info;

use crate::config::PipelineConfig;
use crate::extract::Extractor;
use crate::load::Loader;
use crate::stats::RunSummary;
use crate::transform::Transformer;

#[tracing::instrument(skip_all)]
pub async fn run_pipeline(config: &PipelineConfig) -> Result<RunSummary> {
    let started_at = Utc::now();

    info!("Step 1: extract");
    let extracted = Extractor::new(config).run().await?;

    info!("Step 2: transform");
    let transformed = Transformer::new(config).run().await?;

    info!("Step 3: load");
    let load = Loader::new(config).load(&transformed.aggregates).await?;

    Ok(RunSummary {
        started_at,
        finished_at: Utc::now(),
        extract: extracted.report(),
        transform: transformed.report,
        load,
    })
}
