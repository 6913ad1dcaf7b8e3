//! Transform stage: clean the staged transactions, reconcile bus taps with
//! the routes their vehicles actually ran, and compute the three aggregate
//! views.

pub mod aggregate;
pub mod clean;
pub mod types;

use anyhow::Result;
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::extract::read_reference;
use crate::records::{Realization, Route, Tap, TapKind};
use crate::stats::TransformReport;
use crate::store::Warehouse;
use crate::transform::aggregate::aggregate_all;
use crate::transform::clean::clean_transactions;
use crate::transform::types::Aggregates;

#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub aggregates: Aggregates,
    pub report: TransformReport,
}

/// Cleans both relations and aggregates them against the references.
pub fn transform(
    bus: Vec<Tap>,
    stop: Vec<Tap>,
    realization: &[Realization],
    routes: &[Route],
) -> Result<TransformOutput> {
    let (bus, bus_stats) = clean_transactions(TapKind::Bus, bus);
    let (stop, stop_stats) = clean_transactions(TapKind::Stop, stop);

    let (aggregates, route_join) = aggregate_all(&bus, &stop, realization, routes)?;

    let report = TransformReport {
        bus: bus_stats,
        stop: stop_stats,
        route_join,
        by_card_type_rows: aggregates.by_card_type.len(),
        by_route_rows: aggregates.by_route.len(),
        by_tarif_rows: aggregates.by_tarif.len(),
    };

    Ok(TransformOutput { aggregates, report })
}

pub struct Transformer<'a> {
    config: &'a PipelineConfig,
}

impl<'a> Transformer<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Runs the transform stage with its own warehouse connection.
    #[tracing::instrument(skip_all)]
    pub async fn run(&self) -> Result<TransformOutput> {
        info!("Transform stage started");

        let result = self.run_inner().await;

        match &result {
            Ok(output) => info!(
                by_card_type = output.report.by_card_type_rows,
                by_route = output.report.by_route_rows,
                by_tarif = output.report.by_tarif_rows,
                route_rows_dropped = output.report.route_join.dropped_rows(),
                "Transform stage completed"
            ),
            Err(e) => error!(error = %format!("{e:#}"), "Error during transformation"),
        }
        result
    }

    async fn run_inner(&self) -> Result<TransformOutput> {
        let warehouse = Warehouse::connect(&self.config.database_url).await?;
        let staged = read_staged(&warehouse).await;
        warehouse.close().await;
        let (bus, stop) = staged?;

        let reference = read_reference(self.config)?;
        transform(bus, stop, &reference.realization, &reference.routes)
    }
}

async fn read_staged(warehouse: &Warehouse) -> Result<(Vec<Tap>, Vec<Tap>)> {
    let bus = warehouse.read_taps(TapKind::Bus).await?;
    let stop = warehouse.read_taps(TapKind::Stop).await?;
    Ok((bus, stop))
}
