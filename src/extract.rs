//! Extraction stage: stage the transaction files in the relational store and
//! load every source relation into memory.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::error::SchemaError;
use crate::records::{RawRealization, RawRoute, RawTable, RawTap, Realization, Route, Tap, TapKind};
use crate::stats::ExtractReport;
use crate::store::Warehouse;

pub const ROUTES_FILE: &str = "dummy_routes.csv";
pub const REALIZATION_FILE: &str = "dummy_realisasi_bus.csv";
pub const SHELTER_CORRIDOR_FILE: &str = "dummy_shelter_corridor.csv";

/// Reference relations read straight from their files.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub routes: Vec<Route>,
    pub realization: Vec<Realization>,
    pub shelter_corridor: RawTable,
}

/// All five source relations.
#[derive(Debug, Clone, Default)]
pub struct ExtractedData {
    pub bus: Vec<Tap>,
    pub stop: Vec<Tap>,
    pub reference: ReferenceData,
}

impl ExtractedData {
    pub fn report(&self) -> ExtractReport {
        ExtractReport {
            bus_rows: self.bus.len(),
            stop_rows: self.stop.len(),
            routes: self.reference.routes.len(),
            realization: self.reference.realization.len(),
            shelter_corridor: self.reference.shelter_corridor.len(),
        }
    }
}

/// Deserializes every row of `path` and validates it with `convert`.
fn read_csv<R, T>(
    path: &Path,
    convert: impl Fn(&R, usize) -> Result<T, SchemaError>,
) -> Result<Vec<T>>
where
    R: DeserializeOwned,
{
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for (i, result) in rdr.deserialize().enumerate() {
        let raw: R = result.with_context(|| format!("failed to read {}", path.display()))?;
        let row = convert(&raw, i + 1)
            .with_context(|| format!("invalid row in {}", path.display()))?;
        rows.push(row);
    }

    info!(file = %path.display(), rows = rows.len(), "Loaded CSV");
    Ok(rows)
}

pub fn read_taps_csv(path: &Path, kind: TapKind) -> Result<Vec<Tap>> {
    read_csv(path, |raw: &RawTap, row| Tap::from_raw(raw, row, kind))
}

pub fn read_routes_csv(path: &Path) -> Result<Vec<Route>> {
    read_csv(path, Route::from_raw)
}

pub fn read_realization_csv(path: &Path) -> Result<Vec<Realization>> {
    read_csv(path, Realization::from_raw)
}

/// Reads a CSV file without a schema.
pub fn read_raw_table(path: &Path) -> Result<RawTable> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let headers = rdr
        .headers()
        .with_context(|| format!("failed to read header of {}", path.display()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.with_context(|| format!("failed to read {}", path.display()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    info!(file = %path.display(), rows = rows.len(), "Loaded CSV");
    Ok(RawTable { headers, rows })
}

/// Reads the route, realization and shelter/corridor files.
pub fn read_reference(config: &PipelineConfig) -> Result<ReferenceData> {
    Ok(ReferenceData {
        routes: read_routes_csv(&config.input_file(ROUTES_FILE))?,
        realization: read_realization_csv(&config.input_file(REALIZATION_FILE))?,
        shelter_corridor: read_raw_table(&config.input_file(SHELTER_CORRIDOR_FILE))?,
    })
}

pub struct Extractor<'a> {
    config: &'a PipelineConfig,
}

impl<'a> Extractor<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Validates both transaction files and replaces their staging tables.
    #[tracing::instrument(skip_all)]
    pub async fn stage_transactions(&self, warehouse: &Warehouse) -> Result<()> {
        info!("Staging transaction files");
        let bus = self.read_transactions(TapKind::Bus)?;
        let stop = self.read_transactions(TapKind::Stop)?;
        warehouse.replace_staging(&bus, &stop).await
    }

    fn read_transactions(&self, kind: TapKind) -> Result<Vec<Tap>> {
        read_taps_csv(&self.config.input_file(kind.source_file()), kind)
    }

    #[tracing::instrument(skip_all)]
    pub fn extract_csv_files(&self) -> Result<ReferenceData> {
        read_reference(self.config)
    }

    /// Reads both staging tables back.
    #[tracing::instrument(skip_all)]
    pub async fn extract_from_store(&self, warehouse: &Warehouse) -> Result<(Vec<Tap>, Vec<Tap>)> {
        let bus = warehouse.read_taps(TapKind::Bus).await?;
        let stop = warehouse.read_taps(TapKind::Stop).await?;
        Ok((bus, stop))
    }

    /// Runs the extraction stage with its own warehouse connection.
    #[tracing::instrument(skip_all, fields(input_dir = %self.config.input_dir.display()))]
    pub async fn run(&self) -> Result<ExtractedData> {
        info!("Extract stage started");

        let warehouse = Warehouse::connect(&self.config.database_url).await?;
        let result = self.run_with(&warehouse).await;
        warehouse.close().await;

        match &result {
            Ok(data) => {
                let report = data.report();
                info!(
                    bus = report.bus_rows,
                    stop = report.stop_rows,
                    routes = report.routes,
                    realization = report.realization,
                    shelter_corridor = report.shelter_corridor,
                    "Extract stage completed"
                );
            }
            Err(e) => error!(error = %format!("{e:#}"), "Error during extraction"),
        }
        result
    }

    async fn run_with(&self, warehouse: &Warehouse) -> Result<ExtractedData> {
        self.stage_transactions(warehouse).await?;
        let reference = self.extract_csv_files()?;
        let (bus, stop) = self.extract_from_store(warehouse).await?;
        Ok(ExtractedData {
            bus,
            stop,
            reference,
        })
    }
}
