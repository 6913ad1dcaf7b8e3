//! Load stage: persist the aggregate views as files and append them to the
//! output tables.

use anyhow::Result;
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::output::aggregate_csv;
use crate::stats::LoadReport;
use crate::store::{FileStore, Warehouse};
use crate::transform::Transformer;
use crate::transform::types::{AggregateKind, Aggregates};

/// Writes every view to every store, then appends them to the warehouse.
///
/// All files are serialized up front, so a view that fails to serialize
/// stops the load before anything is written.
pub async fn load_into(
    stores: &[Box<dyn FileStore>],
    warehouse: &Warehouse,
    aggregates: &Aggregates,
) -> Result<LoadReport> {
    let files = AggregateKind::ALL
        .into_iter()
        .map(|kind| -> Result<_> { Ok((kind, aggregate_csv(aggregates, kind)?)) })
        .collect::<Result<Vec<_>>>()?;

    let mut files_written = Vec::new();
    for store in stores {
        for (kind, body) in &files {
            files_written.push(store.put(kind.file_name(), body).await?);
        }
    }
    info!(files = files_written.len(), "Aggregate files saved");

    warehouse.append_aggregates(aggregates).await?;

    Ok(LoadReport {
        by_card_type_rows: aggregates.by_card_type.len(),
        by_route_rows: aggregates.by_route.len(),
        by_tarif_rows: aggregates.by_tarif.len(),
        files_written,
    })
}

pub struct Loader<'a> {
    config: &'a PipelineConfig,
}

impl<'a> Loader<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Loads already computed aggregates with its own warehouse connection.
    #[tracing::instrument(skip_all, fields(output_dir = %self.config.output_dir.display()))]
    pub async fn load(&self, aggregates: &Aggregates) -> Result<LoadReport> {
        info!("Load stage started");

        let result = self.load_inner(aggregates).await;

        match &result {
            Ok(report) => info!(
                by_card_type = report.by_card_type_rows,
                by_route = report.by_route_rows,
                by_tarif = report.by_tarif_rows,
                "Load summary"
            ),
            Err(e) => error!(error = %format!("{e:#}"), "Error during data loading"),
        }
        result
    }

    /// Recomputes the aggregates from the staged tables, then loads them.
    #[tracing::instrument(skip_all)]
    pub async fn run(&self) -> Result<LoadReport> {
        let output = Transformer::new(self.config).run().await?;
        self.load(&output.aggregates).await
    }

    async fn load_inner(&self, aggregates: &Aggregates) -> Result<LoadReport> {
        let stores = self.config.file_stores().await;
        let warehouse = Warehouse::connect(&self.config.database_url).await?;
        let result = load_into(&stores, &warehouse, aggregates).await;
        warehouse.close().await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalFileStore;
    use crate::transform::types::CardTypeAggregate;
    use chrono::NaiveDate;

    fn aggregates() -> Aggregates {
        Aggregates {
            by_card_type: vec![CardTypeAggregate {
                tanggal: NaiveDate::from_ymd_opt(2025, 10, 17).unwrap(),
                card_type: "FLAZZ".to_string(),
                gate_in_boo: true,
                jumlah_pelanggan: 3,
                total_amount: 10_500,
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_load_into_writes_files_and_tables() {
        let dir = tempfile::tempdir().unwrap();
        let stores: Vec<Box<dyn FileStore>> = vec![Box::new(LocalFileStore::new(dir.path()))];
        let url = format!("sqlite://{}", dir.path().join("wh.db").display());
        let warehouse = Warehouse::connect(&url).await.unwrap();

        let report = load_into(&stores, &warehouse, &aggregates()).await.unwrap();

        assert_eq!(report.files_written.len(), 3);
        assert_eq!(report.by_card_type_rows, 1);
        assert!(dir.path().join("output_by_card_type.csv").exists());
        assert!(dir.path().join("output_by_route.csv").exists());
        assert!(dir.path().join("output_by_tarif.csv").exists());
        assert_eq!(
            warehouse.count_rows("output_by_card_type").await.unwrap(),
            1
        );
        warehouse.close().await;
    }

    #[tokio::test]
    async fn test_files_overwritten_tables_appended() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let config = PipelineConfig::local(
            format!("sqlite://{}", dir.path().join("wh.db").display()),
            dir.path(),
            &out,
        );
        let loader = Loader::new(&config);

        loader.load(&aggregates()).await.unwrap();
        loader.load(&aggregates()).await.unwrap();

        let content = std::fs::read_to_string(out.join("output_by_card_type.csv")).unwrap();
        assert_eq!(content.lines().count(), 2);

        let warehouse = Warehouse::connect(&config.database_url).await.unwrap();
        assert_eq!(
            warehouse.count_rows("output_by_card_type").await.unwrap(),
            2
        );
        warehouse.close().await;
    }
}
