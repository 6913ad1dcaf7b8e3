//! Output formatting for aggregate views and run summaries.

use anyhow::Result;
use csv::WriterBuilder;
use serde::Serialize;
use tracing::info;

use crate::transform::types::{AggregateKind, Aggregates};

/// Column order of each output file and table.
pub fn columns(kind: AggregateKind) -> &'static [&'static str] {
    match kind {
        AggregateKind::ByCardType => &[
            "tanggal",
            "card_type",
            "gate_in_boo",
            "jumlah_pelanggan",
            "total_amount",
        ],
        AggregateKind::ByRoute => &[
            "tanggal",
            "route_code",
            "route_name",
            "gate_in_boo",
            "jumlah_pelanggan",
            "total_amount",
        ],
        AggregateKind::ByTarif => &[
            "tanggal",
            "tarif",
            "gate_in_boo",
            "jumlah_pelanggan",
            "total_amount",
        ],
    }
}

/// Serializes rows to CSV bytes.
///
/// The header is always written, so an empty view still yields a file
/// downstream readers can parse.
pub fn to_csv<T: Serialize>(header: &[&str], rows: &[T]) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(writer.into_inner().map_err(|e| e.into_error())?)
}

/// CSV bytes of one aggregate view.
pub fn aggregate_csv(aggregates: &Aggregates, kind: AggregateKind) -> Result<Vec<u8>> {
    let header = columns(kind);
    match kind {
        AggregateKind::ByCardType => to_csv(header, &aggregates.by_card_type),
        AggregateKind::ByRoute => to_csv(header, &aggregates.by_route),
        AggregateKind::ByTarif => to_csv(header, &aggregates.by_tarif),
    }
}

/// Logs a value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::LoadReport;
    use crate::transform::types::RouteAggregate;
    use chrono::NaiveDate;

    #[test]
    fn test_empty_view_still_has_header() {
        let bytes = aggregate_csv(&Aggregates::default(), AggregateKind::ByTarif).unwrap();
        let content = String::from_utf8(bytes).unwrap();
        assert_eq!(
            content,
            "tanggal,tarif,gate_in_boo,jumlah_pelanggan,total_amount\n"
        );
    }

    #[test]
    fn test_route_csv_rows() {
        let aggregates = Aggregates {
            by_route: vec![RouteAggregate {
                tanggal: NaiveDate::from_ymd_opt(2025, 10, 17).unwrap(),
                route_code: "1A".to_string(),
                route_name: "Blok M - Kota".to_string(),
                gate_in_boo: true,
                jumlah_pelanggan: 2,
                total_amount: 7000,
            }],
            ..Default::default()
        };

        let content =
            String::from_utf8(aggregate_csv(&aggregates, AggregateKind::ByRoute).unwrap()).unwrap();
        let lines: Vec<_> = content.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "2025-10-17,1A,Blok M - Kota,true,2,7000");
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&LoadReport::default()).unwrap();
    }
}
