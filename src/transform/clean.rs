use std::collections::{BTreeSet, HashSet};

use tracing::{debug, info};

use crate::normalize::normalize_body_no;
use crate::records::{Tap, TapKind};
use crate::stats::{CleaningStats, MissingCounts};
use crate::transform::types::CleanTap;

/// Sentinel for missing categorical values.
pub const UNKNOWN: &str = "UNKNOWN";

/// Status code of settled customer transactions.
pub const SETTLED: char = 'S';

const NORMALIZATION_SAMPLE: usize = 10;

/// Deduplicates, normalizes, imputes and filters one transaction relation.
///
/// Order matters: duplicates are dropped before the status filter, so a
/// `uuid` whose first occurrence is unsettled is gone entirely even if a
/// later copy is settled.
pub fn clean_transactions(kind: TapKind, rows: Vec<Tap>) -> (Vec<CleanTap>, CleaningStats) {
    let mut stats = CleaningStats {
        table: kind.staging_table().to_string(),
        rows_read: rows.len(),
        ..Default::default()
    };

    let unique = dedup_by_uuid(rows);
    stats.duplicates_removed = stats.rows_read - unique.len();
    info!(
        table = kind.staging_table(),
        duplicates = stats.duplicates_removed,
        "Removed duplicate rows"
    );

    stats.missing = count_missing(kind, &unique);
    info!(
        table = kind.staging_table(),
        card_type_var = stats.missing.card_type_var,
        balance_before_int = stats.missing.balance_before_int,
        balance_after_int = stats.missing.balance_after_int,
        fare_int = stats.missing.fare_int,
        no_body_var = stats.missing.no_body_var,
        shelter_name_var = stats.missing.shelter_name_var,
        "Missing values before cleaning"
    );

    let cleaned: Vec<CleanTap> = unique.into_iter().map(|tap| impute(kind, tap)).collect();

    if kind == TapKind::Bus {
        log_normalization_sample(&cleaned);
    }

    stats.rows_before_filter = cleaned.len();
    let settled: Vec<CleanTap> = cleaned
        .into_iter()
        .filter(|tap| tap.status_var == SETTLED)
        .collect();
    stats.settled_rows = settled.len();

    info!(
        table = kind.staging_table(),
        before = stats.rows_before_filter,
        settled = stats.settled_rows,
        settled_pct = stats.settled_pct(),
        "Filtered to settled rows"
    );

    (settled, stats)
}

/// Keeps the first row seen for each `uuid`, preserving input order.
pub fn dedup_by_uuid(rows: Vec<Tap>) -> Vec<Tap> {
    let mut seen = HashSet::with_capacity(rows.len());
    rows.into_iter()
        .filter(|tap| seen.insert(tap.uuid.clone()))
        .collect()
}

fn count_missing(kind: TapKind, rows: &[Tap]) -> MissingCounts {
    let mut missing = MissingCounts::default();
    for tap in rows {
        missing.card_type_var += tap.card_type_var.is_none() as usize;
        missing.balance_before_int += tap.balance_before_int.is_none() as usize;
        missing.balance_after_int += tap.balance_after_int.is_none() as usize;
        missing.fare_int += tap.fare_int.is_none() as usize;
        match kind {
            TapKind::Bus => missing.no_body_var += tap.no_body_var.is_none() as usize,
            TapKind::Stop => missing.shelter_name_var += tap.shelter_name_var.is_none() as usize,
        }
    }
    missing
}

fn impute(kind: TapKind, tap: Tap) -> CleanTap {
    let (no_body_var_original, no_body_var, shelter_name_var) = match kind {
        TapKind::Bus => {
            let canonical = normalize_body_no(tap.no_body_var.as_deref());
            (tap.no_body_var, canonical, None)
        }
        TapKind::Stop => (
            None,
            None,
            Some(tap.shelter_name_var.unwrap_or_else(|| UNKNOWN.to_string())),
        ),
    };

    CleanTap {
        tanggal: tap.waktu_transaksi.date(),
        uuid: tap.uuid,
        waktu_transaksi: tap.waktu_transaksi,
        card_number_var: tap.card_number_var,
        card_type_var: tap.card_type_var.unwrap_or_else(|| UNKNOWN.to_string()),
        balance_before_int: tap.balance_before_int.unwrap_or(0),
        balance_after_int: tap.balance_after_int.unwrap_or(0),
        fare_int: tap.fare_int.unwrap_or(0),
        gate_in_boo: tap.gate_in_boo,
        free_service_boo: tap.free_service_boo,
        status_var: tap.status_var,
        no_body_var_original,
        no_body_var,
        shelter_name_var,
    }
}

fn log_normalization_sample(rows: &[CleanTap]) {
    let mut sample = BTreeSet::new();
    for tap in rows {
        if sample.len() >= NORMALIZATION_SAMPLE {
            break;
        }
        sample.insert((tap.no_body_var_original.clone(), tap.no_body_var.clone()));
    }
    for (original, canonical) in sample {
        debug!(?original, ?canonical, "Body number normalization");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn tap(uuid: &str, status: char) -> Tap {
        Tap {
            uuid: uuid.to_string(),
            waktu_transaksi: NaiveDate::from_ymd_opt(2025, 10, 17)
                .unwrap()
                .and_hms_opt(7, 30, 0)
                .unwrap(),
            insert_on_dtm: None,
            card_number_var: format!("card-{uuid}"),
            card_type_var: Some("FLAZZ".to_string()),
            balance_before_int: Some(10_000),
            balance_after_int: Some(6_500),
            fare_int: Some(3_500),
            gate_in_boo: true,
            free_service_boo: false,
            status_var: status,
            no_body_var: None,
            shelter_name_var: None,
        }
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let mut second = tap("A", 'X');
        second.fare_int = Some(1);
        let rows = vec![tap("A", 'S'), second, tap("B", 'S')];

        let unique = dedup_by_uuid(rows);

        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].uuid, "A");
        assert_eq!(unique[0].fare_int, Some(3_500));
        assert_eq!(unique[1].uuid, "B");
    }

    #[test]
    fn test_dedup_runs_before_status_filter() {
        let rows = vec![tap("A", 'S'), tap("A", 'S'), tap("B", 'X')];

        let (clean, stats) = clean_transactions(TapKind::Bus, rows);

        assert_eq!(clean.len(), 1);
        assert_eq!(clean[0].uuid, "A");
        assert_eq!(stats.rows_read, 3);
        assert_eq!(stats.duplicates_removed, 1);
        assert_eq!(stats.rows_before_filter, 2);
        assert_eq!(stats.settled_rows, 1);
    }

    #[test]
    fn test_unsettled_first_copy_wins() {
        let rows = vec![tap("A", 'X'), tap("A", 'S')];
        let (clean, _) = clean_transactions(TapKind::Stop, rows);
        assert!(clean.is_empty());
    }

    #[test]
    fn test_imputation_defaults() {
        let mut bare = tap("A", 'S');
        bare.card_type_var = None;
        bare.balance_before_int = None;
        bare.balance_after_int = None;
        bare.fare_int = None;

        let (clean, stats) = clean_transactions(TapKind::Stop, vec![bare]);

        let row = &clean[0];
        assert_eq!(row.card_type_var, UNKNOWN);
        assert_eq!(row.balance_before_int, 0);
        assert_eq!(row.balance_after_int, 0);
        assert_eq!(row.fare_int, 0);
        assert_eq!(row.shelter_name_var.as_deref(), Some(UNKNOWN));
        assert_eq!(stats.missing.total(), 5);
    }

    #[test]
    fn test_bus_keeps_original_and_canonical_body() {
        let mut bus = tap("A", 'S');
        bus.no_body_var = Some(" trj 7 ".to_string());

        let (clean, _) = clean_transactions(TapKind::Bus, vec![bus]);

        assert_eq!(clean[0].no_body_var_original.as_deref(), Some(" trj 7 "));
        assert_eq!(clean[0].no_body_var.as_deref(), Some("TRJ-007"));
        assert_eq!(clean[0].shelter_name_var, None);
    }

    #[test]
    fn test_derives_calendar_day() {
        let (clean, _) = clean_transactions(TapKind::Bus, vec![tap("A", 'S')]);
        assert_eq!(clean[0].tanggal, NaiveDate::from_ymd_opt(2025, 10, 17).unwrap());
    }

    #[test]
    fn test_every_survivor_is_settled_and_unique() {
        let rows = vec![
            tap("A", 'S'),
            tap("B", 'F'),
            tap("C", 'S'),
            tap("A", 'S'),
            tap("D", 'P'),
            tap("C", 'X'),
        ];
        let (clean, _) = clean_transactions(TapKind::Stop, rows);

        let uuids: HashSet<_> = clean.iter().map(|t| t.uuid.as_str()).collect();
        assert_eq!(uuids.len(), clean.len());
        assert!(clean.iter().all(|t| t.status_var == SETTLED));
        assert_eq!(clean.len(), 2);
    }
}
