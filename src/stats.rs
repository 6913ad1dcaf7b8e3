//! Counters reported by each pipeline stage.
//!
//! These are the data-quality signals of a run: how many duplicates were
//! dropped, how many values were imputed, how many bus taps could not be
//! attributed to a route. They are logged and returned to callers so tests
//! can assert on them.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MissingCounts {
    pub card_type_var: usize,
    pub balance_before_int: usize,
    pub balance_after_int: usize,
    pub fare_int: usize,
    pub no_body_var: usize,
    pub shelter_name_var: usize,
}

impl MissingCounts {
    pub fn total(&self) -> usize {
        self.card_type_var
            + self.balance_before_int
            + self.balance_after_int
            + self.fare_int
            + self.no_body_var
            + self.shelter_name_var
    }
}

/// Result of cleaning one transaction relation.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CleaningStats {
    pub table: String,
    pub rows_read: usize,
    pub duplicates_removed: usize,
    /// Missing values counted after dedup, before imputation.
    pub missing: MissingCounts,
    pub rows_before_filter: usize,
    pub settled_rows: usize,
}

impl CleaningStats {
    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn settled_pct(&self) -> f64 {
        Self::pct(self.settled_rows, self.rows_before_filter)
    }
}

/// Outcome of joining settled bus taps to realization and route reference.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RouteJoinStats {
    pub bus_rows: usize,
    /// Rows after the realization left join; exceeds `bus_rows` when a
    /// vehicle-day has several realization records.
    pub joined_rows: usize,
    pub no_realization: usize,
    pub unknown_route: usize,
    pub routed_rows: usize,
}

impl RouteJoinStats {
    /// Rows excluded from by-route reporting.
    pub fn dropped_rows(&self) -> usize {
        self.no_realization + self.unknown_route
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractReport {
    pub bus_rows: usize,
    pub stop_rows: usize,
    pub routes: usize,
    pub realization: usize,
    pub shelter_corridor: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct TransformReport {
    pub bus: CleaningStats,
    pub stop: CleaningStats,
    pub route_join: RouteJoinStats,
    pub by_card_type_rows: usize,
    pub by_route_rows: usize,
    pub by_tarif_rows: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub by_card_type_rows: usize,
    pub by_route_rows: usize,
    pub by_tarif_rows: usize,
    pub files_written: Vec<String>,
}

/// Everything a full run reports, serialized to JSON at the end of `run`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub extract: ExtractReport,
    pub transform: TransformReport,
    pub load: LoadReport,
}
