//! Data types produced by the transform stage.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

/// A deduplicated, imputed, settled transaction ready for aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanTap {
    pub uuid: String,
    pub waktu_transaksi: NaiveDateTime,
    /// Calendar day of `waktu_transaksi`.
    pub tanggal: NaiveDate,
    pub card_number_var: String,
    pub card_type_var: String,
    pub balance_before_int: i64,
    pub balance_after_int: i64,
    pub fare_int: i64,
    pub gate_in_boo: bool,
    pub free_service_boo: bool,
    pub status_var: char,
    /// Body number as received (bus only), kept for audit.
    pub no_body_var_original: Option<String>,
    /// Canonical body number (bus only), used as join key.
    pub no_body_var: Option<String>,
    /// Stop only; `UNKNOWN` when the source left it empty.
    pub shelter_name_var: Option<String>,
}

/// Count and fare sum of one group.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Measures {
    pub jumlah_pelanggan: u64,
    pub total_amount: i64,
}

impl Measures {
    pub fn add(&mut self, fare: i64) {
        self.jumlah_pelanggan += 1;
        self.total_amount += fare;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardTypeAggregate {
    pub tanggal: NaiveDate,
    pub card_type: String,
    pub gate_in_boo: bool,
    pub jumlah_pelanggan: u64,
    pub total_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteAggregate {
    pub tanggal: NaiveDate,
    pub route_code: String,
    pub route_name: String,
    pub gate_in_boo: bool,
    pub jumlah_pelanggan: u64,
    pub total_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TarifAggregate {
    pub tanggal: NaiveDate,
    pub tarif: i64,
    pub gate_in_boo: bool,
    pub jumlah_pelanggan: u64,
    pub total_amount: i64,
}

/// Names of the three aggregate views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AggregateKind {
    ByCardType,
    ByRoute,
    ByTarif,
}

impl AggregateKind {
    pub const ALL: [AggregateKind; 3] = [
        AggregateKind::ByCardType,
        AggregateKind::ByRoute,
        AggregateKind::ByTarif,
    ];

    pub fn key(self) -> &'static str {
        match self {
            AggregateKind::ByCardType => "by_card_type",
            AggregateKind::ByRoute => "by_route",
            AggregateKind::ByTarif => "by_tarif",
        }
    }

    /// Append-only output table in the relational store.
    pub fn table_name(self) -> &'static str {
        match self {
            AggregateKind::ByCardType => "output_by_card_type",
            AggregateKind::ByRoute => "output_by_route",
            AggregateKind::ByTarif => "output_by_tarif",
        }
    }

    /// Output file, overwritten each run.
    pub fn file_name(self) -> &'static str {
        match self {
            AggregateKind::ByCardType => "output_by_card_type.csv",
            AggregateKind::ByRoute => "output_by_route.csv",
            AggregateKind::ByTarif => "output_by_tarif.csv",
        }
    }
}

/// The three aggregate views handed from transform to load.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Aggregates {
    pub by_card_type: Vec<CardTypeAggregate>,
    pub by_route: Vec<RouteAggregate>,
    pub by_tarif: Vec<TarifAggregate>,
}

impl Aggregates {
    pub fn row_count(&self, kind: AggregateKind) -> usize {
        match kind {
            AggregateKind::ByCardType => self.by_card_type.len(),
            AggregateKind::ByRoute => self.by_route.len(),
            AggregateKind::ByTarif => self.by_tarif.len(),
        }
    }
}
