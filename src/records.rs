//! Typed schemas for the source relations.
//!
//! Raw rows deserialize with every column optional so that a missing column
//! surfaces as a [`SchemaError`] naming it, rather than a generic CSV error.

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::error::SchemaError;
use crate::parser::{
    parse_amount, parse_bool, parse_optional_timestamp, parse_status, parse_timestamp, present,
    required,
};

/// The two transaction sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapKind {
    /// Taps on board a bus, carrying a vehicle body number.
    Bus,
    /// Taps at a stop gate, carrying a shelter name.
    Stop,
}

impl TapKind {
    pub fn source_file(self) -> &'static str {
        match self {
            TapKind::Bus => "dummy_transaksi_bus.csv",
            TapKind::Stop => "dummy_transaksi_halte.csv",
        }
    }

    /// Staging table in the relational store, fully replaced on every run.
    pub fn staging_table(self) -> &'static str {
        match self {
            TapKind::Bus => "bus_transactions",
            TapKind::Stop => "stop_transactions",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TapKind::Bus => "bus",
            TapKind::Stop => "stop",
        }
    }
}

/// A transaction row as it appears in the source file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawTap {
    pub uuid: Option<String>,
    pub waktu_transaksi: Option<String>,
    pub insert_on_dtm: Option<String>,
    pub card_number_var: Option<String>,
    pub card_type_var: Option<String>,
    pub balance_before_int: Option<String>,
    pub balance_after_int: Option<String>,
    pub fare_int: Option<String>,
    pub gate_in_boo: Option<String>,
    pub free_service_boo: Option<String>,
    pub status_var: Option<String>,
    pub no_body_var: Option<String>,
    pub shelter_name_var: Option<String>,
}

/// A validated transaction row, bus or stop.
///
/// Business fields that upstream systems leave empty stay `None` here;
/// imputation happens during cleaning, not at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Tap {
    pub uuid: String,
    pub waktu_transaksi: NaiveDateTime,
    pub insert_on_dtm: Option<NaiveDateTime>,
    pub card_number_var: String,
    pub card_type_var: Option<String>,
    pub balance_before_int: Option<i64>,
    pub balance_after_int: Option<i64>,
    pub fare_int: Option<i64>,
    pub gate_in_boo: bool,
    pub free_service_boo: bool,
    pub status_var: char,
    /// Bus only.
    pub no_body_var: Option<String>,
    /// Stop only.
    pub shelter_name_var: Option<String>,
}

impl Tap {
    /// Validates a raw row. `row` is the 1-based data row used in errors.
    pub fn from_raw(raw: &RawTap, row: usize, kind: TapKind) -> Result<Self, SchemaError> {
        let text = |v: &Option<String>| present(v.as_deref()).map(str::to_string);

        Ok(Tap {
            uuid: required(raw.uuid.as_deref(), row, "uuid")?.to_string(),
            waktu_transaksi: parse_timestamp(
                required(raw.waktu_transaksi.as_deref(), row, "waktu_transaksi")?,
                row,
                "waktu_transaksi",
            )?,
            insert_on_dtm: parse_optional_timestamp(
                raw.insert_on_dtm.as_deref(),
                row,
                "insert_on_dtm",
            )?,
            card_number_var: required(raw.card_number_var.as_deref(), row, "card_number_var")?
                .to_string(),
            card_type_var: text(&raw.card_type_var),
            balance_before_int: parse_amount(
                raw.balance_before_int.as_deref(),
                row,
                "balance_before_int",
            )?,
            balance_after_int: parse_amount(
                raw.balance_after_int.as_deref(),
                row,
                "balance_after_int",
            )?,
            fare_int: parse_amount(raw.fare_int.as_deref(), row, "fare_int")?,
            gate_in_boo: parse_bool(
                required(raw.gate_in_boo.as_deref(), row, "gate_in_boo")?,
                row,
                "gate_in_boo",
            )?,
            free_service_boo: parse_bool(
                required(raw.free_service_boo.as_deref(), row, "free_service_boo")?,
                row,
                "free_service_boo",
            )?,
            status_var: parse_status(required(raw.status_var.as_deref(), row, "status_var")?, row)?,
            no_body_var: match kind {
                // kept as received; normalization works from the raw cell
                TapKind::Bus => raw
                    .no_body_var
                    .clone()
                    .filter(|v| present(Some(v.as_str())).is_some()),
                TapKind::Stop => None,
            },
            shelter_name_var: match kind {
                TapKind::Bus => None,
                TapKind::Stop => text(&raw.shelter_name_var),
            },
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawRoute {
    pub route_code: Option<String>,
    pub route_name: Option<String>,
}

/// One entry of the route reference, keyed by `route_code`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub route_code: String,
    pub route_name: String,
}

impl Route {
    pub fn from_raw(raw: &RawRoute, row: usize) -> Result<Self, SchemaError> {
        Ok(Route {
            route_code: required(raw.route_code.as_deref(), row, "route_code")?.to_string(),
            route_name: required(raw.route_name.as_deref(), row, "route_name")?.to_string(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawRealization {
    pub tanggal_realisasi: Option<String>,
    pub bus_body_no: Option<String>,
    pub rute_realisasi: Option<String>,
}

/// Which route a vehicle actually ran on a given day.
#[derive(Debug, Clone, PartialEq)]
pub struct Realization {
    pub tanggal_realisasi: NaiveDateTime,
    pub bus_body_no: Option<String>,
    pub rute_realisasi: Option<String>,
}

impl Realization {
    pub fn from_raw(raw: &RawRealization, row: usize) -> Result<Self, SchemaError> {
        Ok(Realization {
            tanggal_realisasi: parse_timestamp(
                required(raw.tanggal_realisasi.as_deref(), row, "tanggal_realisasi")?,
                row,
                "tanggal_realisasi",
            )?,
            bus_body_no: present(raw.bus_body_no.as_deref()).map(str::to_string),
            rute_realisasi: present(raw.rute_realisasi.as_deref()).map(str::to_string),
        })
    }
}

/// An untyped relation: header plus string cells.
///
/// Used for the shelter/corridor reference, which is loaded but never joined.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
