//! Field parsers for raw tabular cells.
//!
//! Cells arrive as optional strings (CSV) or optional text columns (SQLite).
//! An empty or whitespace-only cell counts as missing.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::SchemaError;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Format used when writing timestamps back to the relational store.
pub const STORE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Treats empty cells as missing and trims the rest.
pub fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Returns the trimmed cell, failing if it is missing.
pub fn required<'a>(
    value: Option<&'a str>,
    row: usize,
    column: &'static str,
) -> Result<&'a str, SchemaError> {
    present(value).ok_or(SchemaError::MissingValue { row, column })
}

/// Parses a timestamp in any of the accepted layouts.
///
/// Zoned values are converted to their naive local wall-clock time, so the
/// calendar day is the one printed in the source. A bare date is midnight.
pub fn parse_timestamp(
    value: &str,
    row: usize,
    column: &'static str,
) -> Result<NaiveDateTime, SchemaError> {
    let value = value.trim();

    if let Ok(zoned) = DateTime::parse_from_rfc3339(value) {
        return Ok(zoned.naive_local());
    }

    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(ts);
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| SchemaError::BadTimestamp {
            row,
            column,
            value: value.to_string(),
        })
}

pub fn parse_optional_timestamp(
    value: Option<&str>,
    row: usize,
    column: &'static str,
) -> Result<Option<NaiveDateTime>, SchemaError> {
    present(value)
        .map(|v| parse_timestamp(v, row, column))
        .transpose()
}

pub fn parse_bool(value: &str, row: usize, column: &'static str) -> Result<bool, SchemaError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        "false" | "f" | "0" | "no" | "n" => Ok(false),
        _ => Err(SchemaError::BadBoolean {
            row,
            column,
            value: value.to_string(),
        }),
    }
}

/// Parses a nullable non-negative amount.
///
/// Whole-valued decimals such as `3500.0` are accepted, since exporters that
/// pass integer columns through a float type write them that way.
pub fn parse_amount(
    value: Option<&str>,
    row: usize,
    column: &'static str,
) -> Result<Option<i64>, SchemaError> {
    let Some(raw) = present(value) else {
        return Ok(None);
    };

    let bad = || SchemaError::BadInteger {
        row,
        column,
        value: raw.to_string(),
    };

    let amount = match raw.parse::<i64>() {
        Ok(n) => n,
        Err(_) => {
            let f: f64 = raw.parse().map_err(|_| bad())?;
            if !f.is_finite() || f.fract() != 0.0 || f.abs() > i64::MAX as f64 {
                return Err(bad());
            }
            f as i64
        }
    };

    if amount < 0 {
        return Err(SchemaError::NegativeAmount {
            row,
            column,
            value: amount,
        });
    }

    Ok(Some(amount))
}

pub fn parse_status(value: &str, row: usize) -> Result<char, SchemaError> {
    let mut chars = value.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(SchemaError::BadStatus {
            row,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_present_treats_blank_as_missing() {
        assert_eq!(present(Some("   ")), None);
        assert_eq!(present(None), None);
        assert_eq!(present(Some(" x ")), Some("x"));
    }

    #[test]
    fn test_parse_timestamp_layouts() {
        let a = parse_timestamp("2025-10-17 07:15:30", 1, "waktu_transaksi").unwrap();
        let b = parse_timestamp("2025-10-17T07:15:30.250", 1, "waktu_transaksi").unwrap();
        let c = parse_timestamp("2025-10-17T07:15:30+07:00", 1, "waktu_transaksi").unwrap();
        let d = parse_timestamp("2025-10-17", 1, "waktu_transaksi").unwrap();

        let day = NaiveDate::from_ymd_opt(2025, 10, 17).unwrap();
        assert_eq!(a.date(), day);
        assert_eq!(b.date(), day);
        assert_eq!(c.date(), day);
        assert_eq!(c.hour(), 7);
        assert_eq!(d, day.and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        let err = parse_timestamp("yesterday", 4, "waktu_transaksi").unwrap_err();
        assert_eq!(
            err,
            SchemaError::BadTimestamp {
                row: 4,
                column: "waktu_transaksi",
                value: "yesterday".to_string()
            }
        );
    }

    #[test]
    fn test_parse_bool_spellings() {
        assert!(parse_bool("True", 1, "gate_in_boo").unwrap());
        assert!(parse_bool("1", 1, "gate_in_boo").unwrap());
        assert!(!parse_bool("false", 1, "gate_in_boo").unwrap());
        assert!(!parse_bool("0", 1, "gate_in_boo").unwrap());
        assert!(parse_bool("maybe", 1, "gate_in_boo").is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(Some("3500"), 1, "fare_int").unwrap(), Some(3500));
        assert_eq!(parse_amount(Some("3500.0"), 1, "fare_int").unwrap(), Some(3500));
        assert_eq!(parse_amount(Some(""), 1, "fare_int").unwrap(), None);
        assert_eq!(parse_amount(None, 1, "fare_int").unwrap(), None);
        assert!(parse_amount(Some("35.5"), 1, "fare_int").is_err());
        assert!(matches!(
            parse_amount(Some("-1"), 1, "fare_int"),
            Err(SchemaError::NegativeAmount { value: -1, .. })
        ));
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("S", 1).unwrap(), 'S');
        assert_eq!(parse_status(" X ", 1).unwrap(), 'X');
        assert!(parse_status("SS", 1).is_err());
        assert!(parse_status("", 1).is_err());
    }
}
