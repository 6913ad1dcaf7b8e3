use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use tracing::{debug, info};

use crate::parser::{STORE_DATETIME_FORMAT, parse_status, parse_timestamp};
use crate::records::{Tap, TapKind};
use crate::transform::types::{AggregateKind, Aggregates};

/// Relational store holding staged transactions and output aggregates.
///
/// Each stage opens its own `Warehouse` and closes it when done; nothing
/// holds a connection across stages.
pub struct Warehouse {
    pool: SqlitePool,
}

impl Warehouse {
    /// Opens a pool on `url`, creating the database file if needed.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid database url '{url}'"))?
            .create_if_missing(true);

        if let Some(parent) = options
            .get_filename()
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open database '{url}'"))?;

        debug!(url, "Warehouse connected");
        Ok(Self { pool })
    }

    /// Closes the pool, waiting for in-flight connections to be returned.
    pub async fn close(self) {
        self.pool.close().await;
        debug!("Warehouse closed");
    }

    /// Replaces both staging tables with a new snapshot.
    ///
    /// Both tables are dropped, recreated and filled in one transaction, so
    /// readers see either the previous pair or the complete new one.
    pub async fn replace_staging(&self, bus: &[Tap], stop: &[Tap]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        replace_taps(&mut tx, TapKind::Bus, bus).await?;
        replace_taps(&mut tx, TapKind::Stop, stop).await?;

        tx.commit()
            .await
            .context("failed to commit staging tables")?;

        for (kind, rows) in [(TapKind::Bus, bus), (TapKind::Stop, stop)] {
            info!(table = kind.staging_table(), rows = rows.len(), "Staging table replaced");
        }
        Ok(())
    }

    /// Reads a staging table back in the order it was written.
    pub async fn read_taps(&self, kind: TapKind) -> Result<Vec<Tap>> {
        let table = kind.staging_table();
        let rows = sqlx::query(&format!("SELECT * FROM {table} ORDER BY source_row"))
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("failed to read staging table {table}"))?;

        let taps = rows
            .iter()
            .enumerate()
            .map(|(i, row)| tap_from_row(row, i + 1, kind))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("malformed row in staging table {table}"))?;

        info!(table, rows = taps.len(), "Staging table read");
        Ok(taps)
    }

    /// Appends all three aggregate views to their output tables.
    ///
    /// The three inserts share one transaction: either every view is
    /// appended or none is. Rows are never upserted, so loading the same
    /// aggregates twice stores them twice.
    pub async fn append_aggregates(&self, aggregates: &Aggregates) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for kind in AggregateKind::ALL {
            sqlx::query(create_output_sql(kind))
                .execute(&mut *tx)
                .await?;
        }

        append_card_type(&mut tx, aggregates).await?;
        append_route(&mut tx, aggregates).await?;
        append_tarif(&mut tx, aggregates).await?;

        tx.commit()
            .await
            .context("failed to commit output tables")?;

        for kind in AggregateKind::ALL {
            info!(
                table = kind.table_name(),
                rows = aggregates.row_count(kind),
                "Output table appended"
            );
        }
        Ok(())
    }

    /// Row count of `table`, or zero if it does not exist yet.
    pub async fn count_rows(&self, table: &str) -> Result<i64> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?;

        if exists == 0 {
            return Ok(0);
        }

        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn extra_column(kind: TapKind) -> &'static str {
    match kind {
        TapKind::Bus => "no_body_var",
        TapKind::Stop => "shelter_name_var",
    }
}

fn create_staging_sql(kind: TapKind) -> String {
    format!(
        "CREATE TABLE {} (
            source_row INTEGER NOT NULL PRIMARY KEY,
            uuid TEXT NOT NULL,
            waktu_transaksi TEXT NOT NULL,
            insert_on_dtm TEXT,
            card_number_var TEXT NOT NULL,
            card_type_var TEXT,
            balance_before_int INTEGER,
            balance_after_int INTEGER,
            fare_int INTEGER,
            gate_in_boo INTEGER NOT NULL,
            free_service_boo INTEGER NOT NULL,
            status_var TEXT NOT NULL,
            {} TEXT
        )",
        kind.staging_table(),
        extra_column(kind)
    )
}

fn insert_staging_sql(kind: TapKind) -> String {
    format!(
        "INSERT INTO {} (
            source_row, uuid, waktu_transaksi, insert_on_dtm, card_number_var,
            card_type_var, balance_before_int, balance_after_int, fare_int,
            gate_in_boo, free_service_boo, status_var, {}
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        kind.staging_table(),
        extra_column(kind)
    )
}

async fn replace_taps(tx: &mut Transaction<'_, Sqlite>, kind: TapKind, rows: &[Tap]) -> Result<()> {
    let table = kind.staging_table();

    sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
        .execute(&mut **tx)
        .await?;
    sqlx::query(&create_staging_sql(kind))
        .execute(&mut **tx)
        .await?;

    let insert = insert_staging_sql(kind);
    for (i, tap) in rows.iter().enumerate() {
        let extra = match kind {
            TapKind::Bus => tap.no_body_var.as_deref(),
            TapKind::Stop => tap.shelter_name_var.as_deref(),
        };
        sqlx::query(&insert)
            .bind(i as i64)
            .bind(&tap.uuid)
            .bind(tap.waktu_transaksi.format(STORE_DATETIME_FORMAT).to_string())
            .bind(
                tap.insert_on_dtm
                    .map(|ts| ts.format(STORE_DATETIME_FORMAT).to_string()),
            )
            .bind(&tap.card_number_var)
            .bind(tap.card_type_var.as_deref())
            .bind(tap.balance_before_int)
            .bind(tap.balance_after_int)
            .bind(tap.fare_int)
            .bind(tap.gate_in_boo)
            .bind(tap.free_service_boo)
            .bind(tap.status_var.to_string())
            .bind(extra)
            .execute(&mut **tx)
            .await
            .with_context(|| format!("failed to insert into {table}"))?;
    }
    Ok(())
}

fn tap_from_row(row: &SqliteRow, n: usize, kind: TapKind) -> Result<Tap> {
    let waktu: String = row.try_get("waktu_transaksi")?;
    let insert_on: Option<String> = row.try_get("insert_on_dtm")?;
    let status: String = row.try_get("status_var")?;
    let extra: Option<String> = row.try_get(extra_column(kind))?;

    Ok(Tap {
        uuid: row.try_get("uuid")?,
        waktu_transaksi: parse_timestamp(&waktu, n, "waktu_transaksi")?,
        insert_on_dtm: insert_on
            .map(|ts| parse_timestamp(&ts, n, "insert_on_dtm"))
            .transpose()?,
        card_number_var: row.try_get("card_number_var")?,
        card_type_var: row.try_get("card_type_var")?,
        balance_before_int: row.try_get("balance_before_int")?,
        balance_after_int: row.try_get("balance_after_int")?,
        fare_int: row.try_get("fare_int")?,
        gate_in_boo: row.try_get("gate_in_boo")?,
        free_service_boo: row.try_get("free_service_boo")?,
        status_var: parse_status(&status, n)?,
        no_body_var: if kind == TapKind::Bus { extra.clone() } else { None },
        shelter_name_var: if kind == TapKind::Stop { extra } else { None },
    })
}

fn create_output_sql(kind: AggregateKind) -> &'static str {
    match kind {
        AggregateKind::ByCardType => {
            "CREATE TABLE IF NOT EXISTS output_by_card_type (
                tanggal TEXT NOT NULL,
                card_type TEXT NOT NULL,
                gate_in_boo INTEGER NOT NULL,
                jumlah_pelanggan INTEGER NOT NULL,
                total_amount INTEGER NOT NULL
            )"
        }
        AggregateKind::ByRoute => {
            "CREATE TABLE IF NOT EXISTS output_by_route (
                tanggal TEXT NOT NULL,
                route_code TEXT NOT NULL,
                route_name TEXT NOT NULL,
                gate_in_boo INTEGER NOT NULL,
                jumlah_pelanggan INTEGER NOT NULL,
                total_amount INTEGER NOT NULL
            )"
        }
        AggregateKind::ByTarif => {
            "CREATE TABLE IF NOT EXISTS output_by_tarif (
                tanggal TEXT NOT NULL,
                tarif INTEGER NOT NULL,
                gate_in_boo INTEGER NOT NULL,
                jumlah_pelanggan INTEGER NOT NULL,
                total_amount INTEGER NOT NULL
            )"
        }
    }
}

async fn append_card_type(tx: &mut Transaction<'_, Sqlite>, aggregates: &Aggregates) -> Result<()> {
    for row in &aggregates.by_card_type {
        sqlx::query(
            "INSERT INTO output_by_card_type
                (tanggal, card_type, gate_in_boo, jumlah_pelanggan, total_amount)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(row.tanggal.to_string())
        .bind(&row.card_type)
        .bind(row.gate_in_boo)
        .bind(i64::try_from(row.jumlah_pelanggan)?)
        .bind(row.total_amount)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn append_route(tx: &mut Transaction<'_, Sqlite>, aggregates: &Aggregates) -> Result<()> {
    for row in &aggregates.by_route {
        sqlx::query(
            "INSERT INTO output_by_route
                (tanggal, route_code, route_name, gate_in_boo, jumlah_pelanggan, total_amount)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(row.tanggal.to_string())
        .bind(&row.route_code)
        .bind(&row.route_name)
        .bind(row.gate_in_boo)
        .bind(i64::try_from(row.jumlah_pelanggan)?)
        .bind(row.total_amount)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn append_tarif(tx: &mut Transaction<'_, Sqlite>, aggregates: &Aggregates) -> Result<()> {
    for row in &aggregates.by_tarif {
        sqlx::query(
            "INSERT INTO output_by_tarif
                (tanggal, tarif, gate_in_boo, jumlah_pelanggan, total_amount)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(row.tanggal.to_string())
        .bind(row.tarif)
        .bind(row.gate_in_boo)
        .bind(i64::try_from(row.jumlah_pelanggan)?)
        .bind(row.total_amount)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::types::TarifAggregate;
    use chrono::NaiveDate;

    async fn open(dir: &tempfile::TempDir) -> Warehouse {
        let url = format!("sqlite://{}", dir.path().join("test.db").display());
        Warehouse::connect(&url).await.unwrap()
    }

    fn tap(uuid: &str) -> Tap {
        Tap {
            uuid: uuid.to_string(),
            waktu_transaksi: NaiveDate::from_ymd_opt(2025, 10, 17)
                .unwrap()
                .and_hms_milli_opt(7, 1, 2, 345)
                .unwrap(),
            insert_on_dtm: None,
            card_number_var: "6032".to_string(),
            card_type_var: None,
            balance_before_int: Some(10_000),
            balance_after_int: None,
            fare_int: Some(3_500),
            gate_in_boo: true,
            free_service_boo: false,
            status_var: 'S',
            no_body_var: Some("trj 7".to_string()),
            shelter_name_var: None,
        }
    }

    #[tokio::test]
    async fn test_replace_then_read_preserves_rows_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let wh = open(&dir).await;

        let rows = vec![tap("b"), tap("a"), tap("b")];
        wh.replace_staging(&rows, &[]).await.unwrap();
        let back = wh.read_taps(TapKind::Bus).await.unwrap();

        assert_eq!(back, rows);
        assert!(wh.read_taps(TapKind::Stop).await.unwrap().is_empty());
        wh.close().await;
    }

    #[tokio::test]
    async fn test_replace_is_full_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let wh = open(&dir).await;

        wh.replace_staging(&[tap("a")], &[tap("a"), tap("b")])
            .await
            .unwrap();
        wh.replace_staging(&[], &[tap("c")]).await.unwrap();

        assert_eq!(wh.count_rows("bus_transactions").await.unwrap(), 0);
        assert_eq!(wh.count_rows("stop_transactions").await.unwrap(), 1);
        wh.close().await;
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let wh = open(&dir).await;
        wh.replace_staging(&[tap("a"), tap("b")], &[tap("c")])
            .await
            .unwrap();

        // a view under the stop table's name makes its DROP TABLE fail
        sqlx::query("DROP TABLE stop_transactions")
            .execute(&wh.pool)
            .await
            .unwrap();
        sqlx::query("CREATE VIEW stop_transactions AS SELECT 1 AS x")
            .execute(&wh.pool)
            .await
            .unwrap();

        assert!(wh.replace_staging(&[tap("x")], &[tap("y")]).await.is_err());

        let bus = wh.read_taps(TapKind::Bus).await.unwrap();
        assert_eq!(bus.len(), 2);
        assert_eq!(bus[0].uuid, "a");
        wh.close().await;
    }

    #[tokio::test]
    async fn test_read_missing_table_fails() {
        let dir = tempfile::tempdir().unwrap();
        let wh = open(&dir).await;
        assert!(wh.read_taps(TapKind::Bus).await.is_err());
        wh.close().await;
    }

    #[tokio::test]
    async fn test_append_aggregates_is_not_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let wh = open(&dir).await;

        let aggregates = Aggregates {
            by_tarif: vec![TarifAggregate {
                tanggal: NaiveDate::from_ymd_opt(2025, 10, 17).unwrap(),
                tarif: 3500,
                gate_in_boo: true,
                jumlah_pelanggan: 2,
                total_amount: 7000,
            }],
            ..Default::default()
        };

        wh.append_aggregates(&aggregates).await.unwrap();
        wh.append_aggregates(&aggregates).await.unwrap();

        assert_eq!(wh.count_rows("output_by_tarif").await.unwrap(), 2);
        assert_eq!(wh.count_rows("output_by_route").await.unwrap(), 0);
        assert_eq!(wh.count_rows("no_such_table").await.unwrap(), 0);
        wh.close().await;
    }
}
