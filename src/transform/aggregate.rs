//! Grouped aggregates over cleaned transactions.
//!
//! Group keys are typed tuples collected into a [`BTreeMap`], so every view
//! comes out sorted by its key and identical inputs give identical files.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::error::SchemaError;
use crate::normalize::normalize_body_no;
use crate::records::{Realization, Route};
use crate::stats::RouteJoinStats;
use crate::transform::types::{
    Aggregates, CardTypeAggregate, CleanTap, Measures, RouteAggregate, TarifAggregate,
};

/// Counts rows and sums fares per key.
fn group<K: Ord>(rows: impl IntoIterator<Item = (K, i64)>) -> BTreeMap<K, Measures> {
    let mut groups: BTreeMap<K, Measures> = BTreeMap::new();
    for (key, fare) in rows {
        groups.entry(key).or_default().add(fare);
    }
    groups
}

/// Bus and stop taps together, grouped by day, card type and gate-in flag.
pub fn aggregate_by_card_type(bus: &[CleanTap], stop: &[CleanTap]) -> Vec<CardTypeAggregate> {
    let keyed = bus.iter().chain(stop).map(|tap| {
        (
            (tap.tanggal, tap.card_type_var.clone(), tap.gate_in_boo),
            tap.fare_int,
        )
    });

    group(keyed)
        .into_iter()
        .map(|((tanggal, card_type, gate_in_boo), m)| CardTypeAggregate {
            tanggal,
            card_type,
            gate_in_boo,
            jumlah_pelanggan: m.jumlah_pelanggan,
            total_amount: m.total_amount,
        })
        .collect()
}

/// Bus and stop taps together, grouped by day, fare and gate-in flag.
pub fn aggregate_by_tarif(bus: &[CleanTap], stop: &[CleanTap]) -> Vec<TarifAggregate> {
    let keyed = bus
        .iter()
        .chain(stop)
        .map(|tap| ((tap.tanggal, tap.fare_int, tap.gate_in_boo), tap.fare_int));

    group(keyed)
        .into_iter()
        .map(|((tanggal, tarif, gate_in_boo), m)| TarifAggregate {
            tanggal,
            tarif,
            gate_in_boo,
            jumlah_pelanggan: m.jumlah_pelanggan,
            total_amount: m.total_amount,
        })
        .collect()
}

/// Builds the route lookup, rejecting a reference that repeats a code.
fn route_index(routes: &[Route]) -> Result<HashMap<&str, &str>, SchemaError> {
    let mut index = HashMap::with_capacity(routes.len());
    for route in routes {
        if index
            .insert(route.route_code.as_str(), route.route_name.as_str())
            .is_some()
        {
            return Err(SchemaError::DuplicateRoute(route.route_code.clone()));
        }
    }
    Ok(index)
}

type RealizationKey = (NaiveDate, Option<String>);

/// Realized route codes per (day, canonical body number).
///
/// A missing body number is a key like any other: realization rows without
/// one match bus taps without one on the same day.
fn realization_index(realization: &[Realization]) -> HashMap<RealizationKey, Vec<Option<&str>>> {
    let mut index: HashMap<RealizationKey, Vec<Option<&str>>> = HashMap::new();
    for r in realization {
        let body = normalize_body_no(r.bus_body_no.as_deref());
        index
            .entry((r.tanggal_realisasi.date(), body))
            .or_default()
            .push(r.rute_realisasi.as_deref());
    }
    index
}

/// Settled bus taps attributed to the route their vehicle actually ran.
///
/// Bus taps are left-joined to realization on (day, canonical body number),
/// then to the route reference on the realized route code. Rows that end up
/// without a known route are dropped from this view and counted in the
/// returned [`RouteJoinStats`]. Stop taps have no route attribution and never
/// take part.
pub fn aggregate_by_route(
    bus: &[CleanTap],
    realization: &[Realization],
    routes: &[Route],
) -> Result<(Vec<RouteAggregate>, RouteJoinStats), SchemaError> {
    let routes = route_index(routes)?;
    let realized = realization_index(realization);

    let multi = realized.values().filter(|v| v.len() > 1).count();
    if multi > 0 {
        warn!(
            vehicle_days = multi,
            "Realization has several records for some vehicle-days, matching taps are counted once per record"
        );
    }

    let mut stats = RouteJoinStats {
        bus_rows: bus.len(),
        ..Default::default()
    };
    let mut keyed = Vec::with_capacity(bus.len());

    for tap in bus {
        let Some(matches) = realized.get(&(tap.tanggal, tap.no_body_var.clone())) else {
            stats.joined_rows += 1;
            stats.no_realization += 1;
            continue;
        };

        for rute in matches {
            stats.joined_rows += 1;
            let route = rute.and_then(|code| routes.get_key_value(code));
            match route {
                Some((code, name)) => keyed.push((
                    (tap.tanggal, code.to_string(), name.to_string(), tap.gate_in_boo),
                    tap.fare_int,
                )),
                None => stats.unknown_route += 1,
            }
        }
    }

    stats.routed_rows = keyed.len();

    let rows = group(keyed)
        .into_iter()
        .map(
            |((tanggal, route_code, route_name, gate_in_boo), m)| RouteAggregate {
                tanggal,
                route_code,
                route_name,
                gate_in_boo,
                jumlah_pelanggan: m.jumlah_pelanggan,
                total_amount: m.total_amount,
            },
        )
        .collect();

    Ok((rows, stats))
}

/// Computes all three views. Nothing is returned unless all three succeed.
pub fn aggregate_all(
    bus: &[CleanTap],
    stop: &[CleanTap],
    realization: &[Realization],
    routes: &[Route],
) -> Result<(Aggregates, RouteJoinStats), SchemaError> {
    let by_card_type = aggregate_by_card_type(bus, stop);
    info!(rows = by_card_type.len(), "Card type aggregation");

    let (by_route, join) = aggregate_by_route(bus, realization, routes)?;
    info!(
        rows = by_route.len(),
        routed = join.routed_rows,
        no_realization = join.no_realization,
        unknown_route = join.unknown_route,
        "Route aggregation"
    );

    let by_tarif = aggregate_by_tarif(bus, stop);
    info!(rows = by_tarif.len(), "Tarif aggregation");

    Ok((
        Aggregates {
            by_card_type,
            by_route,
            by_tarif,
        },
        join,
    ))
}
