use std::collections::BTreeMap;
use serde::Serialize;
use crate::capacity::Capacity;
use crate::models::Train;

/// Free seats on a journey, overall and per cargo.
///
/// Values are not clamped: an oversold cargo shows up as a negative count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub total_free: i64,
    pub free_by_cargo: BTreeMap<i32, i64>,
}

/// Compute free seats from the train layout and the number of tickets sold in each cargo.
///
/// `sold_by_cargo` holds `(cargo, tickets_sold)` pairs, as returned by a grouped count.
/// A cargo outside `1..=cargo_num` keeps its own negative entry so the per-cargo
/// values always sum to `capacity - sold`.
pub fn availability(train: &Train, sold_by_cargo: &[(i32, i64)]) -> Availability {
    let capacity = Capacity::of(train);
    let per_cargo = i64::from(capacity.places_in_cargo);

    let mut free_by_cargo: BTreeMap<i32, i64> = capacity.cargos().map(|cargo| (cargo, per_cargo)).collect();

    for &(cargo, sold) in sold_by_cargo {
        *free_by_cargo.entry(cargo).or_insert(0) -= sold;
    }

    let total_free = free_by_cargo.values().sum();

    Availability { total_free, free_by_cargo }
}

/// Free seats on a journey given only the total number of tickets sold.
///
/// Used by list views, which never need the per-cargo breakdown.
pub fn total_free(train: &Train, tickets_sold: i64) -> i64 {
    Capacity::of(train).total() - tickets_sold
}
