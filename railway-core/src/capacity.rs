use crate::models::Train;

/// Seat layout of a train: `cargo_count` cars with `places_in_cargo` seats each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub cargo_count: i32,
    pub places_in_cargo: i32,
}

impl Capacity {
    pub fn of(train: &Train) -> Self {
        Self {
            cargo_count: train.cargo_num,
            places_in_cargo: train.places_in_cargo,
        }
    }

    /// Total number of seats on the train
    pub fn total(&self) -> i64 {
        i64::from(self.cargo_count) * i64::from(self.places_in_cargo)
    }

    pub fn cargos(&self) -> std::ops::RangeInclusive<i32> {
        1..=self.cargo_count
    }
}
