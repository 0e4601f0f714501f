//! Seat bounds checking for tickets.
//!
//! The same check runs when an order request is validated and again when each
//! ticket row is written, so both paths reject exactly the same inputs.

use std::fmt;
use serde::Serialize;
use crate::capacity::Capacity;
use crate::models::Train;
use crate::FieldError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketField {
    Cargo,
    Seat,
}

impl TicketField {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketField::Cargo => "cargo",
            TicketField::Seat => "seat",
        }
    }
}

impl fmt::Display for TicketField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attribute outside its valid range `(1, max)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutOfRange {
    pub field: TicketField,
    pub value: i32,
    pub max: i32,
}

impl fmt::Display for OutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} number must be in available range: (1, {}), got {}",
            self.field, self.max, self.value
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketValidationError {
    pub errors: Vec<OutOfRange>,
}

impl fmt::Display for TicketValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid ticket")?;
        for (i, e) in self.errors.iter().enumerate() {
            write!(f, "{} {}", if i == 0 { ":" } else { ";" }, e)?;
        }
        Ok(())
    }
}

impl std::error::Error for TicketValidationError {}

impl TicketValidationError {
    pub fn has_field(&self, field: TicketField) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn field_errors(&self) -> Vec<FieldError> {
        self.errors
            .iter()
            .map(|e| FieldError::new(e.field.as_str(), e.to_string()))
            .collect()
    }
}

/// Check `1 <= cargo <= cargo_num` and `1 <= seat <= places_in_cargo`.
///
/// Both bounds are always checked so the caller sees every bad field at once.
pub fn validate_ticket(cargo: i32, seat: i32, train: &Train) -> Result<(), TicketValidationError> {
    let capacity = Capacity::of(train);
    let mut errors = Vec::new();

    for (field, value, max) in [
        (TicketField::Cargo, cargo, capacity.cargo_count),
        (TicketField::Seat, seat, capacity.places_in_cargo),
    ] {
        if !(1..=max).contains(&value) {
            errors.push(OutOfRange { field, value, max });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TicketValidationError { errors })
    }
}
