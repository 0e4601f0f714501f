pub mod models;
pub mod capacity;
pub mod ticket;
pub mod availability;
pub mod filter;
pub mod repository;
pub mod geocoding;
pub mod distance;
pub mod catalog;

use serde::Serialize;

pub use capacity::Capacity;
pub use availability::{availability, Availability};
pub use ticket::{validate_ticket, TicketValidationError};
pub use repository::{CatalogRepository, StoreError};
pub use geocoding::{Coordinates, Geocoder, GeocodeError, RetryingGeocoder, RetryPolicy};
pub use catalog::{
    Catalog, CrewChanges, JourneyChanges, RouteChanges, StationChanges, TrainChanges, TrainTypeChanges,
};

/// A rejected input attribute, reported back to the caller as-is
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0:?}")]
    ValidationError(Vec<FieldError>),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: uuid::Uuid },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Geocoding failed: {0}")]
    Geocode(#[from] GeocodeError),
}

pub type CoreResult<T> = Result<T, CoreError>;
