use async_trait::async_trait;
use uuid::Uuid;
use crate::filter::{JourneyFilter, RouteFilter};
use crate::models::{
    Crew, Journey, JourneyDetail, JourneyListing, Route, RouteDetail, RouteListing, Station, Train,
    TrainListing, TrainType,
};
use crate::ticket::TicketValidationError;

/// Failures raised by a storage backend.
///
/// Ticket-level variants carry the index of the ticket in the order being
/// written, so callers can point at the exact input that was rejected.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Ticket {index}: journey {journey_id} does not exist")]
    JourneyMissing { index: usize, journey_id: Uuid },

    #[error("Ticket {index}: {source}")]
    InvalidTicket {
        index: usize,
        #[source]
        source: TicketValidationError,
    },

    #[error("Ticket {index}: seat {seat} in cargo {cargo} is already taken on journey {journey_id}")]
    SeatTaken {
        index: usize,
        journey_id: Uuid,
        cargo: i32,
        seat: i32,
    },

    #[error("Storage backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        StoreError::Backend(Box::new(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for the network catalog: stations, routes, trains, crew and journeys.
///
/// `update_*` and `delete_*` return whether a row existed. An update that points
/// at a missing referenced row fails with [`StoreError::NotFound`]. Deletes cascade the way the
/// foreign keys do: a deleted train takes its journeys, and their tickets, with it.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn insert_station(&self, station: &Station) -> StoreResult<()>;
    async fn get_station(&self, id: Uuid) -> StoreResult<Option<Station>>;
    async fn list_stations(&self) -> StoreResult<Vec<Station>>;
    async fn update_station(&self, station: &Station) -> StoreResult<bool>;
    async fn delete_station(&self, id: Uuid) -> StoreResult<bool>;

    async fn insert_route(&self, route: &Route) -> StoreResult<()>;
    async fn get_route(&self, id: Uuid) -> StoreResult<Option<RouteDetail>>;
    async fn list_routes(&self, filter: &RouteFilter) -> StoreResult<Vec<RouteListing>>;
    async fn update_route(&self, route: &Route) -> StoreResult<bool>;
    async fn delete_route(&self, id: Uuid) -> StoreResult<bool>;

    async fn insert_train_type(&self, train_type: &TrainType) -> StoreResult<()>;
    async fn get_train_type(&self, id: Uuid) -> StoreResult<Option<TrainType>>;
    async fn list_train_types(&self) -> StoreResult<Vec<TrainType>>;
    async fn update_train_type(&self, train_type: &TrainType) -> StoreResult<bool>;
    async fn delete_train_type(&self, id: Uuid) -> StoreResult<bool>;

    async fn insert_train(&self, train: &Train) -> StoreResult<()>;
    async fn get_train(&self, id: Uuid) -> StoreResult<Option<Train>>;
    async fn list_trains(&self) -> StoreResult<Vec<TrainListing>>;
    async fn update_train(&self, train: &Train) -> StoreResult<bool>;
    async fn delete_train(&self, id: Uuid) -> StoreResult<bool>;

    async fn insert_crew(&self, crew: &Crew) -> StoreResult<()>;
    async fn get_crew(&self, id: Uuid) -> StoreResult<Option<Crew>>;
    async fn list_crew(&self) -> StoreResult<Vec<Crew>>;
    async fn update_crew(&self, crew: &Crew) -> StoreResult<bool>;
    async fn delete_crew(&self, id: Uuid) -> StoreResult<bool>;

    async fn insert_journey(&self, journey: &Journey) -> StoreResult<()>;
    async fn get_journey(&self, id: Uuid) -> StoreResult<Option<Journey>>;
    async fn get_journey_detail(&self, id: Uuid) -> StoreResult<Option<JourneyDetail>>;
    async fn list_journeys(&self, filter: &JourneyFilter) -> StoreResult<Vec<JourneyListing>>;
    /// Replaces the journey row and its crew assignment together.
    async fn update_journey(&self, journey: &Journey) -> StoreResult<bool>;
    async fn delete_journey(&self, id: Uuid) -> StoreResult<bool>;

    /// `(cargo, tickets_sold)` for every cargo with at least one ticket on the journey,
    /// read in a single query.
    async fn sold_by_cargo(&self, journey_id: Uuid) -> StoreResult<Vec<(i32, i64)>>;
}
