use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use serde::Serialize;
use uuid::Uuid;
use railway_core::models::Train;
use railway_core::repository::{CatalogRepository, StoreError};
use railway_core::ticket::validate_ticket;
use crate::models::{Order, TicketRequest};
use crate::repository::OrderRepository;

/// Creates orders together with their tickets, all-or-nothing.
///
/// Requests are validated up front (journey exists, seat within the train's
/// layout, no seat named twice). The storage transaction re-checks every
/// ticket and enforces seat uniqueness, which is what makes racing orders safe.
#[derive(Clone)]
pub struct OrderManager {
    catalog: Arc<dyn CatalogRepository>,
    orders: Arc<dyn OrderRepository>,
}

impl OrderManager {
    pub fn new(catalog: Arc<dyn CatalogRepository>, orders: Arc<dyn OrderRepository>) -> Self {
        Self { catalog, orders }
    }

    /// Create an order for `user_id` holding one ticket per request
    pub async fn create_order(&self, user_id: &str, requests: &[TicketRequest]) -> Result<Order, OrderError> {
        if requests.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        let trains = self.resolve_trains(requests).await?;

        let mut errors = Vec::new();
        for (index, req) in requests.iter().enumerate() {
            match trains.get(&req.journey) {
                Some(Some(train)) => {
                    if let Err(e) = validate_ticket(req.cargo, req.seat, train) {
                        errors.extend(
                            e.errors
                                .iter()
                                .map(|r| TicketFieldError::new(index, r.field.as_str(), r.to_string())),
                        );
                    }
                }
                _ => errors.push(TicketFieldError::unknown_journey(index, req.journey)),
            }
        }
        if !errors.is_empty() {
            tracing::warn!("Order for {} rejected: {} invalid ticket field(s)", user_id, errors.len());
            return Err(OrderError::Invalid(errors));
        }

        let mut seen = HashSet::new();
        for (index, req) in requests.iter().enumerate() {
            if !seen.insert((req.journey, req.cargo, req.seat)) {
                return Err(OrderError::SeatTaken {
                    index,
                    journey_id: req.journey,
                    cargo: req.cargo,
                    seat: req.seat,
                });
            }
        }

        let mut order = Order::new(user_id);
        for req in requests {
            order.add_ticket(req.journey, req.cargo, req.seat);
        }

        if let Err(e) = self.orders.create_order(&order).await {
            tracing::warn!("Order {} rolled back: {}", order.id, e);
            return Err(e.into());
        }

        tracing::info!("Order {} committed for {} with {} ticket(s)", order.id, user_id, order.tickets.len());
        Ok(order)
    }

    /// Fetch an order owned by `user_id`. Orders of other users read as missing.
    pub async fn get_order(&self, user_id: &str, order_id: Uuid) -> Result<Order, OrderError> {
        self.orders
            .get_order(order_id)
            .await?
            .filter(|order| order.user_id == user_id)
            .ok_or(OrderError::NotFound(order_id))
    }

    pub async fn list_orders(&self, user_id: &str) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.list_orders(user_id).await?)
    }

    /// Look up the train behind every distinct journey in the request
    async fn resolve_trains(&self, requests: &[TicketRequest]) -> Result<HashMap<Uuid, Option<Train>>, OrderError> {
        let mut trains = HashMap::new();

        for req in requests {
            if trains.contains_key(&req.journey) {
                continue;
            }
            let train = match self.catalog.get_journey(req.journey).await? {
                Some(journey) => self.catalog.get_train(journey.train_id).await?,
                None => None,
            };
            trains.insert(req.journey, train);
        }

        Ok(trains)
    }
}

/// A rejected attribute of the ticket at `index` in the request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketFieldError {
    pub index: usize,
    pub field: String,
    pub message: String,
}

impl TicketFieldError {
    pub fn new(index: usize, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            index,
            field: field.into(),
            message: message.into(),
        }
    }

    fn unknown_journey(index: usize, journey_id: Uuid) -> Self {
        Self::new(index, "journey", format!("Invalid pk \"{}\" - object does not exist.", journey_id))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("An order must contain at least one ticket")]
    EmptyOrder,

    #[error("Order rejected: {} invalid ticket field(s)", .0.len())]
    Invalid(Vec<TicketFieldError>),

    #[error("Ticket {index}: seat {seat} in cargo {cargo} is already taken on journey {journey_id}")]
    SeatTaken {
        index: usize,
        journey_id: Uuid,
        cargo: i32,
        seat: i32,
    },

    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Order storage failed: {0}")]
    Storage(#[source] StoreError),
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::JourneyMissing { index, journey_id } => {
                OrderError::Invalid(vec![TicketFieldError::unknown_journey(index, journey_id)])
            }
            StoreError::InvalidTicket { index, source } => OrderError::Invalid(
                source
                    .errors
                    .iter()
                    .map(|r| TicketFieldError::new(index, r.field.as_str(), r.to_string()))
                    .collect(),
            ),
            StoreError::SeatTaken { index, journey_id, cargo, seat } => {
                OrderError::SeatTaken { index, journey_id, cargo, seat }
            }
            other => OrderError::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use railway_core::ticket::{OutOfRange, TicketField, TicketValidationError};

    #[test]
    fn test_seat_conflict_keeps_index() {
        let journey_id = Uuid::new_v4();
        let err: OrderError = StoreError::SeatTaken { index: 2, journey_id, cargo: 1, seat: 1 }.into();
        assert!(matches!(err, OrderError::SeatTaken { index: 2, cargo: 1, seat: 1, .. }));
    }

    #[test]
    fn test_invalid_ticket_becomes_field_errors() {
        let source = TicketValidationError {
            errors: vec![OutOfRange { field: TicketField::Seat, value: 4, max: 3 }],
        };
        let err: OrderError = StoreError::InvalidTicket { index: 1, source }.into();

        match err {
            OrderError::Invalid(fields) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].index, 1);
                assert_eq!(fields[0].field, "seat");
                assert!(fields[0].message.contains("(1, 3)"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_backend_failure_is_not_a_validation_error() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
        let err: OrderError = StoreError::backend(io).into();
        assert!(matches!(err, OrderError::Storage(StoreError::Backend(_))));
    }
}
