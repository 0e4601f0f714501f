use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, SubsecRound, Utc};
use railway_core::models::Train;
use railway_core::ticket::{validate_ticket, TicketValidationError};

/// A purchase grouping one or more tickets under one user.
///
/// Orders are written once, together with all their tickets, and never modified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub user_id: String,
    pub tickets: Vec<Ticket>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            tickets: Vec::new(),
            // Postgres keeps microseconds; round now so the stored value reads back unchanged
            created_at: Utc::now().trunc_subsecs(6),
        }
    }

    /// Stage a ticket for this order
    pub fn add_ticket(&mut self, journey_id: Uuid, cargo: i32, seat: i32) -> &Ticket {
        self.tickets.push(Ticket {
            id: Uuid::new_v4(),
            order_id: self.id,
            journey_id,
            cargo,
            seat,
        });
        &self.tickets[self.tickets.len() - 1]
    }

    pub fn journey_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.tickets.iter().map(|t| t.journey_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// A single seat reservation, unique per `(cargo, seat, journey)`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ticket {
    pub id: Uuid,
    pub order_id: Uuid,
    pub journey_id: Uuid,
    pub cargo: i32,
    pub seat: i32,
}

impl Ticket {
    /// Seat bounds check run by storage right before the row is written
    pub fn full_clean(&self, train: &Train) -> Result<(), TicketValidationError> {
        validate_ticket(self.cargo, self.seat, train)
    }

    pub fn seat_key(&self) -> (Uuid, i32, i32) {
        (self.journey_id, self.cargo, self.seat)
    }
}

/// One requested seat, as submitted by a client
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TicketRequest {
    pub journey: Uuid,
    pub cargo: i32,
    pub seat: i32,
}
