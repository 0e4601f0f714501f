use std::collections::HashMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use railway_core::models::Train;
use railway_core::repository::{StoreError, StoreResult};
use railway_order::{Order, OrderRepository, Ticket};
use crate::catalog_repo::TrainRow;
use crate::database::{backend, Violation};

pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn tickets_for(&self, order_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Vec<Ticket>>> {
        let rows = sqlx::query_as::<_, TicketRow>(
            "SELECT id, order_id, journey_id, cargo, seat FROM tickets WHERE order_id = ANY($1) ORDER BY order_id, position",
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut by_order: HashMap<Uuid, Vec<Ticket>> = HashMap::new();
        for row in rows {
            by_order.entry(row.order_id).or_default().push(row.into());
        }
        Ok(by_order)
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: Uuid,
    order_id: Uuid,
    journey_id: Uuid,
    cargo: i32,
    seat: i32,
}

impl From<TicketRow> for Ticket {
    fn from(row: TicketRow) -> Self {
        Ticket {
            id: row.id,
            order_id: row.order_id,
            journey_id: row.journey_id,
            cargo: row.cargo,
            seat: row.seat,
        }
    }
}

/// What a constraint violation on a ticket insert means for that ticket
fn ticket_conflict(violation: &Violation, index: usize, ticket: &Ticket) -> StoreError {
    match violation {
        Violation::Unique => StoreError::SeatTaken {
            index,
            journey_id: ticket.journey_id,
            cargo: ticket.cargo,
            seat: ticket.seat,
        },
        // Journey deleted between the train lookup and the insert
        Violation::ForeignKey(_) => StoreError::JourneyMissing { index, journey_id: ticket.journey_id },
    }
}

fn ticket_insert_error(err: sqlx::Error, index: usize, ticket: &Ticket) -> StoreError {
    match Violation::of(&err) {
        Some(violation) => ticket_conflict(&violation, index, ticket),
        None => backend(err),
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create_order(&self, order: &Order) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query("INSERT INTO orders (id, user_id, created_at) VALUES ($1, $2, $3)")
            .bind(order.id)
            .bind(&order.user_id)
            .bind(order.created_at)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        // Any early return drops `tx`, which rolls everything back
        for (index, ticket) in order.tickets.iter().enumerate() {
            let train: Train = sqlx::query_as::<_, TrainRow>(
                r#"
                SELECT t.id, t.name, t.cargo_num, t.places_in_cargo, t.train_type_id
                FROM journeys j
                JOIN trains t ON t.id = j.train_id
                WHERE j.id = $1
                "#,
            )
            .bind(ticket.journey_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend)?
            .ok_or(StoreError::JourneyMissing { index, journey_id: ticket.journey_id })?
            .into();

            ticket
                .full_clean(&train)
                .map_err(|source| StoreError::InvalidTicket { index, source })?;

            sqlx::query(
                "INSERT INTO tickets (id, order_id, journey_id, cargo, seat, position) VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(ticket.id)
            .bind(order.id)
            .bind(ticket.journey_id)
            .bind(ticket.cargo)
            .bind(ticket.seat)
            .bind(index as i32)
            .execute(&mut *tx)
            .await
            .map_err(|e| ticket_insert_error(e, index, ticket))?;
        }

        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let Some(row) = sqlx::query_as::<_, OrderRow>("SELECT id, user_id, created_at FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
        else {
            return Ok(None);
        };

        let mut tickets = self.tickets_for(&[row.id]).await?;

        Ok(Some(Order {
            id: row.id,
            user_id: row.user_id,
            tickets: tickets.remove(&row.id).unwrap_or_default(),
            created_at: row.created_at,
        }))
    }

    async fn list_orders(&self, user_id: &str) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT id, user_id, created_at FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut tickets = self.tickets_for(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| Order {
                tickets: tickets.remove(&row.id).unwrap_or_default(),
                id: row.id,
                user_id: row.user_id,
                created_at: row.created_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(cargo: i32, seat: i32) -> Ticket {
        let mut order = Order::new("user-1");
        order.add_ticket(Uuid::new_v4(), cargo, seat).clone()
    }

    #[test]
    fn test_unique_violation_is_seat_taken() {
        let ticket = ticket(1, 3);
        let violation = Violation::from_code(Some("23505"), Some("tickets_journey_cargo_seat_key")).unwrap();

        let err = ticket_conflict(&violation, 2, &ticket);
        assert!(matches!(
            err,
            StoreError::SeatTaken { index: 2, journey_id, cargo: 1, seat: 3 } if journey_id == ticket.journey_id
        ));
    }

    #[test]
    fn test_foreign_key_violation_is_missing_journey() {
        let ticket = ticket(2, 1);
        let violation = Violation::from_code(Some("23503"), Some("tickets_journey_id_fkey")).unwrap();

        let err = ticket_conflict(&violation, 0, &ticket);
        assert!(matches!(err, StoreError::JourneyMissing { index: 0, journey_id } if journey_id == ticket.journey_id));
    }

    #[test]
    fn test_unrelated_failure_is_backend_error() {
        let err = ticket_insert_error(sqlx::Error::RowNotFound, 0, &ticket(1, 1));
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
