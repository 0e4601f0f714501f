use std::collections::HashMap;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use railway_core::filter::JourneyFilter;
use railway_order::{Order, TicketRequest};

use crate::error::AppError;
use crate::extract::JsonBody;
use crate::journeys::JourneySummary;
use crate::middleware::UserClaims;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub tickets: Vec<TicketRequest>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TicketResponse {
    pub id: Uuid,
    pub cargo: i32,
    pub seat: i32,
    pub journey: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub tickets: Vec<TicketResponse>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            created_at: order.created_at,
            tickets: order
                .tickets
                .into_iter()
                .map(|t| TicketResponse { id: t.id, cargo: t.cargo, seat: t.seat, journey: t.journey_id })
                .collect(),
        }
    }
}

/// Ticket as shown when reading orders back, with its journey expanded
#[derive(Debug, Serialize, Deserialize)]
pub struct TicketDetail {
    pub id: Uuid,
    pub cargo: i32,
    pub seat: i32,
    pub journey: JourneySummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderDetail {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub tickets: Vec<TicketDetail>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/{id}", get(get_order))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /orders
pub async fn create_order(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    JsonBody(req): JsonBody<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    let order = state.orders.create_order(&claims.sub, &req.tickets).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /orders
/// The caller's orders, newest first
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Json<Vec<OrderDetail>>, AppError> {
    let orders = state.orders.list_orders(&claims.sub).await?;
    Ok(Json(expand(&state, orders).await?))
}

/// GET /orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderDetail>, AppError> {
    let order = state.orders.get_order(&claims.sub, order_id).await?;
    let mut expanded = expand(&state, vec![order]).await?;
    expanded
        .pop()
        .map(Json)
        .ok_or_else(|| AppError::NotFoundError(format!("Order not found: {}", order_id)))
}

/// Attach a journey summary to every ticket, loading each journey once
async fn expand(state: &AppState, orders: Vec<Order>) -> Result<Vec<OrderDetail>, AppError> {
    let mut ids: Vec<Uuid> = orders.iter().flat_map(Order::journey_ids).collect();
    ids.sort();
    ids.dedup();

    let mut journeys: HashMap<Uuid, JourneySummary> = HashMap::new();
    if !ids.is_empty() {
        let filter = JourneyFilter { ids: Some(ids), ..Default::default() };
        for listing in state.catalog.repo().list_journeys(&filter).await? {
            journeys.insert(listing.journey.id, listing.into());
        }
    }

    Ok(orders
        .into_iter()
        .map(|order| OrderDetail {
            id: order.id,
            created_at: order.created_at,
            tickets: order
                .tickets
                .into_iter()
                .filter_map(|t| {
                    let journey = journeys.get(&t.journey_id)?.clone();
                    Some(TicketDetail { id: t.id, cargo: t.cargo, seat: t.seat, journey })
                })
                .collect(),
        })
        .collect())
}
