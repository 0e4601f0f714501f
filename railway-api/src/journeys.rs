use std::collections::BTreeMap;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use railway_core::availability::total_free;
use railway_core::filter::{JourneyFilter, TimeWindow};
use railway_core::models::{Journey, JourneyListing, RouteDetail, TrainType};
use railway_core::JourneyChanges;

use crate::error::AppError;
use crate::extract::JsonBody;
use crate::middleware::AdminUser;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct JourneyQuery {
    pub route: Option<String>,
    pub departure_time: Option<String>,
    pub arrival_time: Option<String>,
}

impl JourneyQuery {
    fn into_filter(self) -> Result<JourneyFilter, AppError> {
        let route = self
            .route
            .map(|value| {
                Uuid::parse_str(value.trim()).map_err(|_| AppError::invalid_field("route", "Must be a valid UUID."))
            })
            .transpose()?;

        Ok(JourneyFilter {
            route,
            departure: time_window("departure_time", self.departure_time)?,
            arrival: time_window("arrival_time", self.arrival_time)?,
            ids: None,
        })
    }
}

fn time_window(field: &str, value: Option<String>) -> Result<Option<TimeWindow>, AppError> {
    match value {
        None => Ok(None),
        Some(value) => TimeWindow::parse(&value)
            .map(Some)
            .ok_or_else(|| AppError::invalid_field(field, "Expected YYYY-MM-DD or YYYY-MM-DD HH:MM.")),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateJourneyRequest {
    pub route: Uuid,
    pub train: Uuid,
    #[serde(default)]
    pub crew: Vec<Uuid>,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
}

impl From<CreateJourneyRequest> for JourneyChanges {
    fn from(req: CreateJourneyRequest) -> Self {
        Self {
            route: Some(req.route),
            train: Some(req.train),
            crew: Some(req.crew),
            departure_time: Some(req.departure_time),
            arrival_time: Some(req.arrival_time),
        }
    }
}

/// Journey as listed, also embedded in order tickets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneySummary {
    pub id: Uuid,
    pub route_source: String,
    pub route_destination: String,
    pub train: String,
    pub tickets_available: i64,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
}

impl From<JourneyListing> for JourneySummary {
    fn from(listing: JourneyListing) -> Self {
        Self {
            id: listing.journey.id,
            tickets_available: total_free(&listing.train, listing.tickets_sold),
            route_source: listing.route_source,
            route_destination: listing.route_destination,
            train: listing.train.name,
            departure_time: listing.journey.departure_time,
            arrival_time: listing.journey.arrival_time,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JourneyTrain {
    pub id: Uuid,
    pub name: String,
    pub cargo_num: i32,
    pub places_in_cargo: i32,
    pub train_type: TrainType,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JourneyDetailResponse {
    pub id: Uuid,
    pub route: RouteDetail,
    pub train: JourneyTrain,
    pub crew: Vec<String>,
    pub tickets_available: i64,
    pub tickets_available_by_cargo: BTreeMap<i32, i64>,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/journeys", get(list_journeys).post(create_journey))
        .route(
            "/journeys/{id}",
            get(get_journey).put(replace_journey).patch(update_journey).delete(delete_journey),
        )
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /journeys?route=&departure_time=&arrival_time=
pub async fn list_journeys(
    State(state): State<AppState>,
    Query(query): Query<JourneyQuery>,
) -> Result<Json<Vec<JourneySummary>>, AppError> {
    let filter = query.into_filter()?;
    let journeys = state.catalog.repo().list_journeys(&filter).await?;
    Ok(Json(journeys.into_iter().map(JourneySummary::from).collect()))
}

/// GET /journeys/{id}
/// Detail with seat availability as of this request
pub async fn get_journey(
    State(state): State<AppState>,
    Path(journey_id): Path<Uuid>,
) -> Result<Json<JourneyDetailResponse>, AppError> {
    let (detail, free) = state.catalog.journey_availability(journey_id).await?;

    Ok(Json(JourneyDetailResponse {
        id: detail.journey.id,
        route: detail.route,
        train: JourneyTrain {
            id: detail.train.id,
            name: detail.train.name,
            cargo_num: detail.train.cargo_num,
            places_in_cargo: detail.train.places_in_cargo,
            train_type: detail.train_type,
        },
        crew: detail.crew.iter().map(|c| c.full_name()).collect(),
        tickets_available: free.total_free,
        tickets_available_by_cargo: free.free_by_cargo,
        departure_time: detail.journey.departure_time,
        arrival_time: detail.journey.arrival_time,
    }))
}

/// POST /journeys (admin)
pub async fn create_journey(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    JsonBody(req): JsonBody<CreateJourneyRequest>,
) -> Result<(StatusCode, Json<Journey>), AppError> {
    let journey = state
        .catalog
        .create_journey(req.route, req.train, req.crew, req.departure_time, req.arrival_time)
        .await?;
    Ok((StatusCode::CREATED, Json(journey)))
}

/// PUT /journeys/{id} (admin)
/// An omitted crew list clears the crew
pub async fn replace_journey(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(journey_id): Path<Uuid>,
    JsonBody(req): JsonBody<CreateJourneyRequest>,
) -> Result<Json<Journey>, AppError> {
    Ok(Json(state.catalog.update_journey(journey_id, req.into()).await?))
}

/// PATCH /journeys/{id} (admin)
pub async fn update_journey(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(journey_id): Path<Uuid>,
    JsonBody(changes): JsonBody<JourneyChanges>,
) -> Result<Json<Journey>, AppError> {
    let journey = state.catalog.update_journey(journey_id, changes).await?;
    tracing::info!("Journey {} updated", journey.id);
    Ok(Json(journey))
}

/// DELETE /journeys/{id} (admin)
/// Sold tickets for the journey go with it
pub async fn delete_journey(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(journey_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.catalog.repo().delete_journey(journey_id).await? {
        return Err(AppError::NotFoundError(format!("journey not found: {}", journey_id)));
    }
    tracing::info!("Journey {} deleted", journey_id);
    Ok(StatusCode::NO_CONTENT)
}
