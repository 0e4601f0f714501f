use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use railway_core::filter::{parse_id_list, RouteFilter};
use railway_core::models::{Crew, Route, RouteDetail, RouteListing, Station, Train, TrainListing, TrainType};
use railway_core::{CrewChanges, RouteChanges, StationChanges, TrainChanges, TrainTypeChanges};

use crate::error::AppError;
use crate::extract::JsonBody;
use crate::middleware::AdminUser;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateStationRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RouteQuery {
    pub source: Option<String>,
    pub destination: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRouteRequest {
    pub source: Uuid,
    pub destination: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CreateTrainTypeRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTrainRequest {
    pub name: String,
    pub cargo_num: i32,
    pub places_in_cargo: i32,
    pub train_type: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrainDetail {
    pub id: Uuid,
    pub name: String,
    pub cargo_num: i32,
    pub places_in_cargo: i32,
    pub train_type: TrainType,
}

#[derive(Debug, Deserialize)]
pub struct CreateCrewRequest {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CrewResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
}

impl From<Crew> for CrewResponse {
    fn from(crew: Crew) -> Self {
        Self {
            full_name: crew.full_name(),
            id: crew.id,
            first_name: crew.first_name,
            last_name: crew.last_name,
        }
    }
}

// A PUT body carries every field, so it replaces them all
impl From<CreateStationRequest> for StationChanges {
    fn from(req: CreateStationRequest) -> Self {
        Self { name: Some(req.name) }
    }
}

impl From<CreateRouteRequest> for RouteChanges {
    fn from(req: CreateRouteRequest) -> Self {
        Self { source: Some(req.source), destination: Some(req.destination) }
    }
}

impl From<CreateTrainTypeRequest> for TrainTypeChanges {
    fn from(req: CreateTrainTypeRequest) -> Self {
        Self { name: Some(req.name) }
    }
}

impl From<CreateTrainRequest> for TrainChanges {
    fn from(req: CreateTrainRequest) -> Self {
        Self {
            name: Some(req.name),
            cargo_num: Some(req.cargo_num),
            places_in_cargo: Some(req.places_in_cargo),
            train_type: Some(req.train_type),
        }
    }
}

impl From<CreateCrewRequest> for CrewChanges {
    fn from(req: CreateCrewRequest) -> Self {
        Self { first_name: Some(req.first_name), last_name: Some(req.last_name) }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stations", get(list_stations).post(create_station))
        .route(
            "/stations/{id}",
            get(get_station).put(replace_station).patch(update_station).delete(delete_station),
        )
        .route("/routes", get(list_routes).post(create_route))
        .route("/routes/{id}", get(get_route).put(replace_route).patch(update_route).delete(delete_route))
        .route("/train-types", get(list_train_types).post(create_train_type))
        .route(
            "/train-types/{id}",
            get(get_train_type).put(replace_train_type).patch(update_train_type).delete(delete_train_type),
        )
        .route("/trains", get(list_trains).post(create_train))
        .route("/trains/{id}", get(get_train).put(replace_train).patch(update_train).delete(delete_train))
        .route("/crew", get(list_crew).post(create_crew))
        .route("/crew/{id}", get(get_crew).put(replace_crew).patch(update_crew).delete(delete_crew))
}

fn not_found(entity: &str, id: Uuid) -> AppError {
    AppError::NotFoundError(format!("{} not found: {}", entity, id))
}

fn deleted(entity: &str, id: Uuid, existed: bool) -> Result<StatusCode, AppError> {
    if !existed {
        return Err(not_found(entity, id));
    }
    tracing::info!("Deleted {} {}", entity, id);
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Stations
// ============================================================================

pub async fn list_stations(State(state): State<AppState>) -> Result<Json<Vec<Station>>, AppError> {
    Ok(Json(state.catalog.repo().list_stations().await?))
}

/// POST /stations (admin)
/// Coordinates are looked up once here and stored
pub async fn create_station(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    JsonBody(req): JsonBody<CreateStationRequest>,
) -> Result<(StatusCode, Json<Station>), AppError> {
    let station = state.catalog.create_station(&req.name).await?;
    Ok((StatusCode::CREATED, Json(station)))
}

pub async fn get_station(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Station>, AppError> {
    state.catalog.repo().get_station(id).await?.map(Json).ok_or_else(|| not_found("station", id))
}

/// PUT /stations/{id} (admin)
pub async fn replace_station(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    JsonBody(req): JsonBody<CreateStationRequest>,
) -> Result<Json<Station>, AppError> {
    Ok(Json(state.catalog.update_station(id, req.into()).await?))
}

/// PATCH /stations/{id} (admin)
/// A new name is geocoded again
pub async fn update_station(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    JsonBody(changes): JsonBody<StationChanges>,
) -> Result<Json<Station>, AppError> {
    Ok(Json(state.catalog.update_station(id, changes).await?))
}

pub async fn delete_station(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    deleted("station", id, state.catalog.repo().delete_station(id).await?)
}

// ============================================================================
// Routes
// ============================================================================

/// GET /routes?source=<ids>&destination=<ids>
pub async fn list_routes(
    State(state): State<AppState>,
    Query(query): Query<RouteQuery>,
) -> Result<Json<Vec<RouteListing>>, AppError> {
    let ids = |field: &str, value: Option<String>| -> Result<Vec<Uuid>, AppError> {
        value
            .as_deref()
            .map(parse_id_list)
            .transpose()
            .map(Option::unwrap_or_default)
            .map_err(|_| AppError::invalid_field(field, "Expected a comma separated list of UUIDs."))
    };

    let filter = RouteFilter {
        source: ids("source", query.source)?,
        destination: ids("destination", query.destination)?,
    };
    Ok(Json(state.catalog.repo().list_routes(&filter).await?))
}

pub async fn create_route(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    JsonBody(req): JsonBody<CreateRouteRequest>,
) -> Result<(StatusCode, Json<Route>), AppError> {
    let route = state.catalog.create_route(req.source, req.destination).await?;
    Ok((StatusCode::CREATED, Json(route)))
}

pub async fn get_route(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<RouteDetail>, AppError> {
    state.catalog.repo().get_route(id).await?.map(Json).ok_or_else(|| not_found("route", id))
}

pub async fn replace_route(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    JsonBody(req): JsonBody<CreateRouteRequest>,
) -> Result<Json<Route>, AppError> {
    Ok(Json(state.catalog.update_route(id, req.into()).await?))
}

pub async fn update_route(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    JsonBody(changes): JsonBody<RouteChanges>,
) -> Result<Json<Route>, AppError> {
    Ok(Json(state.catalog.update_route(id, changes).await?))
}

pub async fn delete_route(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    deleted("route", id, state.catalog.repo().delete_route(id).await?)
}

// ============================================================================
// Train types & trains
// ============================================================================

pub async fn list_train_types(State(state): State<AppState>) -> Result<Json<Vec<TrainType>>, AppError> {
    Ok(Json(state.catalog.repo().list_train_types().await?))
}

pub async fn create_train_type(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    JsonBody(req): JsonBody<CreateTrainTypeRequest>,
) -> Result<(StatusCode, Json<TrainType>), AppError> {
    let train_type = state.catalog.create_train_type(&req.name).await?;
    Ok((StatusCode::CREATED, Json(train_type)))
}

pub async fn get_train_type(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TrainType>, AppError> {
    state.catalog.repo().get_train_type(id).await?.map(Json).ok_or_else(|| not_found("train type", id))
}

pub async fn replace_train_type(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    JsonBody(req): JsonBody<CreateTrainTypeRequest>,
) -> Result<Json<TrainType>, AppError> {
    Ok(Json(state.catalog.update_train_type(id, req.into()).await?))
}

pub async fn update_train_type(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    JsonBody(changes): JsonBody<TrainTypeChanges>,
) -> Result<Json<TrainType>, AppError> {
    Ok(Json(state.catalog.update_train_type(id, changes).await?))
}

pub async fn delete_train_type(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    deleted("train type", id, state.catalog.repo().delete_train_type(id).await?)
}

pub async fn list_trains(State(state): State<AppState>) -> Result<Json<Vec<TrainListing>>, AppError> {
    Ok(Json(state.catalog.repo().list_trains().await?))
}

pub async fn create_train(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    JsonBody(req): JsonBody<CreateTrainRequest>,
) -> Result<(StatusCode, Json<TrainListing>), AppError> {
    let train = state
        .catalog
        .create_train(&req.name, req.cargo_num, req.places_in_cargo, req.train_type)
        .await?;
    Ok((StatusCode::CREATED, Json(train_listing(&state, train).await?)))
}

pub async fn replace_train(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    JsonBody(req): JsonBody<CreateTrainRequest>,
) -> Result<Json<TrainListing>, AppError> {
    let train = state.catalog.update_train(id, req.into()).await?;
    Ok(Json(train_listing(&state, train).await?))
}

/// PATCH /trains/{id} (admin)
/// The layout may shrink below tickets already sold; those tickets are kept
pub async fn update_train(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    JsonBody(changes): JsonBody<TrainChanges>,
) -> Result<Json<TrainListing>, AppError> {
    let train = state.catalog.update_train(id, changes).await?;
    Ok(Json(train_listing(&state, train).await?))
}

async fn train_listing(state: &AppState, train: Train) -> Result<TrainListing, AppError> {
    let train_type = state
        .catalog
        .repo()
        .get_train_type(train.train_type_id)
        .await?
        .ok_or_else(|| not_found("train type", train.train_type_id))?;

    Ok(TrainListing {
        id: train.id,
        name: train.name,
        cargo_num: train.cargo_num,
        places_in_cargo: train.places_in_cargo,
        train_type: train_type.name,
    })
}

/// GET /trains/{id}
/// Nests the full train type, unlike the list view
pub async fn get_train(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<TrainDetail>, AppError> {
    let repo = state.catalog.repo();
    let train = repo.get_train(id).await?.ok_or_else(|| not_found("train", id))?;
    let train_type = repo
        .get_train_type(train.train_type_id)
        .await?
        .ok_or_else(|| not_found("train type", train.train_type_id))?;

    Ok(Json(TrainDetail {
        id: train.id,
        name: train.name,
        cargo_num: train.cargo_num,
        places_in_cargo: train.places_in_cargo,
        train_type,
    }))
}

pub async fn delete_train(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    deleted("train", id, state.catalog.repo().delete_train(id).await?)
}

// ============================================================================
// Crew
// ============================================================================

pub async fn list_crew(State(state): State<AppState>) -> Result<Json<Vec<CrewResponse>>, AppError> {
    let crew = state.catalog.repo().list_crew().await?;
    Ok(Json(crew.into_iter().map(CrewResponse::from).collect()))
}

pub async fn create_crew(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    JsonBody(req): JsonBody<CreateCrewRequest>,
) -> Result<(StatusCode, Json<CrewResponse>), AppError> {
    let crew = state.catalog.create_crew(&req.first_name, &req.last_name).await?;
    Ok((StatusCode::CREATED, Json(crew.into())))
}

pub async fn get_crew(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<CrewResponse>, AppError> {
    let crew = state.catalog.repo().get_crew(id).await?.ok_or_else(|| not_found("crew", id))?;
    Ok(Json(crew.into()))
}

pub async fn replace_crew(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    JsonBody(req): JsonBody<CreateCrewRequest>,
) -> Result<Json<CrewResponse>, AppError> {
    Ok(Json(state.catalog.update_crew(id, req.into()).await?.into()))
}

pub async fn update_crew(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    JsonBody(changes): JsonBody<CrewChanges>,
) -> Result<Json<CrewResponse>, AppError> {
    Ok(Json(state.catalog.update_crew(id, changes).await?.into()))
}

pub async fn delete_crew(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    deleted("crew", id, state.catalog.repo().delete_crew(id).await?)
}
