use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use crate::availability::{availability, Availability};
use crate::distance::distance_km;
use crate::geocoding::{Coordinates, Geocoder};
use crate::models::{Crew, Journey, JourneyDetail, Route, Station, Train, TrainType};
use crate::repository::CatalogRepository;
use crate::{CoreError, CoreResult, FieldError};

/// Partial update of a station. `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StationChanges {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteChanges {
    pub source: Option<Uuid>,
    pub destination: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrainTypeChanges {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrainChanges {
    pub name: Option<String>,
    pub cargo_num: Option<i32>,
    pub places_in_cargo: Option<i32>,
    pub train_type: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrewChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JourneyChanges {
    pub route: Option<Uuid>,
    pub train: Option<Uuid>,
    pub crew: Option<Vec<Uuid>>,
    pub departure_time: Option<DateTime<Utc>>,
    pub arrival_time: Option<DateTime<Utc>>,
}

/// Write side of the network catalog.
///
/// Derived values (station coordinates, route distance) are computed here
/// whenever their inputs change, and stored with the record.
#[derive(Clone)]
pub struct Catalog {
    repo: Arc<dyn CatalogRepository>,
    geocoder: Arc<dyn Geocoder>,
}

impl Catalog {
    pub fn new(repo: Arc<dyn CatalogRepository>, geocoder: Arc<dyn Geocoder>) -> Self {
        Self { repo, geocoder }
    }

    pub fn repo(&self) -> &Arc<dyn CatalogRepository> {
        &self.repo
    }

    pub async fn create_station(&self, name: &str) -> CoreResult<Station> {
        let name = required("name", name)?;
        let coords = self.geocoder.lookup(&name).await?;

        let station = Station {
            id: Uuid::new_v4(),
            name,
            latitude: coords.latitude,
            longitude: coords.longitude,
        };
        self.repo.insert_station(&station).await?;

        tracing::info!("Station created: {} ({})", station.name, station.id);
        Ok(station)
    }

    /// Renaming a station looks its coordinates up again. Routes keep the
    /// distance they were created with until their endpoints change.
    pub async fn update_station(&self, id: Uuid, changes: StationChanges) -> CoreResult<Station> {
        let mut station = self
            .repo
            .get_station(id)
            .await?
            .ok_or(CoreError::NotFound { entity: "station", id })?;

        if let Some(name) = changes.name {
            let name = required("name", &name)?;
            if name != station.name {
                let coords = self.geocoder.lookup(&name).await?;
                station.name = name;
                station.latitude = coords.latitude;
                station.longitude = coords.longitude;
            }
        }

        stored(self.repo.update_station(&station).await?, "station", id)?;
        tracing::info!("Station updated: {} ({})", station.name, station.id);
        Ok(station)
    }

    pub async fn create_route(&self, source_id: Uuid, destination_id: Uuid) -> CoreResult<Route> {
        let route = Route {
            id: Uuid::new_v4(),
            source_id,
            destination_id,
            distance: self.route_distance(source_id, destination_id).await?,
        };
        self.repo.insert_route(&route).await?;
        Ok(route)
    }

    pub async fn update_route(&self, id: Uuid, changes: RouteChanges) -> CoreResult<Route> {
        let current = self
            .repo
            .get_route(id)
            .await?
            .ok_or(CoreError::NotFound { entity: "route", id })?;

        let source_id = changes.source.unwrap_or(current.source.id);
        let destination_id = changes.destination.unwrap_or(current.destination.id);

        let route = Route {
            id,
            source_id,
            destination_id,
            distance: self.route_distance(source_id, destination_id).await?,
        };
        stored(self.repo.update_route(&route).await?, "route", id)?;
        Ok(route)
    }

    pub async fn create_train_type(&self, name: &str) -> CoreResult<TrainType> {
        let train_type = TrainType {
            id: Uuid::new_v4(),
            name: required("name", name)?,
        };
        self.repo.insert_train_type(&train_type).await?;
        Ok(train_type)
    }

    pub async fn update_train_type(&self, id: Uuid, changes: TrainTypeChanges) -> CoreResult<TrainType> {
        let mut train_type = self
            .repo
            .get_train_type(id)
            .await?
            .ok_or(CoreError::NotFound { entity: "train type", id })?;

        if let Some(name) = changes.name {
            train_type.name = required("name", &name)?;
        }

        stored(self.repo.update_train_type(&train_type).await?, "train type", id)?;
        Ok(train_type)
    }

    pub async fn create_train(
        &self,
        name: &str,
        cargo_num: i32,
        places_in_cargo: i32,
        train_type_id: Uuid,
    ) -> CoreResult<Train> {
        let train = Train {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            cargo_num,
            places_in_cargo,
            train_type_id,
        };
        self.check_train(&train).await?;
        self.repo.insert_train(&train).await?;
        Ok(train)
    }

    /// A train's layout may shrink below tickets already sold. Those tickets
    /// stay valid, and availability for their journeys goes negative.
    pub async fn update_train(&self, id: Uuid, changes: TrainChanges) -> CoreResult<Train> {
        let mut train = self
            .repo
            .get_train(id)
            .await?
            .ok_or(CoreError::NotFound { entity: "train", id })?;

        if let Some(name) = changes.name {
            train.name = name.trim().to_string();
        }
        train.cargo_num = changes.cargo_num.unwrap_or(train.cargo_num);
        train.places_in_cargo = changes.places_in_cargo.unwrap_or(train.places_in_cargo);
        train.train_type_id = changes.train_type.unwrap_or(train.train_type_id);
        self.check_train(&train).await?;

        stored(self.repo.update_train(&train).await?, "train", id)?;
        tracing::info!(
            "Train {} reconfigured: {} cargos x {} places",
            train.id,
            train.cargo_num,
            train.places_in_cargo
        );
        Ok(train)
    }

    pub async fn create_crew(&self, first_name: &str, last_name: &str) -> CoreResult<Crew> {
        let crew = Crew {
            id: Uuid::new_v4(),
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
        };
        check_crew(&crew)?;
        self.repo.insert_crew(&crew).await?;
        Ok(crew)
    }

    pub async fn update_crew(&self, id: Uuid, changes: CrewChanges) -> CoreResult<Crew> {
        let mut crew = self
            .repo
            .get_crew(id)
            .await?
            .ok_or(CoreError::NotFound { entity: "crew", id })?;

        if let Some(first_name) = changes.first_name {
            crew.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = changes.last_name {
            crew.last_name = last_name.trim().to_string();
        }
        check_crew(&crew)?;

        stored(self.repo.update_crew(&crew).await?, "crew", id)?;
        Ok(crew)
    }

    /// Journeys must arrive after they depart and reference existing route, train and crew.
    pub async fn create_journey(
        &self,
        route_id: Uuid,
        train_id: Uuid,
        crew_ids: Vec<Uuid>,
        departure_time: DateTime<Utc>,
        arrival_time: DateTime<Utc>,
    ) -> CoreResult<Journey> {
        let mut journey = Journey {
            id: Uuid::new_v4(),
            route_id,
            train_id,
            crew_ids,
            departure_time,
            arrival_time,
        };
        self.check_journey(&mut journey).await?;
        self.repo.insert_journey(&journey).await?;
        Ok(journey)
    }

    pub async fn update_journey(&self, id: Uuid, changes: JourneyChanges) -> CoreResult<Journey> {
        let mut journey = self
            .repo
            .get_journey(id)
            .await?
            .ok_or(CoreError::NotFound { entity: "journey", id })?;

        journey.route_id = changes.route.unwrap_or(journey.route_id);
        journey.train_id = changes.train.unwrap_or(journey.train_id);
        if let Some(crew_ids) = changes.crew {
            journey.crew_ids = crew_ids;
        }
        journey.departure_time = changes.departure_time.unwrap_or(journey.departure_time);
        journey.arrival_time = changes.arrival_time.unwrap_or(journey.arrival_time);
        self.check_journey(&mut journey).await?;

        stored(self.repo.update_journey(&journey).await?, "journey", id)?;
        Ok(journey)
    }

    /// Journey detail together with its seat availability, computed at call time.
    pub async fn journey_availability(&self, journey_id: Uuid) -> CoreResult<(JourneyDetail, Availability)> {
        let detail = self
            .repo
            .get_journey_detail(journey_id)
            .await?
            .ok_or(CoreError::NotFound { entity: "journey", id: journey_id })?;

        let sold = self.repo.sold_by_cargo(journey_id).await?;
        let free = availability(&detail.train, &sold);

        Ok((detail, free))
    }

    async fn route_distance(&self, source_id: Uuid, destination_id: Uuid) -> CoreResult<i32> {
        let source = self.repo.get_station(source_id).await?;
        let destination = self.repo.get_station(destination_id).await?;

        let mut errors = Vec::new();
        if source.is_none() {
            errors.push(missing_reference("source", source_id));
        }
        if destination.is_none() {
            errors.push(missing_reference("destination", destination_id));
        }
        let (Some(source), Some(destination)) = (source, destination) else {
            return Err(CoreError::ValidationError(errors));
        };

        Ok(distance_km(coordinates(&source), coordinates(&destination)))
    }

    async fn check_train(&self, train: &Train) -> CoreResult<()> {
        let mut errors = Vec::new();
        if train.name.is_empty() {
            errors.push(FieldError::new("name", "This field may not be blank."));
        }
        if train.cargo_num < 1 {
            errors.push(FieldError::new("cargo_num", "Ensure this value is greater than or equal to 1."));
        }
        if train.places_in_cargo < 1 {
            errors.push(FieldError::new("places_in_cargo", "Ensure this value is greater than or equal to 1."));
        }
        if self.repo.get_train_type(train.train_type_id).await?.is_none() {
            errors.push(missing_reference("train_type", train.train_type_id));
        }
        rejected(errors)
    }

    /// Also normalizes the crew list: sorted, without duplicates.
    async fn check_journey(&self, journey: &mut Journey) -> CoreResult<()> {
        let mut errors = Vec::new();

        if self.repo.get_route(journey.route_id).await?.is_none() {
            errors.push(missing_reference("route", journey.route_id));
        }
        if self.repo.get_train(journey.train_id).await?.is_none() {
            errors.push(missing_reference("train", journey.train_id));
        }
        for crew_id in &journey.crew_ids {
            if self.repo.get_crew(*crew_id).await?.is_none() {
                errors.push(missing_reference("crew", *crew_id));
            }
        }
        if journey.arrival_time <= journey.departure_time {
            errors.push(FieldError::new("arrival_time", "Arrival time must be after departure time."));
        }
        rejected(errors)?;

        journey.crew_ids.sort();
        journey.crew_ids.dedup();
        Ok(())
    }
}

fn check_crew(crew: &Crew) -> CoreResult<()> {
    let errors = [("first_name", &crew.first_name), ("last_name", &crew.last_name)]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(field, _)| FieldError::new(field, "This field may not be blank."))
        .collect();
    rejected(errors)
}

fn rejected(errors: Vec<FieldError>) -> CoreResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(CoreError::ValidationError(errors))
    }
}

// The row can vanish between the read and the write
fn stored(found: bool, entity: &'static str, id: Uuid) -> CoreResult<()> {
    if found {
        Ok(())
    } else {
        Err(CoreError::NotFound { entity, id })
    }
}

fn coordinates(station: &Station) -> Coordinates {
    Coordinates {
        latitude: station.latitude,
        longitude: station.longitude,
    }
}

fn required(field: &str, value: &str) -> CoreResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CoreError::ValidationError(vec![FieldError::new(field, "This field may not be blank.")]));
    }
    Ok(value.to_string())
}

fn missing_reference(field: &str, id: Uuid) -> FieldError {
    FieldError::new(field, format!("Invalid pk \"{}\" - object does not exist.", id))
}
