use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// A stop on the network. Coordinates are resolved once, when the station is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Station {
    pub id: Uuid,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Route {
    pub id: Uuid,
    pub source_id: Uuid,
    pub destination_id: Uuid,
    /// Great-circle distance in kilometres, computed at creation
    pub distance: i32,
}

/// Route with both endpoints expanded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDetail {
    pub id: Uuid,
    pub source: Station,
    pub destination: Station,
    pub distance: i32,
}

/// Route as shown in list views: endpoints by name only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteListing {
    pub id: Uuid,
    pub source: String,
    pub destination: String,
    pub distance: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainType {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Train {
    pub id: Uuid,
    pub name: String,
    pub cargo_num: i32,
    pub places_in_cargo: i32,
    pub train_type_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainListing {
    pub id: Uuid,
    pub name: String,
    pub cargo_num: i32,
    pub places_in_cargo: i32,
    pub train_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Crew {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

impl Crew {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A scheduled run of one train over one route
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Journey {
    pub id: Uuid,
    pub route_id: Uuid,
    pub train_id: Uuid,
    pub crew_ids: Vec<Uuid>,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
}

/// Journey joined with the names a list view shows, plus its sold ticket count.
#[derive(Debug, Clone)]
pub struct JourneyListing {
    pub journey: Journey,
    pub route_source: String,
    pub route_destination: String,
    pub train: Train,
    pub tickets_sold: i64,
}

/// Journey with every reference expanded
#[derive(Debug, Clone)]
pub struct JourneyDetail {
    pub journey: Journey,
    pub route: RouteDetail,
    pub train: Train,
    pub train_type: TrainType,
    pub crew: Vec<Crew>,
}
