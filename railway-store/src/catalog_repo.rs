use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use railway_core::filter::{JourneyFilter, RouteFilter};
use railway_core::models::{
    Crew, Journey, JourneyDetail, JourneyListing, Route, RouteDetail, RouteListing, Station, Train,
    TrainListing, TrainType,
};
use railway_core::repository::{CatalogRepository, StoreResult};
use crate::database::{backend, reference_error, Reference};

pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn journey_crew(conn: &mut sqlx::PgConnection, journey: &Journey) -> StoreResult<()> {
        for crew_id in &journey.crew_ids {
            sqlx::query("INSERT INTO journey_crew (journey_id, crew_id) VALUES ($1, $2)")
                .bind(journey.id)
                .bind(crew_id)
                .execute(&mut *conn)
                .await
                .map_err(|e| reference_error(e, &[("journey_crew_crew_id_fkey", "crew", *crew_id)]))?;
        }
        Ok(())
    }

    async fn delete_by_id(&self, table: &str, id: Uuid) -> StoreResult<bool> {
        // `table` is always one of our own literals
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", table))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct StationRow {
    id: Uuid,
    name: String,
    latitude: f64,
    longitude: f64,
}

impl From<StationRow> for Station {
    fn from(row: StationRow) -> Self {
        Station { id: row.id, name: row.name, latitude: row.latitude, longitude: row.longitude }
    }
}

#[derive(sqlx::FromRow)]
struct RouteDetailRow {
    id: Uuid,
    distance: i32,
    source_id: Uuid,
    source_name: String,
    source_latitude: f64,
    source_longitude: f64,
    destination_id: Uuid,
    destination_name: String,
    destination_latitude: f64,
    destination_longitude: f64,
}

impl From<RouteDetailRow> for RouteDetail {
    fn from(row: RouteDetailRow) -> Self {
        RouteDetail {
            id: row.id,
            source: Station {
                id: row.source_id,
                name: row.source_name,
                latitude: row.source_latitude,
                longitude: row.source_longitude,
            },
            destination: Station {
                id: row.destination_id,
                name: row.destination_name,
                latitude: row.destination_latitude,
                longitude: row.destination_longitude,
            },
            distance: row.distance,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RouteListingRow {
    id: Uuid,
    source: String,
    destination: String,
    distance: i32,
}

#[derive(sqlx::FromRow)]
pub(crate) struct TrainRow {
    id: Uuid,
    name: String,
    cargo_num: i32,
    places_in_cargo: i32,
    train_type_id: Uuid,
}

impl From<TrainRow> for Train {
    fn from(row: TrainRow) -> Self {
        Train {
            id: row.id,
            name: row.name,
            cargo_num: row.cargo_num,
            places_in_cargo: row.places_in_cargo,
            train_type_id: row.train_type_id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TrainListingRow {
    id: Uuid,
    name: String,
    cargo_num: i32,
    places_in_cargo: i32,
    train_type: String,
}

#[derive(sqlx::FromRow)]
struct CrewRow {
    id: Uuid,
    first_name: String,
    last_name: String,
}

impl From<CrewRow> for Crew {
    fn from(row: CrewRow) -> Self {
        Crew { id: row.id, first_name: row.first_name, last_name: row.last_name }
    }
}

#[derive(sqlx::FromRow)]
struct JourneyRow {
    id: Uuid,
    route_id: Uuid,
    train_id: Uuid,
    crew_ids: Vec<Uuid>,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
}

impl From<JourneyRow> for Journey {
    fn from(row: JourneyRow) -> Self {
        Journey {
            id: row.id,
            route_id: row.route_id,
            train_id: row.train_id,
            crew_ids: row.crew_ids,
            departure_time: row.departure_time,
            arrival_time: row.arrival_time,
        }
    }
}

#[derive(sqlx::FromRow)]
struct JourneyListingRow {
    id: Uuid,
    route_id: Uuid,
    train_id: Uuid,
    crew_ids: Vec<Uuid>,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
    route_source: String,
    route_destination: String,
    train_name: String,
    cargo_num: i32,
    places_in_cargo: i32,
    train_type_id: Uuid,
    tickets_sold: i64,
}

impl From<JourneyListingRow> for JourneyListing {
    fn from(row: JourneyListingRow) -> Self {
        JourneyListing {
            journey: Journey {
                id: row.id,
                route_id: row.route_id,
                train_id: row.train_id,
                crew_ids: row.crew_ids,
                departure_time: row.departure_time,
                arrival_time: row.arrival_time,
            },
            route_source: row.route_source,
            route_destination: row.route_destination,
            train: Train {
                id: row.train_id,
                name: row.train_name,
                cargo_num: row.cargo_num,
                places_in_cargo: row.places_in_cargo,
                train_type_id: row.train_type_id,
            },
            tickets_sold: row.tickets_sold,
        }
    }
}

const JOURNEY_COLUMNS: &str = r#"
    j.id, j.route_id, j.train_id, j.departure_time, j.arrival_time,
    ARRAY(SELECT jc.crew_id FROM journey_crew jc WHERE jc.journey_id = j.id ORDER BY jc.crew_id) AS crew_ids
"#;

// Foreign keys use the default `<table>_<column>_fkey` names from the migration
fn route_references(route: &Route) -> [Reference<'static>; 2] {
    [
        ("routes_source_id_fkey", "station", route.source_id),
        ("routes_destination_id_fkey", "station", route.destination_id),
    ]
}

fn train_references(train: &Train) -> [Reference<'static>; 1] {
    [("trains_train_type_id_fkey", "train type", train.train_type_id)]
}

fn journey_references(journey: &Journey) -> [Reference<'static>; 2] {
    [
        ("journeys_route_id_fkey", "route", journey.route_id),
        ("journeys_train_id_fkey", "train", journey.train_id),
    ]
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn insert_station(&self, station: &Station) -> StoreResult<()> {
        sqlx::query("INSERT INTO stations (id, name, latitude, longitude) VALUES ($1, $2, $3, $4)")
            .bind(station.id)
            .bind(&station.name)
            .bind(station.latitude)
            .bind(station.longitude)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn get_station(&self, id: Uuid) -> StoreResult<Option<Station>> {
        let row = sqlx::query_as::<_, StationRow>("SELECT id, name, latitude, longitude FROM stations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.map(Station::from))
    }

    async fn list_stations(&self) -> StoreResult<Vec<Station>> {
        let rows = sqlx::query_as::<_, StationRow>("SELECT id, name, latitude, longitude FROM stations ORDER BY name, id")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        Ok(rows.into_iter().map(Station::from).collect())
    }

    async fn update_station(&self, station: &Station) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE stations SET name = $2, latitude = $3, longitude = $4 WHERE id = $1")
            .bind(station.id)
            .bind(&station.name)
            .bind(station.latitude)
            .bind(station.longitude)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_station(&self, id: Uuid) -> StoreResult<bool> {
        self.delete_by_id("stations", id).await
    }

    async fn insert_route(&self, route: &Route) -> StoreResult<()> {
        sqlx::query("INSERT INTO routes (id, source_id, destination_id, distance) VALUES ($1, $2, $3, $4)")
            .bind(route.id)
            .bind(route.source_id)
            .bind(route.destination_id)
            .bind(route.distance)
            .execute(&self.pool)
            .await
            .map_err(|e| reference_error(e, &route_references(route)))?;
        Ok(())
    }

    async fn get_route(&self, id: Uuid) -> StoreResult<Option<RouteDetail>> {
        let row = sqlx::query_as::<_, RouteDetailRow>(
            r#"
            SELECT r.id, r.distance,
                   s.id AS source_id, s.name AS source_name, s.latitude AS source_latitude, s.longitude AS source_longitude,
                   d.id AS destination_id, d.name AS destination_name, d.latitude AS destination_latitude, d.longitude AS destination_longitude
            FROM routes r
            JOIN stations s ON s.id = r.source_id
            JOIN stations d ON d.id = r.destination_id
            WHERE r.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(RouteDetail::from))
    }

    async fn list_routes(&self, filter: &RouteFilter) -> StoreResult<Vec<RouteListing>> {
        let rows = sqlx::query_as::<_, RouteListingRow>(
            r#"
            SELECT r.id, s.name AS source, d.name AS destination, r.distance
            FROM routes r
            JOIN stations s ON s.id = r.source_id
            JOIN stations d ON d.id = r.destination_id
            WHERE (cardinality($1::uuid[]) = 0 OR r.source_id = ANY($1))
              AND (cardinality($2::uuid[]) = 0 OR r.destination_id = ANY($2))
            ORDER BY s.name, d.name, r.id
            "#,
        )
        .bind(&filter.source)
        .bind(&filter.destination)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows
            .into_iter()
            .map(|row| RouteListing {
                id: row.id,
                source: row.source,
                destination: row.destination,
                distance: row.distance,
            })
            .collect())
    }

    async fn update_route(&self, route: &Route) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE routes SET source_id = $2, destination_id = $3, distance = $4 WHERE id = $1")
            .bind(route.id)
            .bind(route.source_id)
            .bind(route.destination_id)
            .bind(route.distance)
            .execute(&self.pool)
            .await
            .map_err(|e| reference_error(e, &route_references(route)))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_route(&self, id: Uuid) -> StoreResult<bool> {
        self.delete_by_id("routes", id).await
    }

    async fn insert_train_type(&self, train_type: &TrainType) -> StoreResult<()> {
        sqlx::query("INSERT INTO train_types (id, name) VALUES ($1, $2)")
            .bind(train_type.id)
            .bind(&train_type.name)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn get_train_type(&self, id: Uuid) -> StoreResult<Option<TrainType>> {
        let row = sqlx::query_as::<_, (Uuid, String)>("SELECT id, name FROM train_types WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.map(|(id, name)| TrainType { id, name }))
    }

    async fn list_train_types(&self) -> StoreResult<Vec<TrainType>> {
        let rows = sqlx::query_as::<_, (Uuid, String)>("SELECT id, name FROM train_types ORDER BY name, id")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        Ok(rows.into_iter().map(|(id, name)| TrainType { id, name }).collect())
    }

    async fn update_train_type(&self, train_type: &TrainType) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE train_types SET name = $2 WHERE id = $1")
            .bind(train_type.id)
            .bind(&train_type.name)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_train_type(&self, id: Uuid) -> StoreResult<bool> {
        self.delete_by_id("train_types", id).await
    }

    async fn insert_train(&self, train: &Train) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO trains (id, name, cargo_num, places_in_cargo, train_type_id) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(train.id)
        .bind(&train.name)
        .bind(train.cargo_num)
        .bind(train.places_in_cargo)
        .bind(train.train_type_id)
        .execute(&self.pool)
        .await
        .map_err(|e| reference_error(e, &train_references(train)))?;
        Ok(())
    }

    async fn get_train(&self, id: Uuid) -> StoreResult<Option<Train>> {
        let row = sqlx::query_as::<_, TrainRow>(
            "SELECT id, name, cargo_num, places_in_cargo, train_type_id FROM trains WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(Train::from))
    }

    async fn list_trains(&self) -> StoreResult<Vec<TrainListing>> {
        let rows = sqlx::query_as::<_, TrainListingRow>(
            r#"
            SELECT t.id, t.name, t.cargo_num, t.places_in_cargo, tt.name AS train_type
            FROM trains t
            JOIN train_types tt ON tt.id = t.train_type_id
            ORDER BY t.name, t.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows
            .into_iter()
            .map(|row| TrainListing {
                id: row.id,
                name: row.name,
                cargo_num: row.cargo_num,
                places_in_cargo: row.places_in_cargo,
                train_type: row.train_type,
            })
            .collect())
    }

    /// Tickets sold outside a shrunken layout are left in place.
    async fn update_train(&self, train: &Train) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE trains SET name = $2, cargo_num = $3, places_in_cargo = $4, train_type_id = $5 WHERE id = $1",
        )
        .bind(train.id)
        .bind(&train.name)
        .bind(train.cargo_num)
        .bind(train.places_in_cargo)
        .bind(train.train_type_id)
        .execute(&self.pool)
        .await
        .map_err(|e| reference_error(e, &train_references(train)))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_train(&self, id: Uuid) -> StoreResult<bool> {
        self.delete_by_id("trains", id).await
    }

    async fn insert_crew(&self, crew: &Crew) -> StoreResult<()> {
        sqlx::query("INSERT INTO crew (id, first_name, last_name) VALUES ($1, $2, $3)")
            .bind(crew.id)
            .bind(&crew.first_name)
            .bind(&crew.last_name)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn get_crew(&self, id: Uuid) -> StoreResult<Option<Crew>> {
        let row = sqlx::query_as::<_, CrewRow>("SELECT id, first_name, last_name FROM crew WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.map(Crew::from))
    }

    async fn list_crew(&self) -> StoreResult<Vec<Crew>> {
        let rows = sqlx::query_as::<_, CrewRow>("SELECT id, first_name, last_name FROM crew ORDER BY last_name, first_name, id")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        Ok(rows.into_iter().map(Crew::from).collect())
    }

    async fn update_crew(&self, crew: &Crew) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE crew SET first_name = $2, last_name = $3 WHERE id = $1")
            .bind(crew.id)
            .bind(&crew.first_name)
            .bind(&crew.last_name)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_crew(&self, id: Uuid) -> StoreResult<bool> {
        self.delete_by_id("crew", id).await
    }

    async fn insert_journey(&self, journey: &Journey) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query(
            "INSERT INTO journeys (id, route_id, train_id, departure_time, arrival_time) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(journey.id)
        .bind(journey.route_id)
        .bind(journey.train_id)
        .bind(journey.departure_time)
        .bind(journey.arrival_time)
        .execute(&mut *tx)
        .await
        .map_err(|e| reference_error(e, &journey_references(journey)))?;

        Self::journey_crew(&mut *tx, journey).await?;

        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn get_journey(&self, id: Uuid) -> StoreResult<Option<Journey>> {
        let row = sqlx::query_as::<_, JourneyRow>(&format!("SELECT {} FROM journeys j WHERE j.id = $1", JOURNEY_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.map(Journey::from))
    }

    async fn get_journey_detail(&self, id: Uuid) -> StoreResult<Option<JourneyDetail>> {
        let Some(journey) = self.get_journey(id).await? else {
            return Ok(None);
        };
        // Foreign keys cascade, so a journey always has its route and train
        let (Some(route), Some(train)) = (self.get_route(journey.route_id).await?, self.get_train(journey.train_id).await?)
        else {
            return Ok(None);
        };
        let Some(train_type) = self.get_train_type(train.train_type_id).await? else {
            return Ok(None);
        };

        let crew = sqlx::query_as::<_, CrewRow>(
            "SELECT id, first_name, last_name FROM crew WHERE id = ANY($1) ORDER BY last_name, first_name, id",
        )
        .bind(&journey.crew_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?
        .into_iter()
        .map(Crew::from)
        .collect();

        Ok(Some(JourneyDetail { journey, route, train, train_type, crew }))
    }

    async fn list_journeys(&self, filter: &JourneyFilter) -> StoreResult<Vec<JourneyListing>> {
        let sql = format!(
            r#"
            SELECT {},
                   s.name AS route_source, d.name AS route_destination,
                   t.name AS train_name, t.cargo_num, t.places_in_cargo, t.train_type_id,
                   (SELECT COUNT(*) FROM tickets tk WHERE tk.journey_id = j.id) AS tickets_sold
            FROM journeys j
            JOIN routes r ON r.id = j.route_id
            JOIN stations s ON s.id = r.source_id
            JOIN stations d ON d.id = r.destination_id
            JOIN trains t ON t.id = j.train_id
            WHERE ($1::uuid IS NULL OR j.route_id = $1)
              AND ($2::timestamptz IS NULL OR j.departure_time >= $2)
              AND ($3::timestamptz IS NULL OR j.departure_time < $3)
              AND ($4::timestamptz IS NULL OR j.arrival_time >= $4)
              AND ($5::timestamptz IS NULL OR j.arrival_time < $5)
              AND ($6::uuid[] IS NULL OR j.id = ANY($6))
            ORDER BY j.departure_time, j.id
            "#,
            JOURNEY_COLUMNS
        );

        let rows = sqlx::query_as::<_, JourneyListingRow>(&sql)
            .bind(filter.route)
            .bind(filter.departure.map(|w| w.start))
            .bind(filter.departure.map(|w| w.end))
            .bind(filter.arrival.map(|w| w.start))
            .bind(filter.arrival.map(|w| w.end))
            .bind(filter.ids.as_deref())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        Ok(rows.into_iter().map(JourneyListing::from).collect())
    }

    async fn update_journey(&self, journey: &Journey) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let result = sqlx::query(
            "UPDATE journeys SET route_id = $2, train_id = $3, departure_time = $4, arrival_time = $5 WHERE id = $1",
        )
        .bind(journey.id)
        .bind(journey.route_id)
        .bind(journey.train_id)
        .bind(journey.departure_time)
        .bind(journey.arrival_time)
        .execute(&mut *tx)
        .await
        .map_err(|e| reference_error(e, &journey_references(journey)))?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("DELETE FROM journey_crew WHERE journey_id = $1")
            .bind(journey.id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        Self::journey_crew(&mut *tx, journey).await?;

        tx.commit().await.map_err(backend)?;
        Ok(true)
    }

    async fn delete_journey(&self, id: Uuid) -> StoreResult<bool> {
        self.delete_by_id("journeys", id).await
    }

    async fn sold_by_cargo(&self, journey_id: Uuid) -> StoreResult<Vec<(i32, i64)>> {
        sqlx::query_as::<_, (i32, i64)>(
            "SELECT cargo, COUNT(*) AS sold FROM tickets WHERE journey_id = $1 GROUP BY cargo ORDER BY cargo",
        )
        .bind(journey_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)
    }
}
