//! In-process storage with the same guarantees as the Postgres backend.
//!
//! All tables sit behind one `RwLock`. An order is checked and written under a
//! single write guard, so two orders racing for a seat can never both commit.

use std::collections::{HashMap, HashSet};
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;
use railway_core::filter::{JourneyFilter, RouteFilter};
use railway_core::models::{
    Crew, Journey, JourneyDetail, JourneyListing, Route, RouteDetail, RouteListing, Station, Train,
    TrainListing, TrainType,
};
use railway_core::repository::{CatalogRepository, StoreError, StoreResult};
use railway_order::{Order, OrderRepository};

type SeatKey = (Uuid, i32, i32);

#[derive(Default)]
struct Tables {
    stations: HashMap<Uuid, Station>,
    routes: HashMap<Uuid, Route>,
    train_types: HashMap<Uuid, TrainType>,
    trains: HashMap<Uuid, Train>,
    crew: HashMap<Uuid, Crew>,
    journeys: HashMap<Uuid, Journey>,
    orders: HashMap<Uuid, Order>,
    /// Unique index over `(journey, cargo, seat)`
    seats: HashSet<SeatKey>,
}

impl Tables {
    fn route_detail(&self, id: Uuid) -> Option<RouteDetail> {
        let route = self.routes.get(&id)?;
        Some(RouteDetail {
            id: route.id,
            source: self.stations.get(&route.source_id)?.clone(),
            destination: self.stations.get(&route.destination_id)?.clone(),
            distance: route.distance,
        })
    }

    fn route_references(&self, route: &Route) -> StoreResult<()> {
        for station in [route.source_id, route.destination_id] {
            if !self.stations.contains_key(&station) {
                return Err(StoreError::NotFound { entity: "station", id: station });
            }
        }
        Ok(())
    }

    fn train_references(&self, train: &Train) -> StoreResult<()> {
        if !self.train_types.contains_key(&train.train_type_id) {
            return Err(StoreError::NotFound { entity: "train type", id: train.train_type_id });
        }
        Ok(())
    }

    fn journey_references(&self, journey: &Journey) -> StoreResult<()> {
        if !self.routes.contains_key(&journey.route_id) {
            return Err(StoreError::NotFound { entity: "route", id: journey.route_id });
        }
        if !self.trains.contains_key(&journey.train_id) {
            return Err(StoreError::NotFound { entity: "train", id: journey.train_id });
        }
        if let Some(missing) = journey.crew_ids.iter().find(|id| !self.crew.contains_key(*id)) {
            return Err(StoreError::NotFound { entity: "crew", id: *missing });
        }
        Ok(())
    }

    fn tickets_sold(&self, journey_id: Uuid) -> i64 {
        self.seats.iter().filter(|(journey, _, _)| *journey == journey_id).count() as i64
    }

    fn remove_station(&mut self, id: Uuid) -> bool {
        let existed = self.stations.remove(&id).is_some();
        let routes: Vec<Uuid> = self
            .routes
            .values()
            .filter(|r| r.source_id == id || r.destination_id == id)
            .map(|r| r.id)
            .collect();
        for route in routes {
            self.remove_route(route);
        }
        existed
    }

    fn remove_route(&mut self, id: Uuid) -> bool {
        let existed = self.routes.remove(&id).is_some();
        let journeys: Vec<Uuid> = self.journeys.values().filter(|j| j.route_id == id).map(|j| j.id).collect();
        for journey in journeys {
            self.remove_journey(journey);
        }
        existed
    }

    fn remove_train_type(&mut self, id: Uuid) -> bool {
        let existed = self.train_types.remove(&id).is_some();
        let trains: Vec<Uuid> = self.trains.values().filter(|t| t.train_type_id == id).map(|t| t.id).collect();
        for train in trains {
            self.remove_train(train);
        }
        existed
    }

    fn remove_train(&mut self, id: Uuid) -> bool {
        let existed = self.trains.remove(&id).is_some();
        let journeys: Vec<Uuid> = self.journeys.values().filter(|j| j.train_id == id).map(|j| j.id).collect();
        for journey in journeys {
            self.remove_journey(journey);
        }
        existed
    }

    fn remove_crew(&mut self, id: Uuid) -> bool {
        for journey in self.journeys.values_mut() {
            journey.crew_ids.retain(|crew_id| *crew_id != id);
        }
        self.crew.remove(&id).is_some()
    }

    fn remove_journey(&mut self, id: Uuid) -> bool {
        let existed = self.journeys.remove(&id).is_some();
        // Tickets go with their journey, the orders that held them stay
        for order in self.orders.values_mut() {
            order.tickets.retain(|t| t.journey_id != id);
        }
        self.seats.retain(|(journey, _, _)| *journey != id);
        existed
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed orders and tickets, for asserting on rollbacks
    pub async fn counts(&self) -> (usize, usize) {
        let tables = self.tables.read().await;
        (tables.orders.len(), tables.seats.len())
    }
}

/// Overwrite an existing row; never inserts.
fn replace<T: Clone>(table: &mut HashMap<Uuid, T>, id: Uuid, row: &T) -> bool {
    match table.get_mut(&id) {
        Some(slot) => {
            *slot = row.clone();
            true
        }
        None => false,
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn insert_station(&self, station: &Station) -> StoreResult<()> {
        self.tables.write().await.stations.insert(station.id, station.clone());
        Ok(())
    }

    async fn get_station(&self, id: Uuid) -> StoreResult<Option<Station>> {
        Ok(self.tables.read().await.stations.get(&id).cloned())
    }

    async fn list_stations(&self) -> StoreResult<Vec<Station>> {
        let mut stations: Vec<Station> = self.tables.read().await.stations.values().cloned().collect();
        stations.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(stations)
    }

    async fn update_station(&self, station: &Station) -> StoreResult<bool> {
        Ok(replace(&mut self.tables.write().await.stations, station.id, station))
    }

    async fn delete_station(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.remove_station(id))
    }

    async fn insert_route(&self, route: &Route) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.route_references(route)?;
        tables.routes.insert(route.id, route.clone());
        Ok(())
    }

    async fn get_route(&self, id: Uuid) -> StoreResult<Option<RouteDetail>> {
        Ok(self.tables.read().await.route_detail(id))
    }

    async fn list_routes(&self, filter: &RouteFilter) -> StoreResult<Vec<RouteListing>> {
        let tables = self.tables.read().await;
        let mut routes: Vec<RouteListing> = tables
            .routes
            .values()
            .filter(|r| filter.matches(r.source_id, r.destination_id))
            .filter_map(|r| tables.route_detail(r.id))
            .map(|detail| RouteListing {
                id: detail.id,
                source: detail.source.name,
                destination: detail.destination.name,
                distance: detail.distance,
            })
            .collect();
        routes.sort_by(|a, b| (&a.source, &a.destination, a.id).cmp(&(&b.source, &b.destination, b.id)));
        Ok(routes)
    }

    async fn update_route(&self, route: &Route) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if !tables.routes.contains_key(&route.id) {
            return Ok(false);
        }
        tables.route_references(route)?;
        Ok(replace(&mut tables.routes, route.id, route))
    }

    async fn delete_route(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.remove_route(id))
    }

    async fn insert_train_type(&self, train_type: &TrainType) -> StoreResult<()> {
        self.tables.write().await.train_types.insert(train_type.id, train_type.clone());
        Ok(())
    }

    async fn get_train_type(&self, id: Uuid) -> StoreResult<Option<TrainType>> {
        Ok(self.tables.read().await.train_types.get(&id).cloned())
    }

    async fn list_train_types(&self) -> StoreResult<Vec<TrainType>> {
        let mut types: Vec<TrainType> = self.tables.read().await.train_types.values().cloned().collect();
        types.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(types)
    }

    async fn update_train_type(&self, train_type: &TrainType) -> StoreResult<bool> {
        Ok(replace(&mut self.tables.write().await.train_types, train_type.id, train_type))
    }

    async fn delete_train_type(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.remove_train_type(id))
    }

    async fn insert_train(&self, train: &Train) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.train_references(train)?;
        tables.trains.insert(train.id, train.clone());
        Ok(())
    }

    async fn get_train(&self, id: Uuid) -> StoreResult<Option<Train>> {
        Ok(self.tables.read().await.trains.get(&id).cloned())
    }

    async fn list_trains(&self) -> StoreResult<Vec<TrainListing>> {
        let tables = self.tables.read().await;
        let mut trains: Vec<TrainListing> = tables
            .trains
            .values()
            .filter_map(|t| {
                let train_type = tables.train_types.get(&t.train_type_id)?;
                Some(TrainListing {
                    id: t.id,
                    name: t.name.clone(),
                    cargo_num: t.cargo_num,
                    places_in_cargo: t.places_in_cargo,
                    train_type: train_type.name.clone(),
                })
            })
            .collect();
        trains.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(trains)
    }

    /// Sold tickets are kept even when they fall outside the new layout.
    async fn update_train(&self, train: &Train) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if !tables.trains.contains_key(&train.id) {
            return Ok(false);
        }
        tables.train_references(train)?;
        Ok(replace(&mut tables.trains, train.id, train))
    }

    async fn delete_train(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.remove_train(id))
    }

    async fn insert_crew(&self, crew: &Crew) -> StoreResult<()> {
        self.tables.write().await.crew.insert(crew.id, crew.clone());
        Ok(())
    }

    async fn get_crew(&self, id: Uuid) -> StoreResult<Option<Crew>> {
        Ok(self.tables.read().await.crew.get(&id).cloned())
    }

    async fn list_crew(&self) -> StoreResult<Vec<Crew>> {
        let mut crew: Vec<Crew> = self.tables.read().await.crew.values().cloned().collect();
        crew.sort_by(|a, b| (&a.last_name, &a.first_name, a.id).cmp(&(&b.last_name, &b.first_name, b.id)));
        Ok(crew)
    }

    async fn update_crew(&self, crew: &Crew) -> StoreResult<bool> {
        Ok(replace(&mut self.tables.write().await.crew, crew.id, crew))
    }

    async fn delete_crew(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.remove_crew(id))
    }

    async fn insert_journey(&self, journey: &Journey) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.journey_references(journey)?;
        tables.journeys.insert(journey.id, journey.clone());
        Ok(())
    }

    async fn get_journey(&self, id: Uuid) -> StoreResult<Option<Journey>> {
        Ok(self.tables.read().await.journeys.get(&id).cloned())
    }

    async fn get_journey_detail(&self, id: Uuid) -> StoreResult<Option<JourneyDetail>> {
        let tables = self.tables.read().await;
        let Some(journey) = tables.journeys.get(&id) else {
            return Ok(None);
        };
        let (Some(route), Some(train)) = (tables.route_detail(journey.route_id), tables.trains.get(&journey.train_id))
        else {
            return Ok(None);
        };
        let Some(train_type) = tables.train_types.get(&train.train_type_id) else {
            return Ok(None);
        };

        let mut crew: Vec<Crew> = journey.crew_ids.iter().filter_map(|id| tables.crew.get(id).cloned()).collect();
        crew.sort_by(|a, b| (&a.last_name, &a.first_name, a.id).cmp(&(&b.last_name, &b.first_name, b.id)));

        Ok(Some(JourneyDetail {
            journey: journey.clone(),
            route,
            train: train.clone(),
            train_type: train_type.clone(),
            crew,
        }))
    }

    async fn list_journeys(&self, filter: &JourneyFilter) -> StoreResult<Vec<JourneyListing>> {
        let tables = self.tables.read().await;
        let mut journeys: Vec<JourneyListing> = tables
            .journeys
            .values()
            .filter(|j| filter.route.map_or(true, |route| j.route_id == route))
            .filter(|j| filter.departure.map_or(true, |w| w.contains(j.departure_time)))
            .filter(|j| filter.arrival.map_or(true, |w| w.contains(j.arrival_time)))
            .filter(|j| filter.ids.as_ref().map_or(true, |ids| ids.contains(&j.id)))
            .filter_map(|j| {
                let route = tables.route_detail(j.route_id)?;
                let train = tables.trains.get(&j.train_id)?;
                Some(JourneyListing {
                    journey: j.clone(),
                    route_source: route.source.name,
                    route_destination: route.destination.name,
                    train: train.clone(),
                    tickets_sold: tables.tickets_sold(j.id),
                })
            })
            .collect();
        journeys.sort_by(|a, b| {
            (a.journey.departure_time, a.journey.id).cmp(&(b.journey.departure_time, b.journey.id))
        });
        Ok(journeys)
    }

    async fn update_journey(&self, journey: &Journey) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if !tables.journeys.contains_key(&journey.id) {
            return Ok(false);
        }
        tables.journey_references(journey)?;
        Ok(replace(&mut tables.journeys, journey.id, journey))
    }

    async fn delete_journey(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.remove_journey(id))
    }

    async fn sold_by_cargo(&self, journey_id: Uuid) -> StoreResult<Vec<(i32, i64)>> {
        let tables = self.tables.read().await;
        let mut counts: HashMap<i32, i64> = HashMap::new();
        for (journey, cargo, _) in &tables.seats {
            if *journey == journey_id {
                *counts.entry(*cargo).or_insert(0) += 1;
            }
        }
        let mut sold: Vec<(i32, i64)> = counts.into_iter().collect();
        sold.sort();
        Ok(sold)
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn create_order(&self, order: &Order) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let mut staged: HashSet<SeatKey> = HashSet::new();

        // Nothing is written until every ticket has passed
        for (index, ticket) in order.tickets.iter().enumerate() {
            let train = tables
                .journeys
                .get(&ticket.journey_id)
                .and_then(|journey| tables.trains.get(&journey.train_id))
                .ok_or(StoreError::JourneyMissing { index, journey_id: ticket.journey_id })?;

            ticket
                .full_clean(train)
                .map_err(|source| StoreError::InvalidTicket { index, source })?;

            let key = ticket.seat_key();
            if tables.seats.contains(&key) || !staged.insert(key) {
                return Err(StoreError::SeatTaken {
                    index,
                    journey_id: ticket.journey_id,
                    cargo: ticket.cargo,
                    seat: ticket.seat,
                });
            }
        }

        tables.seats.extend(staged);
        tables.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self, user_id: &str) -> StoreResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .tables
            .read()
            .await
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    async fn seed(store: &MemoryStore, cargo_num: i32, places_in_cargo: i32) -> Journey {
        let kyiv = Station { id: Uuid::new_v4(), name: "Kyiv".into(), latitude: 50.45, longitude: 30.52 };
        let lviv = Station { id: Uuid::new_v4(), name: "Lviv".into(), latitude: 49.84, longitude: 24.03 };
        store.insert_station(&kyiv).await.unwrap();
        store.insert_station(&lviv).await.unwrap();

        let route = Route { id: Uuid::new_v4(), source_id: kyiv.id, destination_id: lviv.id, distance: 469 };
        store.insert_route(&route).await.unwrap();

        let train_type = TrainType { id: Uuid::new_v4(), name: "Passenger".into() };
        store.insert_train_type(&train_type).await.unwrap();

        let train = Train {
            id: Uuid::new_v4(),
            name: "Express-1".into(),
            cargo_num,
            places_in_cargo,
            train_type_id: train_type.id,
        };
        store.insert_train(&train).await.unwrap();

        let crew = Crew { id: Uuid::new_v4(), first_name: "Nikita".into(), last_name: "Tkachenko".into() };
        store.insert_crew(&crew).await.unwrap();

        let journey = Journey {
            id: Uuid::new_v4(),
            route_id: route.id,
            train_id: train.id,
            crew_ids: vec![crew.id],
            departure_time: Utc::now(),
            arrival_time: Utc::now() + Duration::hours(5),
        };
        store.insert_journey(&journey).await.unwrap();
        journey
    }

    #[tokio::test]
    async fn test_failed_ticket_rolls_back_whole_order() {
        let store = MemoryStore::new();
        let journey = seed(&store, 2, 3).await;

        let mut order = Order::new("user-1");
        order.add_ticket(journey.id, 1, 1);
        order.add_ticket(journey.id, 1, 2);
        order.add_ticket(journey.id, 1, 4);

        let err = store.create_order(&order).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidTicket { index: 2, .. }));
        assert_eq!(store.counts().await, (0, 0));
    }

    #[tokio::test]
    async fn test_seat_uniqueness_across_orders() {
        let store = MemoryStore::new();
        let journey = seed(&store, 1, 2).await;

        let mut first = Order::new("user-1");
        first.add_ticket(journey.id, 1, 1);
        store.create_order(&first).await.unwrap();

        let mut second = Order::new("user-2");
        second.add_ticket(journey.id, 1, 2);
        second.add_ticket(journey.id, 1, 1);
        let err = store.create_order(&second).await.unwrap_err();

        assert!(matches!(err, StoreError::SeatTaken { index: 1, cargo: 1, seat: 1, .. }));
        assert_eq!(store.counts().await, (1, 1));
        assert_eq!(store.sold_by_cargo(journey.id).await.unwrap(), vec![(1, 1)]);
    }

    #[tokio::test]
    async fn test_deleting_journey_cascades_to_tickets() {
        let store = MemoryStore::new();
        let journey = seed(&store, 1, 2).await;

        let mut order = Order::new("user-1");
        order.add_ticket(journey.id, 1, 1);
        store.create_order(&order).await.unwrap();

        assert!(store.delete_journey(journey.id).await.unwrap());
        assert_eq!(store.counts().await, (1, 0));
        assert!(store.get_order(order.id).await.unwrap().unwrap().tickets.is_empty());
        assert!(!store.delete_journey(journey.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_deleting_crew_detaches_from_journey() {
        let store = MemoryStore::new();
        let journey = seed(&store, 1, 2).await;

        assert!(store.delete_crew(journey.crew_ids[0]).await.unwrap());
        let detail = store.get_journey_detail(journey.id).await.unwrap().unwrap();
        assert!(detail.crew.is_empty());
        assert!(detail.journey.crew_ids.is_empty());
    }

    #[tokio::test]
    async fn test_update_never_inserts() {
        let store = MemoryStore::new();
        let ghost = Crew { id: Uuid::new_v4(), first_name: "Ivan".into(), last_name: "Franko".into() };

        assert!(!store.update_crew(&ghost).await.unwrap());
        assert!(store.get_crew(ghost.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_journey_checks_references() {
        let store = MemoryStore::new();
        let mut journey = seed(&store, 1, 2).await;

        let missing = Uuid::new_v4();
        journey.crew_ids = vec![missing];
        let err = store.update_journey(&journey).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "crew", id } if id == missing));

        journey.crew_ids.clear();
        assert!(store.update_journey(&journey).await.unwrap());
        assert!(store.get_journey(journey.id).await.unwrap().unwrap().crew_ids.is_empty());
    }

    #[tokio::test]
    async fn test_shrinking_train_keeps_sold_tickets() {
        let store = MemoryStore::new();
        let journey = seed(&store, 2, 2).await;

        let mut order = Order::new("user-1");
        order.add_ticket(journey.id, 2, 2);
        store.create_order(&order).await.unwrap();

        let mut train = store.get_train(journey.train_id).await.unwrap().unwrap();
        train.cargo_num = 1;
        assert!(store.update_train(&train).await.unwrap());

        assert_eq!(store.sold_by_cargo(journey.id).await.unwrap(), vec![(2, 1)]);
        assert_eq!(store.counts().await, (1, 1));
    }

    #[tokio::test]
    async fn test_journey_listing_counts_sold_tickets() {
        let store = MemoryStore::new();
        let journey = seed(&store, 2, 2).await;

        let mut order = Order::new("user-1");
        order.add_ticket(journey.id, 1, 1);
        order.add_ticket(journey.id, 2, 1);
        store.create_order(&order).await.unwrap();

        let listing = store.list_journeys(&JourneyFilter::default()).await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].tickets_sold, 2);
        assert_eq!(listing[0].route_source, "Kyiv");
        assert_eq!(listing[0].route_destination, "Lviv");
    }
}
