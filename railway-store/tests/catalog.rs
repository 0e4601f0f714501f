use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;
use railway_core::filter::{JourneyFilter, RouteFilter, TimeWindow};
use railway_core::geocoding::StaticGeocoder;
use railway_core::{
    Catalog, CatalogRepository, Coordinates, CoreError, Geocoder, GeocodeError, JourneyChanges, RouteChanges,
    StationChanges, TrainChanges,
};
use railway_store::MemoryStore;

fn catalog() -> (Arc<MemoryStore>, Catalog) {
    let store = Arc::new(MemoryStore::new());
    let geocoder = StaticGeocoder::new()
        .with_place("Kyiv", 50.4500336, 30.5241361)
        .with_place("Lviv", 49.8419, 24.0316)
        .with_place("Paris", 48.8588897, 2.3200410);
    (store.clone(), Catalog::new(store, Arc::new(geocoder)))
}

struct CountingGeocoder {
    inner: StaticGeocoder,
    lookups: AtomicUsize,
}

#[async_trait]
impl Geocoder for CountingGeocoder {
    async fn lookup(&self, name: &str) -> Result<Coordinates, GeocodeError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.lookup(name).await
    }
}

fn fields(err: CoreError) -> Vec<String> {
    match err {
        CoreError::ValidationError(errors) => errors.into_iter().map(|e| e.field).collect(),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_station_is_geocoded_once_at_creation() {
    let (store, catalog) = catalog();

    let station = catalog.create_station("  Kyiv ").await.unwrap();
    assert_eq!(station.name, "Kyiv");
    assert_eq!(station.latitude, 50.4500336);

    let stored = store.get_station(station.id).await.unwrap().unwrap();
    assert_eq!(stored, station);
}

#[tokio::test]
async fn test_unknown_place_creates_no_station() {
    let (store, catalog) = catalog();

    let err = catalog.create_station("Atlantis").await.unwrap_err();
    assert!(matches!(err, CoreError::Geocode(_)));
    assert!(store.list_stations().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_route_distance_is_computed_from_stations() {
    let (_, catalog) = catalog();
    let kyiv = catalog.create_station("Kyiv").await.unwrap();
    let paris = catalog.create_station("Paris").await.unwrap();

    let route = catalog.create_route(kyiv.id, paris.id).await.unwrap();
    assert_eq!(route.distance, 2026);
}

#[tokio::test]
async fn test_route_with_missing_stations() {
    let (_, catalog) = catalog();
    let err = catalog.create_route(Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
    assert_eq!(fields(err), vec!["source", "destination"]);
}

#[tokio::test]
async fn test_train_rejects_empty_layout() {
    let (_, catalog) = catalog();
    let train_type = catalog.create_train_type("Intercity").await.unwrap();

    let err = catalog.create_train("", 0, 0, train_type.id).await.unwrap_err();
    assert_eq!(fields(err), vec!["name", "cargo_num", "places_in_cargo"]);
}

#[tokio::test]
async fn test_journey_must_arrive_after_departure() {
    let (_, catalog) = catalog();
    let kyiv = catalog.create_station("Kyiv").await.unwrap();
    let lviv = catalog.create_station("Lviv").await.unwrap();
    let route = catalog.create_route(kyiv.id, lviv.id).await.unwrap();
    let train_type = catalog.create_train_type("Intercity").await.unwrap();
    let train = catalog.create_train("IC-743", 4, 40, train_type.id).await.unwrap();
    let departure = Utc.with_ymd_and_hms(2024, 12, 26, 8, 0, 0).unwrap();

    let err = catalog
        .create_journey(route.id, train.id, vec![Uuid::new_v4()], departure, departure)
        .await
        .unwrap_err();
    assert_eq!(fields(err), vec!["crew", "arrival_time"]);
}

#[tokio::test]
async fn test_route_and_journey_filters() {
    let (store, catalog) = catalog();
    let kyiv = catalog.create_station("Kyiv").await.unwrap();
    let lviv = catalog.create_station("Lviv").await.unwrap();
    let paris = catalog.create_station("Paris").await.unwrap();

    let kyiv_lviv = catalog.create_route(kyiv.id, lviv.id).await.unwrap();
    let kyiv_paris = catalog.create_route(kyiv.id, paris.id).await.unwrap();
    catalog.create_route(lviv.id, paris.id).await.unwrap();

    let filter = RouteFilter { source: vec![kyiv.id], destination: vec![paris.id] };
    let routes = store.list_routes(&filter).await.unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].id, kyiv_paris.id);

    let from_kyiv = store.list_routes(&RouteFilter { source: vec![kyiv.id], destination: vec![] }).await.unwrap();
    assert_eq!(from_kyiv.len(), 2);

    let train_type = catalog.create_train_type("Intercity").await.unwrap();
    let train = catalog.create_train("IC-743", 4, 40, train_type.id).await.unwrap();
    let morning = Utc.with_ymd_and_hms(2024, 12, 26, 8, 0, 0).unwrap();
    let next_day = morning + Duration::days(1);

    let first = catalog
        .create_journey(kyiv_lviv.id, train.id, vec![], morning, morning + Duration::hours(5))
        .await
        .unwrap();
    catalog
        .create_journey(kyiv_lviv.id, train.id, vec![], next_day, next_day + Duration::hours(5))
        .await
        .unwrap();
    catalog
        .create_journey(kyiv_paris.id, train.id, vec![], morning, morning + Duration::hours(20))
        .await
        .unwrap();

    let by_route_and_day = store
        .list_journeys(&JourneyFilter {
            route: Some(kyiv_lviv.id),
            departure: TimeWindow::parse("2024-12-26"),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_route_and_day.len(), 1);
    assert_eq!(by_route_and_day[0].journey.id, first.id);

    let by_arrival_minute = store
        .list_journeys(&JourneyFilter { arrival: TimeWindow::parse("2024-12-26 13:00"), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(by_arrival_minute.len(), 1);
    assert_eq!(by_arrival_minute[0].journey.id, first.id);
}

#[tokio::test]
async fn test_station_rename_geocodes_again() {
    let store = Arc::new(MemoryStore::new());
    let geocoder = Arc::new(CountingGeocoder {
        inner: StaticGeocoder::new()
            .with_place("Kyiv", 50.4500336, 30.5241361)
            .with_place("Lviv", 49.8419, 24.0316),
        lookups: AtomicUsize::new(0),
    });
    let catalog = Catalog::new(store.clone(), geocoder.clone());

    let station = catalog.create_station("Kyiv").await.unwrap();
    assert_eq!(geocoder.lookups.load(Ordering::SeqCst), 1);

    catalog.update_station(station.id, StationChanges { name: Some(" Kyiv".into()) }).await.unwrap();
    catalog.update_station(station.id, StationChanges::default()).await.unwrap();
    assert_eq!(geocoder.lookups.load(Ordering::SeqCst), 1);

    let renamed = catalog.update_station(station.id, StationChanges { name: Some("Lviv".into()) }).await.unwrap();
    assert_eq!(geocoder.lookups.load(Ordering::SeqCst), 2);
    assert_eq!((renamed.latitude, renamed.longitude), (49.8419, 24.0316));
    assert_eq!(store.get_station(station.id).await.unwrap().unwrap(), renamed);
}

#[tokio::test]
async fn test_failed_rename_keeps_station() {
    let (store, catalog) = catalog();
    let station = catalog.create_station("Kyiv").await.unwrap();

    let err = catalog
        .update_station(station.id, StationChanges { name: Some("Atlantis".into()) })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Geocode(_)));
    assert_eq!(store.get_station(station.id).await.unwrap().unwrap(), station);
}

#[tokio::test]
async fn test_moving_route_endpoint_recomputes_distance() {
    let (store, catalog) = catalog();
    let kyiv = catalog.create_station("Kyiv").await.unwrap();
    let lviv = catalog.create_station("Lviv").await.unwrap();
    let paris = catalog.create_station("Paris").await.unwrap();
    let route = catalog.create_route(kyiv.id, lviv.id).await.unwrap();

    let changes = RouteChanges { destination: Some(paris.id), ..RouteChanges::default() };
    let moved = catalog.update_route(route.id, changes).await.unwrap();
    assert_eq!(moved.source_id, kyiv.id);
    assert_eq!(moved.distance, 2026);

    let stored = store.get_route(route.id).await.unwrap().unwrap();
    assert_eq!(stored.destination.name, "Paris");
    assert_eq!(stored.distance, 2026);

    let changes = RouteChanges { source: Some(Uuid::new_v4()), ..RouteChanges::default() };
    let err = catalog.update_route(route.id, changes).await.unwrap_err();
    assert_eq!(fields(err), vec!["source"]);
}

#[tokio::test]
async fn test_train_update_is_validated_like_create() {
    let (store, catalog) = catalog();
    let train_type = catalog.create_train_type("Intercity").await.unwrap();
    let train = catalog.create_train("IC-743", 4, 40, train_type.id).await.unwrap();

    let changes = TrainChanges {
        places_in_cargo: Some(0),
        train_type: Some(Uuid::new_v4()),
        ..TrainChanges::default()
    };
    let err = catalog.update_train(train.id, changes).await.unwrap_err();
    assert_eq!(fields(err), vec!["places_in_cargo", "train_type"]);
    assert_eq!(store.get_train(train.id).await.unwrap().unwrap().places_in_cargo, 40);

    let changes = TrainChanges { name: Some(" IC-744 ".into()), cargo_num: Some(6), ..TrainChanges::default() };
    let updated = catalog.update_train(train.id, changes).await.unwrap();
    assert_eq!((updated.name.as_str(), updated.cargo_num, updated.places_in_cargo), ("IC-744", 6, 40));

    let err = catalog.update_train(Uuid::new_v4(), TrainChanges::default()).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "train", .. }));
}

#[tokio::test]
async fn test_journey_update_keeps_time_order() {
    let (store, catalog) = catalog();
    let kyiv = catalog.create_station("Kyiv").await.unwrap();
    let lviv = catalog.create_station("Lviv").await.unwrap();
    let route = catalog.create_route(kyiv.id, lviv.id).await.unwrap();
    let train_type = catalog.create_train_type("Intercity").await.unwrap();
    let train = catalog.create_train("IC-743", 4, 40, train_type.id).await.unwrap();
    let crew = catalog.create_crew("Olena", "Shevchenko").await.unwrap();
    let departure = Utc.with_ymd_and_hms(2024, 12, 26, 8, 0, 0).unwrap();
    let journey = catalog
        .create_journey(route.id, train.id, vec![], departure, departure + Duration::hours(5))
        .await
        .unwrap();

    // Moving departure past the stored arrival is caught against the merged record
    let changes = JourneyChanges { departure_time: Some(departure + Duration::hours(6)), ..JourneyChanges::default() };
    let err = catalog.update_journey(journey.id, changes).await.unwrap_err();
    assert_eq!(fields(err), vec!["arrival_time"]);

    let changes = JourneyChanges { crew: Some(vec![crew.id, crew.id]), ..JourneyChanges::default() };
    let updated = catalog.update_journey(journey.id, changes).await.unwrap();
    assert_eq!(updated.crew_ids, vec![crew.id]);
    assert_eq!(updated.departure_time, departure);
    assert_eq!(store.get_journey(journey.id).await.unwrap().unwrap().crew_ids, vec![crew.id]);
}
