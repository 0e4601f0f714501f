//! Run against a live server with `DATABASE_URL=postgres://... cargo test -- --ignored`.
//! Each test gets a fresh database with the migrations applied.

use std::sync::Arc;
use chrono::{Duration, TimeZone, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use railway_core::geocoding::StaticGeocoder;
use railway_core::models::{Journey, Train};
use railway_core::{Catalog, CatalogRepository, StoreError, TrainChanges};
use railway_order::{OrderError, OrderManager, TicketRequest};
use railway_store::{PgCatalogRepository, PgOrderRepository};

fn services(pool: PgPool) -> (Arc<PgCatalogRepository>, Catalog, OrderManager) {
    let repo = Arc::new(PgCatalogRepository::new(pool.clone()));
    let geocoder = StaticGeocoder::new()
        .with_place("Kyiv", 50.4500336, 30.5241361)
        .with_place("Lviv", 49.8419, 24.0316);

    let catalog = Catalog::new(repo.clone(), Arc::new(geocoder));
    let orders = OrderManager::new(repo.clone(), Arc::new(PgOrderRepository::new(pool)));
    (repo, catalog, orders)
}

async fn journey(catalog: &Catalog, cargo_num: i32, places_in_cargo: i32) -> Journey {
    let kyiv = catalog.create_station("Kyiv").await.unwrap();
    let lviv = catalog.create_station("Lviv").await.unwrap();
    let route = catalog.create_route(kyiv.id, lviv.id).await.unwrap();
    let train_type = catalog.create_train_type("Intercity").await.unwrap();
    let train = catalog.create_train("IC-743", cargo_num, places_in_cargo, train_type.id).await.unwrap();
    let departure = Utc.with_ymd_and_hms(2024, 12, 26, 8, 0, 0).unwrap();

    catalog
        .create_journey(route.id, train.id, Vec::new(), departure, departure + Duration::hours(5))
        .await
        .unwrap()
}

#[sqlx::test(migrations = "../migrations")]
#[ignore]
async fn test_unique_seat_index_picks_one_order(pool: PgPool) {
    let (_, catalog, orders) = services(pool);
    let journey = journey(&catalog, 1, 1).await;

    let mut handles = Vec::new();
    for n in 0..8 {
        let orders = orders.clone();
        let request = TicketRequest { journey: journey.id, cargo: 1, seat: 1 };
        handles.push(tokio::spawn(async move {
            orders.create_order(&format!("user-{n}"), &[request]).await
        }));
    }

    let mut committed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => committed += 1,
            Err(err) => assert!(matches!(err, OrderError::SeatTaken { .. }), "unexpected error: {err:?}"),
        }
    }
    assert_eq!(committed, 1);

    let (_, free) = catalog.journey_availability(journey.id).await.unwrap();
    assert_eq!(free.total_free, 0);
}

#[sqlx::test(migrations = "../migrations")]
#[ignore]
async fn test_insert_with_vanished_reference_is_not_found(pool: PgPool) {
    let (repo, _, _) = services(pool);
    let train = Train {
        id: Uuid::new_v4(),
        name: "Ghost".to_string(),
        cargo_num: 1,
        places_in_cargo: 1,
        train_type_id: Uuid::new_v4(),
    };

    let err = repo.insert_train(&train).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: "train type", id } if id == train.train_type_id));
}

#[sqlx::test(migrations = "../migrations")]
#[ignore]
async fn test_shrunk_train_reports_negative_availability(pool: PgPool) {
    let (_, catalog, orders) = services(pool);
    let journey = journey(&catalog, 2, 2).await;

    orders
        .create_order("user-1", &[TicketRequest { journey: journey.id, cargo: 2, seat: 1 }])
        .await
        .unwrap();

    let changes = TrainChanges { cargo_num: Some(1), ..TrainChanges::default() };
    catalog.update_train(journey.train_id, changes).await.unwrap();

    let (_, free) = catalog.journey_availability(journey.id).await.unwrap();
    assert_eq!(free.total_free, 1);
    assert_eq!(free.free_by_cargo.into_iter().collect::<Vec<_>>(), vec![(1, 2), (2, -1)]);
}
