use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::Context;
use railway_api::{app, AppState, AuthConfig};
use railway_core::{Catalog, CatalogRepository};
use railway_order::{OrderManager, OrderRepository};
use railway_store::{Config, DbClient, HttpGeocoder, PgCatalogRepository, PgOrderRepository};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "railway_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Railway API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let catalog_repo: Arc<dyn CatalogRepository> = Arc::new(PgCatalogRepository::new(db.pool.clone()));
    let order_repo: Arc<dyn OrderRepository> = Arc::new(PgOrderRepository::new(db.pool.clone()));

    // One geocoder for the whole process
    let geocoder = HttpGeocoder::with_retries(&config.geocoding).context("Failed to build geocoding client")?;

    let app_state = AppState {
        catalog: Catalog::new(catalog_repo.clone(), Arc::new(geocoder)),
        orders: OrderManager::new(catalog_repo, order_repo),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
