pub mod app_config;
pub mod database;
pub mod catalog_repo;
pub mod order_repo;
pub mod memory;
pub mod geocoder;

pub use app_config::Config;
pub use database::DbClient;
pub use catalog_repo::PgCatalogRepository;
pub use order_repo::PgOrderRepository;
pub use memory::MemoryStore;
pub use geocoder::HttpGeocoder;
