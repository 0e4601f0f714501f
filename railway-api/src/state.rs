use railway_core::Catalog;
use railway_order::OrderManager;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub orders: OrderManager,
    pub auth: AuthConfig,
}
