use async_trait::async_trait;
use uuid::Uuid;
use railway_core::repository::StoreResult;
use crate::models::Order;

/// Repository trait for order data access
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist an order and all of its tickets atomically.
    ///
    /// Implementations open one transaction, write the order, then each ticket in
    /// order: the ticket is checked against its journey's train
    /// ([`Ticket::full_clean`](crate::models::Ticket::full_clean)) and inserted under
    /// the `(journey, cargo, seat)` uniqueness constraint. The first failure aborts
    /// the transaction and nothing from this order becomes visible.
    async fn create_order(&self, order: &Order) -> StoreResult<()>;

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>>;

    /// Orders owned by `user_id`, newest first
    async fn list_orders(&self, user_id: &str) -> StoreResult<Vec<Order>>;
}
