pub mod models;
pub mod manager;
pub mod repository;

pub use models::{Order, Ticket, TicketRequest};
pub use manager::{OrderError, OrderManager, TicketFieldError};
pub use repository::OrderRepository;
