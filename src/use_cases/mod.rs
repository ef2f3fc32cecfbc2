pub mod create_order;
pub mod moderate_order;

pub use create_order::{CreateOrder, CreateOrderCommand, OrderReceipt};
pub use moderate_order::{OrderModeration, StatusChange};
