//! Framework-agnostic domain types.

pub mod identity;
pub mod order;
pub mod product;
pub mod receipt;

pub use identity::Identity;
pub use order::{NewOrder, Order, OrderStatus, PaymentMethod, StatusUpdate};
pub use product::Product;
