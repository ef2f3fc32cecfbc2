//! Storage adapters implementing the repository ports.

pub mod memory;
pub mod postgres_order_repository;
pub mod postgres_product_repository;

pub use postgres_order_repository::PostgresOrderRepository;
pub use postgres_product_repository::PostgresProductRepository;
