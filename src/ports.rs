//! Narrow interfaces the order service depends on. Adapters live in `crate::adapters`
//! (storage) and `crate::auth` (identity).

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Identity, NewOrder, Order, OrderStatus, Product, StatusUpdate};

/// Name of the partial unique index allowing one open order per product.
pub const OPEN_ORDER_CONSTRAINT: &str = "orders_one_open_per_product";
/// Name of the unique constraint on receipt numbers.
pub const RECEIPT_CONSTRAINT: &str = "orders_receipt_number_key";

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unique constraint violated: {}", .constraint.as_deref().unwrap_or("unknown"))]
    UniqueViolation { constraint: Option<String> },

    #[error("database error: {0}")]
    Database(String),
}

impl RepositoryError {
    pub fn violates(&self, name: &str) -> bool {
        matches!(self, RepositoryError::UniqueViolation { constraint: Some(c) } if c == name)
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                RepositoryError::UniqueViolation {
                    constraint: db_err.constraint().map(str::to_string),
                }
            }
            other => RepositoryError::Database(other.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderListFilter {
    pub status: Option<OrderStatus>,
    pub limit: i64,
    pub offset: i64,
}

/// Privileged product access. Never scoped to the caller.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Product>>;

    /// Flips `is_available` from true to false. Returns false when the product was not
    /// available at the moment of the write, which is how concurrent buyers lose the race.
    async fn reserve(&self, id: Uuid) -> RepositoryResult<bool>;

    /// Sets `is_available` back to true.
    async fn release(&self, id: Uuid) -> RepositoryResult<()>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn has_open_order(&self, product_id: Uuid) -> RepositoryResult<bool>;

    /// Inserts a pending order. Fails with `UniqueViolation` naming
    /// [`OPEN_ORDER_CONSTRAINT`] when the product already has an open order, or
    /// [`RECEIPT_CONSTRAINT`] on a receipt number collision.
    async fn insert(&self, order: &NewOrder) -> RepositoryResult<Order>;

    async fn get(&self, id: Uuid) -> RepositoryResult<Order>;

    async fn list(&self, filter: OrderListFilter) -> RepositoryResult<Vec<Order>>;

    /// Compare-and-swap on status: applies `update` only if the order is still in `expected`.
    /// `Ok(None)` means the order exists but its status moved underneath us.
    async fn update_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        update: &StatusUpdate,
    ) -> RepositoryResult<Option<Order>>;

    async fn set_tracking(&self, id: Uuid, tracking_number: &str) -> RepositoryResult<Order>;
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("malformed credential: {0}")]
    Malformed(String),

    #[error("credential rejected")]
    Rejected,

    #[error("credential expired")]
    Expired,

    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

impl IdentityError {
    /// Only provider outages count against the circuit breaker; a bad token says nothing
    /// about the provider's health.
    pub fn is_outage(&self) -> bool {
        matches!(self, IdentityError::Unavailable(_))
    }
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<Identity, IdentityError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = RepositoryError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[test]
    fn violation_matches_constraint_by_name() {
        let err = RepositoryError::UniqueViolation {
            constraint: Some(OPEN_ORDER_CONSTRAINT.to_string()),
        };
        assert!(err.violates(OPEN_ORDER_CONSTRAINT));
        assert!(!err.violates(RECEIPT_CONSTRAINT));
        assert!(!RepositoryError::UniqueViolation { constraint: None }.violates(RECEIPT_CONSTRAINT));
    }

    #[test]
    fn only_outages_trip_the_breaker() {
        assert!(IdentityError::Unavailable("timeout".into()).is_outage());
        assert!(!IdentityError::Rejected.is_outage());
        assert!(!IdentityError::Expired.is_outage());
        assert!(!IdentityError::Malformed("no dots".into()).is_outage());
    }
}
