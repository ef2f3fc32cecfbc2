//! In-process implementations of the ports. The binary never wires them; they back the unit
//! tests and the router harness under `tests/`, which is why they stay public. They honor the
//! same atomicity contract as the Postgres adapters: `reserve` is a compare-and-swap and
//! `insert` enforces one open order per product.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{Identity, NewOrder, Order, OrderStatus, Product, StatusUpdate};
use crate::health::{DependencyChecker, DependencyStatus};
use crate::ports::{
    IdentityError, IdentityVerifier, OrderListFilter, OrderRepository, ProductRepository,
    RepositoryError, RepositoryResult, OPEN_ORDER_CONSTRAINT, RECEIPT_CONSTRAINT,
};

#[derive(Clone, Default)]
pub struct InMemoryProductRepository {
    products: Arc<Mutex<HashMap<Uuid, Product>>>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, product: Product) {
        self.products.lock().await.insert(product.id, product);
    }

    /// Relisting is a seller action; exposed here so tests can model it.
    pub async fn set_available(&self, id: Uuid, is_available: bool) {
        if let Some(product) = self.products.lock().await.get_mut(&id) {
            product.is_available = is_available;
        }
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Product>> {
        Ok(self.products.lock().await.get(&id).cloned())
    }

    async fn reserve(&self, id: Uuid) -> RepositoryResult<bool> {
        let mut products = self.products.lock().await;
        match products.get_mut(&id) {
            Some(product) if product.is_available => {
                product.is_available = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, id: Uuid) -> RepositoryResult<()> {
        let mut products = self.products.lock().await;
        let product = products
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        product.is_available = true;
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<Mutex<Vec<Order>>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<Order> {
        self.orders.lock().await.clone()
    }

    pub async fn open_orders_for(&self, product_id: Uuid) -> usize {
        self.orders
            .lock()
            .await
            .iter()
            .filter(|o| o.product_id == product_id && o.status.is_open())
            .count()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn has_open_order(&self, product_id: Uuid) -> RepositoryResult<bool> {
        Ok(self.open_orders_for(product_id).await > 0)
    }

    async fn insert(&self, order: &NewOrder) -> RepositoryResult<Order> {
        let mut orders = self.orders.lock().await;

        if orders
            .iter()
            .any(|o| o.product_id == order.product_id && o.status.is_open())
        {
            return Err(RepositoryError::UniqueViolation {
                constraint: Some(OPEN_ORDER_CONSTRAINT.to_string()),
            });
        }
        if orders
            .iter()
            .any(|o| o.receipt_number == order.receipt_number)
        {
            return Err(RepositoryError::UniqueViolation {
                constraint: Some(RECEIPT_CONSTRAINT.to_string()),
            });
        }

        let created = order.clone().into_order();
        orders.push(created.clone());
        Ok(created)
    }

    async fn get(&self, id: Uuid) -> RepositoryResult<Order> {
        self.orders
            .lock()
            .await
            .iter()
            .find(|o| o.id == id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn list(&self, filter: OrderListFilter) -> RepositoryResult<Vec<Order>> {
        let mut matching: Vec<Order> = self
            .orders
            .lock()
            .await
            .iter()
            .filter(|o| filter.status.map_or(true, |status| o.status == status))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(matching
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        update: &StatusUpdate,
    ) -> RepositoryResult<Option<Order>> {
        let mut orders = self.orders.lock().await;
        let order = orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        if order.status != expected {
            return Ok(None);
        }
        update.apply(order, Utc::now());
        Ok(Some(order.clone()))
    }

    async fn set_tracking(&self, id: Uuid, tracking_number: &str) -> RepositoryResult<Order> {
        let mut orders = self.orders.lock().await;
        let order = orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        order.tracking_number = Some(tracking_number.to_string());
        order.updated_at = Utc::now();
        Ok(order.clone())
    }
}

/// Resolves a fixed set of bearer tokens.
#[derive(Clone, Default)]
pub struct StaticIdentityVerifier {
    tokens: HashMap<String, Identity>,
}

impl StaticIdentityVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, token: impl Into<String>, user_id: Uuid) -> Self {
        self.tokens.insert(
            token.into(),
            Identity {
                user_id,
                email: None,
            },
        );
        self
    }
}

#[async_trait]
impl IdentityVerifier for StaticIdentityVerifier {
    async fn verify(&self, credential: &str) -> Result<Identity, IdentityError> {
        self.tokens
            .get(credential)
            .cloned()
            .ok_or(IdentityError::Rejected)
    }
}

/// Always-healthy checker for routers that run without a database.
pub struct InMemoryChecker;

#[async_trait]
impl DependencyChecker for InMemoryChecker {
    async fn check(&self) -> DependencyStatus {
        DependencyStatus::Healthy {
            status: "healthy".to_string(),
            latency_ms: 0,
        }
    }
}
