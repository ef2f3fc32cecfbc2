//! Create order use case.
//! Turns a purchase attempt into a priced, reserved order. Price, total, seller and status are
//! always derived server-side; the caller only chooses the product and shipping details.

use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::receipt::generate_receipt_number;
use crate::domain::{Identity, NewOrder, Order, PaymentMethod, Product};
use crate::error::OrderError;
use crate::ports::{
    IdentityError, IdentityVerifier, OrderRepository, ProductRepository, OPEN_ORDER_CONSTRAINT,
    RECEIPT_CONSTRAINT,
};

pub const RECONCILIATION_TARGET: &str = "campus_market::reconciliation";
const RECEIPT_ATTEMPTS: u32 = 3;
const VALIDATE_FAILED: &str = "Failed to validate order";
const CREATE_FAILED: &str = "Failed to create order";

/// Validated input for a purchase.
#[derive(Debug, Clone)]
pub struct CreateOrderCommand {
    pub product_id: Uuid,
    pub quantity: u32,
    pub shipping_address: Option<String>,
    pub buyer_phone: Option<String>,
    pub payment_method: PaymentMethod,
}

/// What the buyer gets back: the stored order plus the figures it was priced with.
#[derive(Debug, Clone, Serialize)]
pub struct OrderReceipt {
    pub order: Order,
    pub product_name: String,
    #[serde(serialize_with = "crate::utils::money::serialize")]
    pub validated_price: BigDecimal,
    #[serde(serialize_with = "crate::utils::money::serialize")]
    pub validated_total: BigDecimal,
    pub receipt_number: String,
}

#[derive(Clone)]
pub struct CreateOrder {
    identity: Arc<dyn IdentityVerifier>,
    products: Arc<dyn ProductRepository>,
    orders: Arc<dyn OrderRepository>,
}

impl CreateOrder {
    pub fn new(
        identity: Arc<dyn IdentityVerifier>,
        products: Arc<dyn ProductRepository>,
        orders: Arc<dyn OrderRepository>,
    ) -> Self {
        Self {
            identity,
            products,
            orders,
        }
    }

    /// Full contract: resolve the caller, then place the order.
    pub async fn execute(
        &self,
        credential: &str,
        command: CreateOrderCommand,
    ) -> Result<OrderReceipt, OrderError> {
        let buyer = self.authenticate(credential).await?;
        self.place(&buyer, command).await
    }

    pub async fn authenticate(&self, credential: &str) -> Result<Identity, OrderError> {
        match self.identity.verify(credential).await {
            Ok(identity) => Ok(identity),
            Err(IdentityError::Unavailable(reason)) => {
                tracing::error!(error = %reason, "Identity provider unavailable");
                Err(OrderError::Internal("Internal server error".to_string()))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Credential verification failed");
                Err(OrderError::Unauthenticated)
            }
        }
    }

    pub async fn place(
        &self,
        buyer: &Identity,
        command: CreateOrderCommand,
    ) -> Result<OrderReceipt, OrderError> {
        tracing::info!(
            buyer_id = %buyer.user_id,
            product_id = %command.product_id,
            quantity = command.quantity,
            payment_method = %command.payment_method,
            "Validating order"
        );

        let product = self
            .products
            .get(command.product_id)
            .await
            .map_err(|e| {
                tracing::error!(product_id = %command.product_id, error = %e, "Product lookup failed");
                OrderError::Internal(VALIDATE_FAILED.to_string())
            })?
            .ok_or_else(|| {
                tracing::info!(product_id = %command.product_id, "Product not found");
                OrderError::product_not_found()
            })?;

        if !product.is_available {
            tracing::info!(product_id = %product.id, "Product not available");
            return Err(OrderError::Unavailable);
        }

        if product.seller_id == buyer.user_id {
            tracing::info!(product_id = %product.id, "Seller attempted to buy own product");
            return Err(OrderError::SelfPurchaseForbidden);
        }

        let has_open_order = self
            .orders
            .has_open_order(product.id)
            .await
            .map_err(|e| {
                tracing::error!(product_id = %product.id, error = %e, "Open order lookup failed");
                OrderError::Internal(VALIDATE_FAILED.to_string())
            })?;
        if has_open_order {
            tracing::info!(product_id = %product.id, "Product has an active order");
            return Err(OrderError::AlreadyReserved);
        }

        let total = product.total_for(command.quantity);
        tracing::info!(
            product_id = %product.id,
            price = %product.price,
            quantity = command.quantity,
            total = %total,
            "Calculated total"
        );

        // From here on the store is mutated; run on a detached task so a dropped client
        // connection cannot stop us between reservation and insert/compensation.
        let this = self.clone();
        let buyer_id = buyer.user_id;
        let reserved_product = product.clone();
        let reserved_total = total.clone();
        let order = tokio::spawn(async move {
            this.reserve_and_record(buyer_id, &reserved_product, reserved_total, command)
                .await
        })
        .await
        .map_err(|e| {
            tracing::error!(product_id = %product.id, error = %e, "Order task aborted");
            OrderError::Internal(CREATE_FAILED.to_string())
        })??;

        tracing::info!(
            order_id = %order.id,
            receipt_number = %order.receipt_number,
            "Order created successfully"
        );

        Ok(OrderReceipt {
            receipt_number: order.receipt_number.clone(),
            order,
            product_name: product.name,
            validated_price: product.price,
            validated_total: total,
        })
    }

    async fn reserve_and_record(
        &self,
        buyer_id: Uuid,
        product: &Product,
        total: BigDecimal,
        command: CreateOrderCommand,
    ) -> Result<Order, OrderError> {
        let reserved = self.products.reserve(product.id).await.map_err(|e| {
            tracing::error!(product_id = %product.id, error = %e, "Reservation failed");
            OrderError::Internal(CREATE_FAILED.to_string())
        })?;
        if !reserved {
            tracing::info!(product_id = %product.id, "Lost reservation race");
            return Err(OrderError::Unavailable);
        }

        match self.insert_order(buyer_id, product, total, command).await {
            Ok(order) => Ok(order),
            Err(err) => {
                self.release_reservation(product.id).await;
                Err(err)
            }
        }
    }

    async fn insert_order(
        &self,
        buyer_id: Uuid,
        product: &Product,
        total: BigDecimal,
        command: CreateOrderCommand,
    ) -> Result<Order, OrderError> {
        let id = Uuid::new_v4();
        let mut attempt = 1;

        loop {
            let now = Utc::now();
            let new_order = NewOrder {
                id,
                receipt_number: generate_receipt_number(now),
                buyer_id,
                seller_id: product.seller_id,
                product_id: product.id,
                total_amount: total.clone(),
                shipping_address: command.shipping_address.clone(),
                buyer_phone: command.buyer_phone.clone(),
                payment_method: command.payment_method,
                created_at: now,
            };

            match self.orders.insert(&new_order).await {
                Ok(order) => return Ok(order),
                Err(e) if e.violates(RECEIPT_CONSTRAINT) && attempt < RECEIPT_ATTEMPTS => {
                    tracing::warn!(
                        receipt_number = %new_order.receipt_number,
                        attempt,
                        "Receipt number collision, regenerating"
                    );
                    attempt += 1;
                }
                Err(e) if e.violates(OPEN_ORDER_CONSTRAINT) => {
                    tracing::info!(product_id = %product.id, "Open order constraint rejected insert");
                    return Err(OrderError::AlreadyReserved);
                }
                Err(e) => {
                    tracing::error!(product_id = %product.id, error = %e, "Order creation failed");
                    return Err(OrderError::Internal(CREATE_FAILED.to_string()));
                }
            }
        }
    }

    async fn release_reservation(&self, product_id: Uuid) {
        match self.products.release(product_id).await {
            Ok(()) => tracing::info!(product_id = %product_id, "Reservation released"),
            Err(e) => tracing::error!(
                target: RECONCILIATION_TARGET,
                product_id = %product_id,
                error = %e,
                "Failed to release reservation; product is unavailable with no order and needs manual reconciliation"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryOrderRepository, InMemoryProductRepository, StaticIdentityVerifier,
    };
    use crate::domain::{OrderStatus, StatusUpdate};
    use crate::ports::{OrderListFilter, RepositoryError, RepositoryResult};
    use async_trait::async_trait;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicU32, Ordering};

    const BUYER_TOKEN: &str = "buyer-token";
    const SELLER_TOKEN: &str = "seller-token";

    struct Fixture {
        service: CreateOrder,
        products: InMemoryProductRepository,
        orders: InMemoryOrderRepository,
        product: Product,
        buyer: Uuid,
    }

    async fn fixture_with(
        orders_port: Option<Arc<dyn OrderRepository>>,
        products_port: Option<Arc<dyn ProductRepository>>,
    ) -> Fixture {
        let buyer = Uuid::new_v4();
        let seller = Uuid::new_v4();
        let products = InMemoryProductRepository::new();
        let orders = InMemoryOrderRepository::new();
        let product = Product {
            id: Uuid::new_v4(),
            name: "Engineering Drawing Kit".to_string(),
            price: BigDecimal::from(500),
            is_available: true,
            seller_id: seller,
        };
        products.put(product.clone()).await;

        let identity = StaticIdentityVerifier::new()
            .with_user(BUYER_TOKEN, buyer)
            .with_user(SELLER_TOKEN, seller);
        let service = CreateOrder::new(
            Arc::new(identity),
            products_port.unwrap_or_else(|| Arc::new(products.clone()) as Arc<dyn ProductRepository>),
            orders_port.unwrap_or_else(|| Arc::new(orders.clone()) as Arc<dyn OrderRepository>),
        );

        Fixture {
            service,
            products,
            orders,
            product,
            buyer,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(None, None).await
    }

    fn command(product_id: Uuid) -> CreateOrderCommand {
        CreateOrderCommand {
            product_id,
            quantity: 1,
            shipping_address: Some("Hostel B, Room 214".to_string()),
            buyer_phone: Some("9876543210".to_string()),
            payment_method: PaymentMethod::Cod,
        }
    }

    async fn is_available(products: &InMemoryProductRepository, id: Uuid) -> bool {
        products.get(id).await.unwrap().unwrap().is_available
    }

    #[tokio::test]
    async fn creates_priced_pending_order() {
        let f = fixture().await;

        let receipt = f
            .service
            .execute(BUYER_TOKEN, command(f.product.id))
            .await
            .unwrap();

        assert_eq!(receipt.order.status, OrderStatus::Pending);
        assert_eq!(receipt.order.total_amount, BigDecimal::from(500));
        assert_eq!(receipt.order.buyer_id, f.buyer);
        assert_eq!(receipt.order.seller_id, f.product.seller_id);
        assert_eq!(receipt.validated_price, BigDecimal::from(500));
        assert_eq!(receipt.validated_total, BigDecimal::from(500));
        assert_eq!(receipt.product_name, "Engineering Drawing Kit");
        assert_eq!(receipt.receipt_number, receipt.order.receipt_number);
        assert!(receipt.receipt_number.starts_with("RCP-"));
        assert!(!is_available(&f.products, f.product.id).await);
        assert_eq!(f.orders.open_orders_for(f.product.id).await, 1);
    }

    #[tokio::test]
    async fn total_uses_stored_decimal_price() {
        let f = fixture().await;
        let mut product = f.product.clone();
        product.price = BigDecimal::from_str("1249.99").unwrap();
        f.products.put(product).await;

        let receipt = f
            .service
            .execute(BUYER_TOKEN, command(f.product.id))
            .await
            .unwrap();

        assert_eq!(
            receipt.order.total_amount,
            BigDecimal::from_str("1249.99").unwrap()
        );
    }

    #[tokio::test]
    async fn unknown_credential_is_unauthenticated() {
        let f = fixture().await;

        let err = f
            .service
            .execute("forged", command(f.product.id))
            .await
            .unwrap_err();

        assert_eq!(err, OrderError::Unauthenticated);
        assert!(f.orders.all().await.is_empty());
        assert!(is_available(&f.products, f.product.id).await);
    }

    #[tokio::test]
    async fn missing_product_is_not_found() {
        let f = fixture().await;

        let err = f
            .service
            .execute(BUYER_TOKEN, command(Uuid::new_v4()))
            .await
            .unwrap_err();

        assert_eq!(err, OrderError::product_not_found());
    }

    #[tokio::test]
    async fn unavailable_product_is_rejected() {
        let f = fixture().await;
        f.products.set_available(f.product.id, false).await;

        let err = f
            .service
            .execute(BUYER_TOKEN, command(f.product.id))
            .await
            .unwrap_err();

        assert_eq!(err, OrderError::Unavailable);
        assert!(f.orders.all().await.is_empty());
    }

    #[tokio::test]
    async fn seller_cannot_buy_own_product() {
        let f = fixture().await;

        let err = f
            .service
            .execute(SELLER_TOKEN, command(f.product.id))
            .await
            .unwrap_err();

        assert_eq!(err, OrderError::SelfPurchaseForbidden);
        assert_eq!(err.to_string(), "You cannot purchase your own product");
        assert!(f.orders.all().await.is_empty());
        assert!(is_available(&f.products, f.product.id).await);
    }

    #[tokio::test]
    async fn second_purchase_is_rejected() {
        let f = fixture().await;
        f.service
            .execute(BUYER_TOKEN, command(f.product.id))
            .await
            .unwrap();

        let err = f
            .service
            .execute(BUYER_TOKEN, command(f.product.id))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrderError::Unavailable | OrderError::AlreadyReserved
        ));
        assert_eq!(f.orders.all().await.len(), 1);
    }

    #[tokio::test]
    async fn open_order_blocks_even_if_product_marked_available() {
        let f = fixture().await;
        f.service
            .execute(BUYER_TOKEN, command(f.product.id))
            .await
            .unwrap();
        // An admin flipping availability by hand must not enable a second open order.
        f.products.set_available(f.product.id, true).await;

        let err = f
            .service
            .execute(BUYER_TOKEN, command(f.product.id))
            .await
            .unwrap_err();

        assert_eq!(err, OrderError::AlreadyReserved);
        assert_eq!(f.orders.open_orders_for(f.product.id).await, 1);
    }

    #[tokio::test]
    async fn repurchase_allowed_after_cancellation() {
        let f = fixture().await;
        let first = f
            .service
            .execute(BUYER_TOKEN, command(f.product.id))
            .await
            .unwrap();
        f.orders
            .update_status(
                first.order.id,
                OrderStatus::Pending,
                &StatusUpdate::to(OrderStatus::Cancelled),
            )
            .await
            .unwrap();
        f.products.set_available(f.product.id, true).await;

        let second = f
            .service
            .execute(BUYER_TOKEN, command(f.product.id))
            .await
            .unwrap();

        assert_ne!(first.order.id, second.order.id);
        assert_eq!(f.orders.open_orders_for(f.product.id).await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_buyers_get_exactly_one_order() {
        let f = fixture().await;
        let mut identity = StaticIdentityVerifier::new();
        let mut tokens = Vec::new();
        for i in 0..16 {
            let token = format!("buyer-{i}");
            identity = identity.with_user(token.clone(), Uuid::new_v4());
            tokens.push(token);
        }
        let service = CreateOrder::new(
            Arc::new(identity),
            Arc::new(f.products.clone()),
            Arc::new(f.orders.clone()),
        );

        let attempts = tokens.into_iter().map(|token| {
            let service = service.clone();
            let product_id = f.product.id;
            tokio::spawn(async move { service.execute(&token, command(product_id)).await })
        });
        let results = futures::future::join_all(attempts).await;

        let mut successes = 0;
        for result in results {
            match result.unwrap() {
                Ok(_) => successes += 1,
                Err(OrderError::Unavailable) | Err(OrderError::AlreadyReserved) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(f.orders.open_orders_for(f.product.id).await, 1);
        assert!(!is_available(&f.products, f.product.id).await);
    }

    /// Delegates to the in-memory store but can be told to fail inserts.
    struct FlakyOrders {
        inner: InMemoryOrderRepository,
        fail_inserts: bool,
        receipt_collisions: AtomicU32,
    }

    #[async_trait]
    impl OrderRepository for FlakyOrders {
        async fn has_open_order(&self, product_id: Uuid) -> RepositoryResult<bool> {
            self.inner.has_open_order(product_id).await
        }

        async fn insert(&self, order: &NewOrder) -> RepositoryResult<Order> {
            if self.fail_inserts {
                return Err(RepositoryError::Database("connection reset".to_string()));
            }
            if self
                .receipt_collisions
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(RepositoryError::UniqueViolation {
                    constraint: Some(RECEIPT_CONSTRAINT.to_string()),
                });
            }
            self.inner.insert(order).await
        }

        async fn get(&self, id: Uuid) -> RepositoryResult<Order> {
            self.inner.get(id).await
        }

        async fn list(&self, filter: OrderListFilter) -> RepositoryResult<Vec<Order>> {
            self.inner.list(filter).await
        }

        async fn update_status(
            &self,
            id: Uuid,
            expected: OrderStatus,
            update: &StatusUpdate,
        ) -> RepositoryResult<Option<Order>> {
            self.inner.update_status(id, expected, update).await
        }

        async fn set_tracking(&self, id: Uuid, tracking_number: &str) -> RepositoryResult<Order> {
            self.inner.set_tracking(id, tracking_number).await
        }
    }

    #[tokio::test]
    async fn failed_insert_restores_availability() {
        let orders = InMemoryOrderRepository::new();
        let flaky: Arc<dyn OrderRepository> = Arc::new(FlakyOrders {
            inner: orders.clone(),
            fail_inserts: true,
            receipt_collisions: AtomicU32::new(0),
        });
        let f = fixture_with(Some(flaky), None).await;

        let err = f
            .service
            .execute(BUYER_TOKEN, command(f.product.id))
            .await
            .unwrap_err();

        assert_eq!(err, OrderError::Internal(CREATE_FAILED.to_string()));
        assert!(is_available(&f.products, f.product.id).await);
        assert!(orders.all().await.is_empty());
    }

    #[tokio::test]
    async fn receipt_collision_is_retried() {
        let orders = InMemoryOrderRepository::new();
        let flaky: Arc<dyn OrderRepository> = Arc::new(FlakyOrders {
            inner: orders.clone(),
            fail_inserts: false,
            receipt_collisions: AtomicU32::new(RECEIPT_ATTEMPTS - 1),
        });
        let f = fixture_with(Some(flaky), None).await;

        let receipt = f
            .service
            .execute(BUYER_TOKEN, command(f.product.id))
            .await
            .unwrap();

        assert_eq!(orders.all().await, vec![receipt.order]);
    }

    #[tokio::test]
    async fn exhausted_receipt_attempts_release_reservation() {
        let orders = InMemoryOrderRepository::new();
        let flaky: Arc<dyn OrderRepository> = Arc::new(FlakyOrders {
            inner: orders.clone(),
            fail_inserts: false,
            receipt_collisions: AtomicU32::new(RECEIPT_ATTEMPTS),
        });
        let f = fixture_with(Some(flaky), None).await;

        let err = f
            .service
            .execute(BUYER_TOKEN, command(f.product.id))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::Internal(_)));
        assert!(is_available(&f.products, f.product.id).await);
        assert!(orders.all().await.is_empty());
    }

    /// Product store whose release always fails, to exercise the reconciliation path.
    struct StuckProducts {
        inner: InMemoryProductRepository,
    }

    #[async_trait]
    impl ProductRepository for StuckProducts {
        async fn get(&self, id: Uuid) -> RepositoryResult<Option<Product>> {
            self.inner.get(id).await
        }

        async fn reserve(&self, id: Uuid) -> RepositoryResult<bool> {
            self.inner.reserve(id).await
        }

        async fn release(&self, _id: Uuid) -> RepositoryResult<()> {
            Err(RepositoryError::Database("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn failed_release_still_reports_internal_error() {
        let orders: Arc<dyn OrderRepository> = Arc::new(FlakyOrders {
            inner: InMemoryOrderRepository::new(),
            fail_inserts: true,
            receipt_collisions: AtomicU32::new(0),
        });
        let products = InMemoryProductRepository::new();
        let stuck: Arc<dyn ProductRepository> = Arc::new(StuckProducts {
            inner: products.clone(),
        });
        let f = fixture_with(Some(orders), Some(stuck)).await;
        // fixture seeded its own store; mirror the product into the one behind `stuck`
        products.put(f.product.clone()).await;

        let err = f
            .service
            .execute(BUYER_TOKEN, command(f.product.id))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::Internal(_)));
        assert!(!is_available(&products, f.product.id).await);
    }
}
