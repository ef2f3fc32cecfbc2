#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use bigdecimal::BigDecimal;
use campus_market::adapters::memory::{
    InMemoryChecker, InMemoryOrderRepository, InMemoryProductRepository, StaticIdentityVerifier,
};
use campus_market::domain::Product;
use campus_market::health::HealthTarget;
use campus_market::{create_app, AppState};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const ADMIN_KEY: &str = "test-admin-key";
pub const BUYER_TOKEN: &str = "buyer-token";
pub const SELLER_TOKEN: &str = "seller-token";
pub const OTHER_BUYER_TOKEN: &str = "other-buyer-token";

pub struct TestApp {
    pub app: Router,
    pub products: InMemoryProductRepository,
    pub orders: InMemoryOrderRepository,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub other_buyer_id: Uuid,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_extra_buyers(&[]).await
    }

    /// Builds the router with one extra identity per `(token, user_id)` pair.
    pub async fn with_extra_buyers(extra: &[(String, Uuid)]) -> Self {
        let buyer_id = Uuid::new_v4();
        let seller_id = Uuid::new_v4();
        let other_buyer_id = Uuid::new_v4();

        let mut identity = StaticIdentityVerifier::new()
            .with_user(BUYER_TOKEN, buyer_id)
            .with_user(SELLER_TOKEN, seller_id)
            .with_user(OTHER_BUYER_TOKEN, other_buyer_id);
        for (token, user_id) in extra {
            identity = identity.with_user(token.clone(), *user_id);
        }

        let products = InMemoryProductRepository::new();
        let orders = InMemoryOrderRepository::new();

        let state = AppState::new(
            Arc::new(identity),
            Arc::new(products.clone()),
            Arc::new(orders.clone()),
        )
        .with_admin_api_key(Some(ADMIN_KEY.to_string()))
        .with_health_targets(vec![HealthTarget {
            name: "store",
            critical: true,
            checker: Arc::new(InMemoryChecker),
        }]);

        TestApp {
            app: create_app(state),
            products,
            orders,
            buyer_id,
            seller_id,
            other_buyer_id,
        }
    }

    pub async fn list_product(&self, name: &str, price: &str) -> Product {
        let product = Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            price: BigDecimal::from_str(price).unwrap(),
            is_available: true,
            seller_id: self.seller_id,
        };
        self.products.put(product.clone()).await;
        product
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        send(&self.app, request).await
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

pub fn order_request(token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/validate-order")
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn admin_request(method: &str, uri: &str, key: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        builder = builder.header("authorization", format!("Bearer {}", key));
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
