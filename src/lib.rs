pub mod adapters;
pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod ports;
pub mod startup;
pub mod use_cases;
pub mod utils;
pub mod validation;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware::from_fn_with_state,
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::AllowedOrigins;
use crate::health::HealthTarget;
use crate::middleware::auth::admin_auth;
use crate::middleware::request_logger::{request_logger_middleware, RequestLogConfig};
use crate::ports::{IdentityVerifier, OrderRepository, ProductRepository};
use crate::use_cases::{CreateOrder, OrderModeration};

#[derive(Clone)]
pub struct AppState {
    pub create_order: CreateOrder,
    pub moderation: OrderModeration,
    pub admin_api_key: Option<Arc<str>>,
    pub health_targets: Arc<[HealthTarget]>,
    pub allowed_origins: AllowedOrigins,
    pub log_request_body: bool,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        identity: Arc<dyn IdentityVerifier>,
        products: Arc<dyn ProductRepository>,
        orders: Arc<dyn OrderRepository>,
    ) -> Self {
        Self {
            create_order: CreateOrder::new(identity, products.clone(), orders.clone()),
            moderation: OrderModeration::new(orders, products),
            admin_api_key: None,
            health_targets: Arc::from(Vec::new()),
            allowed_origins: AllowedOrigins::Any,
            log_request_body: false,
            start_time: Instant::now(),
        }
    }

    pub fn with_admin_api_key(mut self, key: Option<String>) -> Self {
        self.admin_api_key = key.map(Arc::from);
        self
    }

    pub fn with_health_targets(mut self, targets: Vec<HealthTarget>) -> Self {
        self.health_targets = Arc::from(targets);
        self
    }

    pub fn with_allowed_origins(mut self, origins: AllowedOrigins) -> Self {
        self.allowed_origins = origins;
        self
    }

    pub fn with_request_body_logging(mut self, enabled: bool) -> Self {
        self.log_request_body = enabled;
        self
    }
}

pub fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    let allow_origin = match origins {
        AllowedOrigins::Any => AllowOrigin::any(),
        AllowedOrigins::List(list) => {
            AllowOrigin::list(list.iter().filter_map(|o| HeaderValue::from_str(o).ok()))
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("apikey"),
            HeaderName::from_static("x-client-info"),
        ])
}

pub fn create_app(state: AppState) -> Router {
    let admin = Router::new()
        .route("/orders", get(handlers::admin::list_orders))
        .route("/orders/:id", get(handlers::admin::get_order))
        .route("/orders/:id/status", patch(handlers::admin::update_status))
        .route("/orders/:id/tracking", put(handlers::admin::set_tracking))
        .route_layer(from_fn_with_state(state.clone(), admin_auth));

    let log_config = RequestLogConfig {
        log_body: state.log_request_body,
    };
    let cors = cors_layer(&state.allowed_origins);

    Router::new()
        .route("/validate-order", post(handlers::orders::create_order))
        .route("/health", get(handlers::health))
        .nest("/admin", admin)
        .layer(from_fn_with_state(log_config, request_logger_middleware))
        .layer(cors)
        .with_state(state)
}
