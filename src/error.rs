use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::OrderStatus;
use crate::validation::ValidationError;

pub const UNAVAILABLE_MESSAGE: &str = "Product is no longer available";
pub const SELF_PURCHASE_MESSAGE: &str = "You cannot purchase your own product";
pub const ALREADY_RESERVED_MESSAGE: &str = "This product already has an active order. It can only be purchased after the current order is cancelled or delivered.";

/// Failures surfaced to callers of the order endpoints.
///
/// `Display` is the caller-facing message. `Internal` must only ever carry a generic message;
/// storage details are logged where the error is produced.
#[derive(Error, Debug, PartialEq)]
pub enum OrderError {
    #[error("Unauthorized")]
    Unauthenticated,

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{}", UNAVAILABLE_MESSAGE)]
    Unavailable,

    #[error("{}", ALREADY_RESERVED_MESSAGE)]
    AlreadyReserved,

    #[error("{}", SELF_PURCHASE_MESSAGE)]
    SelfPurchaseForbidden,

    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order was modified concurrently, reload and retry")]
    StaleOrder,

    #[error("{0}")]
    Internal(String),
}

impl OrderError {
    pub fn product_not_found() -> Self {
        OrderError::NotFound("Product not found".to_string())
    }

    pub fn order_not_found() -> Self {
        OrderError::NotFound("Order not found".to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            OrderError::Unauthenticated => StatusCode::UNAUTHORIZED,
            OrderError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            OrderError::NotFound(_) => StatusCode::NOT_FOUND,
            OrderError::Unavailable
            | OrderError::AlreadyReserved
            | OrderError::SelfPurchaseForbidden
            | OrderError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            OrderError::StaleOrder => StatusCode::CONFLICT,
            OrderError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationError> for OrderError {
    fn from(err: ValidationError) -> Self {
        OrderError::InvalidArgument(err.to_string())
    }
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));

        (status, body).into_response()
    }
}
