//! Order moderation use case.
//! Administrators move orders through the status state machine. Cancelling hands the
//! product back to the marketplace so it can be bought again.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Order, OrderStatus, StatusUpdate};
use crate::error::OrderError;
use crate::ports::{
    OrderListFilter, OrderRepository, ProductRepository, RepositoryError,
};
use crate::use_cases::create_order::RECONCILIATION_TARGET;
use crate::validation::{
    sanitize_string, validate_max_len, validate_optional_text, validate_required, ACTOR_MAX_LEN,
    NOTES_MAX_LEN, TRACKING_NUMBER_MAX_LEN,
};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone)]
pub struct StatusChange {
    pub to: OrderStatus,
    pub actor: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct OrderModeration {
    orders: Arc<dyn OrderRepository>,
    products: Arc<dyn ProductRepository>,
}

impl OrderModeration {
    pub fn new(orders: Arc<dyn OrderRepository>, products: Arc<dyn ProductRepository>) -> Self {
        Self { orders, products }
    }

    pub async fn list(
        &self,
        status: Option<OrderStatus>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Order>, OrderError> {
        let filter = OrderListFilter {
            status,
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            offset: offset.unwrap_or(0).max(0),
        };

        self.orders
            .list(filter)
            .await
            .map_err(|e| storage_failure("Failed to list orders", e))
    }

    pub async fn get(&self, id: Uuid) -> Result<Order, OrderError> {
        self.orders.get(id).await.map_err(|e| match e {
            RepositoryError::NotFound(_) => OrderError::order_not_found(),
            other => storage_failure("Failed to load order", other),
        })
    }

    pub async fn change_status(
        &self,
        id: Uuid,
        change: StatusChange,
    ) -> Result<Order, OrderError> {
        let actor = validate_optional_text("actor", change.actor.as_deref(), ACTOR_MAX_LEN)?;
        let notes = validate_optional_text("notes", change.notes.as_deref(), NOTES_MAX_LEN)?;

        let current = self.get(id).await?;
        if !current.status.can_transition_to(change.to) {
            return Err(OrderError::InvalidTransition {
                from: current.status,
                to: change.to,
            });
        }

        let update = match change.to {
            OrderStatus::Confirmed => StatusUpdate {
                status: OrderStatus::Confirmed,
                confirmed_at: Some(Utc::now()),
                confirmed_by: actor.clone(),
                notes,
            },
            to => StatusUpdate {
                notes,
                ..StatusUpdate::to(to)
            },
        };

        let updated = self
            .orders
            .update_status(id, current.status, &update)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound(_) => OrderError::order_not_found(),
                other => storage_failure("Failed to update order", other),
            })?
            .ok_or(OrderError::StaleOrder)?;

        tracing::info!(
            order_id = %id,
            from = %current.status,
            to = %updated.status,
            actor = actor.as_deref().unwrap_or("unknown"),
            "Order status changed"
        );

        if updated.status == OrderStatus::Cancelled {
            self.relist(&updated).await;
        }

        Ok(updated)
    }

    pub async fn set_tracking(&self, id: Uuid, tracking_number: &str) -> Result<Order, OrderError> {
        let tracking_number = sanitize_string(tracking_number);
        validate_required("tracking_number", &tracking_number)?;
        validate_max_len("tracking_number", &tracking_number, TRACKING_NUMBER_MAX_LEN)?;

        let current = self.get(id).await?;
        if current.status == OrderStatus::Cancelled {
            return Err(OrderError::InvalidArgument(
                "Cannot add tracking to a cancelled order".to_string(),
            ));
        }

        let updated = self
            .orders
            .set_tracking(id, &tracking_number)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound(_) => OrderError::order_not_found(),
                other => storage_failure("Failed to update order", other),
            })?;

        tracing::info!(order_id = %id, tracking_number = %tracking_number, "Tracking number set");
        Ok(updated)
    }

    /// A cancelled order frees its single unit. The status change has already been committed,
    /// so a failure here is logged for reconciliation rather than returned.
    async fn relist(&self, order: &Order) {
        match self.products.release(order.product_id).await {
            Ok(()) => tracing::info!(
                order_id = %order.id,
                product_id = %order.product_id,
                "Product released after cancellation"
            ),
            Err(e) => tracing::error!(
                target: RECONCILIATION_TARGET,
                order_id = %order.id,
                product_id = %order.product_id,
                error = %e,
                "Failed to release product after cancellation; product stays unavailable"
            ),
        }
    }
}

fn storage_failure(message: &str, err: RepositoryError) -> OrderError {
    tracing::error!(error = %err, "{}", message);
    OrderError::Internal(message.to_string())
}
