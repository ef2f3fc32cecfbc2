use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::{Order, OrderStatus};
use crate::error::OrderError;
use crate::use_cases::StatusChange;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub status: String,
    pub actor: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrackingRequest {
    pub tracking_number: String,
}

fn parse_status(raw: &str) -> Result<OrderStatus, OrderError> {
    raw.trim()
        .parse()
        .map_err(|_| OrderError::InvalidArgument(format!("Invalid order status: {}", raw)))
}

fn parse_order_id(raw: &str) -> Result<Uuid, OrderError> {
    Uuid::parse_str(raw).map_err(|_| OrderError::order_not_found())
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, OrderError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        OrderError::InvalidArgument(format!("Invalid request body: {}", rejection.body_text()))
    })
}

pub async fn list_orders(
    State(state): State<AppState>,
    query: Result<Query<ListOrdersQuery>, QueryRejection>,
) -> Result<Json<Vec<Order>>, OrderError> {
    let Query(query) = query.map_err(|rejection| {
        OrderError::InvalidArgument(format!("Invalid query: {}", rejection.body_text()))
    })?;
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(parse_status)
        .transpose()?;

    let orders = state
        .moderation
        .list(status, query.limit, query.offset)
        .await?;

    Ok(Json(orders))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Order>, OrderError> {
    let order = state.moderation.get(parse_order_id(&id)?).await?;
    Ok(Json(order))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<StatusChangeRequest>, JsonRejection>,
) -> Result<Json<Order>, OrderError> {
    let id = parse_order_id(&id)?;
    let request = body(payload)?;

    let order = state
        .moderation
        .change_status(
            id,
            StatusChange {
                to: parse_status(&request.status)?,
                actor: request.actor,
                notes: request.notes,
            },
        )
        .await?;

    Ok(Json(order))
}

pub async fn set_tracking(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TrackingRequest>, JsonRejection>,
) -> Result<Json<Order>, OrderError> {
    let id = parse_order_id(&id)?;
    let request = body(payload)?;

    let order = state
        .moderation
        .set_tracking(id, &request.tracking_number)
        .await?;

    Ok(Json(order))
}
