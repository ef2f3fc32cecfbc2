use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::PaymentMethod;
use crate::error::OrderError;
use crate::middleware::auth::BearerCredential;
use crate::use_cases::{CreateOrderCommand, OrderReceipt};
use crate::validation::{
    validate_optional_text, validate_quantity, validate_required, BUYER_PHONE_MAX_LEN,
    SHIPPING_ADDRESS_MAX_LEN,
};
use crate::AppState;

/// Body of `POST /validate-order`. Price, total, seller and status are never read from the
/// caller, so extra fields such as `total_amount` are ignored.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub product_id: Option<String>,
    /// `None` only when the field is missing; an explicit `null` arrives as `Some(Value::Null)`.
    #[serde(default, deserialize_with = "present")]
    pub quantity: Option<Value>,
    pub shipping_address: Option<String>,
    pub buyer_phone: Option<String>,
    pub payment_method: Option<String>,
}

impl CreateOrderRequest {
    pub fn into_command(self) -> Result<CreateOrderCommand, OrderError> {
        let product_id = self.product_id.unwrap_or_default();
        validate_required("product_id", &product_id)?;
        // An id that cannot exist is reported the same way as one that does not.
        let product_id =
            Uuid::parse_str(product_id.trim()).map_err(|_| OrderError::product_not_found())?;

        let quantity =
            validate_quantity(self.quantity.as_ref()).map_err(|e| OrderError::InvalidArgument(e.message))?;

        let payment_method = match self.payment_method.as_deref() {
            None => PaymentMethod::default(),
            Some(raw) => raw
                .parse()
                .map_err(|_| OrderError::InvalidArgument("Invalid payment method".to_string()))?,
        };

        Ok(CreateOrderCommand {
            product_id,
            quantity,
            shipping_address: validate_optional_text(
                "shipping_address",
                self.shipping_address.as_deref(),
                SHIPPING_ADDRESS_MAX_LEN,
            )?,
            buyer_phone: validate_optional_text(
                "buyer_phone",
                self.buyer_phone.as_deref(),
                BUYER_PHONE_MAX_LEN,
            )?,
            payment_method,
        })
    }
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

pub async fn create_order(
    State(state): State<AppState>,
    BearerCredential(credential): BearerCredential,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Json<OrderReceipt>, OrderError> {
    // Identity comes first so anonymous callers learn nothing about the payload rules.
    let buyer = state.create_order.authenticate(&credential).await?;

    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "Rejected order payload");
        OrderError::InvalidArgument("Invalid request body".to_string())
    })?;

    let receipt = state
        .create_order
        .place(&buyer, request.into_command()?)
        .await?;

    Ok(Json(receipt))
}
