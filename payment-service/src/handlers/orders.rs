//! Order creation and status lookup.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    middleware::AuthContext,
    models::{PaymentRecord, PaymentStatus},
    services::metrics,
    services::razorpay::RazorpayOrder,
    AppState,
};

fn default_currency() -> String {
    "INR".to_string()
}

/// Request to create a new payment order.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    /// Amount in major units (rupees for INR).
    #[validate(range(min = 0.01))]
    pub amount: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    /// Gateway order payload (the frontend feeds this into checkout).
    pub order: RazorpayOrder,
    /// The ledger record created for this order.
    pub payment: PaymentRecordResponse,
}

#[derive(Debug, Serialize)]
pub struct PaymentRecordResponse {
    pub id: Uuid,
    pub gateway_order_id: String,
    pub gateway_payment_id: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub status: PaymentStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl From<PaymentRecord> for PaymentRecordResponse {
    fn from(record: PaymentRecord) -> Self {
        Self {
            id: record.id,
            gateway_order_id: record.gateway_order_id,
            gateway_payment_id: record.gateway_payment_id,
            amount: record.amount,
            currency: record.currency,
            status: record.status,
            created_at: record.created_at.to_string(),
            updated_at: record.updated_at.to_string(),
        }
    }
}

/// Create a gateway order and its `CREATED` ledger record.
///
/// The gateway call happens first: a gateway failure (or timeout) surfaces
/// to the caller and persists nothing, so the ledger never holds a record
/// without a corresponding remote order.
pub async fn create_order(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>, AppError> {
    payload
        .validate()
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid amount")))?;
    let amount = payload
        .amount
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid amount")))?;

    tracing::info!(
        user_id = %auth.user_id,
        amount = amount,
        currency = %payload.currency,
        "Creating payment order"
    );

    // The gateway counts in minor units; notes carry the user id so the
    // webhook path can correlate the payment back to its owner.
    let amount_minor = (amount * 100.0).round() as u64;
    let receipt = format!("receipt_{}", Utc::now().timestamp_millis());
    let notes = serde_json::json!({ "userId": auth.user_id });

    let order = state
        .razorpay
        .create_order(amount_minor, &payload.currency, Some(receipt), Some(notes))
        .await?;

    let now = DateTime::now();
    let record = PaymentRecord {
        id: Uuid::new_v4(),
        gateway_order_id: order.id.clone(),
        gateway_payment_id: None,
        user_id: auth.user_id.clone(),
        amount,
        currency: payload.currency.clone(),
        status: PaymentStatus::Created,
        event_id: None,
        created_at: now,
        updated_at: now,
    };

    state
        .repository
        .create_payment(record.clone())
        .await
        .map_err(AppError::DatabaseError)?;

    metrics::record_order(&record.currency);

    tracing::info!(
        payment_id = %record.id,
        gateway_order_id = %order.id,
        "Payment order created"
    );

    Ok(Json(CreateOrderResponse {
        order,
        payment: record.into(),
    }))
}

/// Fetch the ledger record for a gateway order (status polling).
pub async fn get_order(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(order_id): Path<String>,
) -> Result<Json<PaymentRecordResponse>, AppError> {
    let record = state
        .repository
        .find_by_order_id(&order_id)
        .await
        .map_err(AppError::DatabaseError)?
        .filter(|record| record.user_id == auth.user_id)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;

    Ok(Json(record.into()))
}
