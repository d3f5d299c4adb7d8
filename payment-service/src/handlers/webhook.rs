//! Razorpay webhook endpoint.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde::Serialize;
use service_core::error::AppError;

use crate::{services::metrics, AppState};

pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";
pub const EVENT_ID_HEADER: &str = "x-razorpay-event-id";

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Receive and apply one gateway webhook delivery.
///
/// The body is consumed as raw bytes and stays raw until the HMAC over those
/// exact bytes has been verified; parsing happens afterwards. Duplicate and
/// unknown events are acknowledged with 200 like applied ones, since any
/// non-2xx makes the gateway redeliver indefinitely.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("webhook delivery without signature header");
            AppError::BadRequest(anyhow::anyhow!("Missing signature"))
        })?;

    // No detail on why a signature mismatched; a distinguishing error would
    // hand an oracle to whoever is forging deliveries.
    if !state.razorpay.verify_webhook_signature(&body, signature)? {
        tracing::warn!("webhook signature mismatch");
        return Err(AppError::BadRequest(anyhow::anyhow!("Invalid signature")));
    }

    let event = state.razorpay.parse_webhook_event(&body)?;
    let event_id = headers.get(EVENT_ID_HEADER).and_then(|v| v.to_str().ok());

    tracing::info!(
        event_type = %event.event,
        event_id = ?event_id,
        "Processing gateway webhook"
    );

    let outcome = state.reconciler.apply(&event, event_id).await?;
    metrics::record_webhook_event(&event.event, outcome.as_str());

    tracing::info!(
        event_type = %event.event,
        outcome = outcome.as_str(),
        "Webhook resolved"
    );

    Ok(Json(WebhookAck { received: true }))
}
