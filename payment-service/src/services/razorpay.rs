//! Razorpay payment gateway client.
//!
//! Implements the Orders API for payment initiation and webhook signature
//! verification for asynchronous payment notifications.

use crate::config::RazorpayConfig;
use anyhow::anyhow;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use service_core::utils::signature;
use std::time::Duration;

/// Bound on every outbound gateway call. A timed-out order creation must
/// surface before any ledger write happens.
const GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    config: RazorpayConfig,
}

/// Request to create a Razorpay order.
#[derive(Debug, Serialize)]
pub struct CreateOrderRequest {
    /// Amount in the smallest currency unit (paise for INR).
    pub amount: u64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<serde_json::Value>,
}

/// Order payload as returned by Razorpay; echoed to the order-creation
/// caller, so it serializes both ways.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RazorpayOrder {
    pub id: String,
    pub entity: String,
    pub amount: u64,
    pub amount_paid: u64,
    pub amount_due: u64,
    pub currency: String,
    pub receipt: Option<String>,
    pub status: String,
    pub attempts: u32,
    pub notes: Option<serde_json::Value>,
    pub created_at: u64,
}

/// Razorpay API error envelope.
#[derive(Debug, Deserialize)]
pub struct RazorpayError {
    pub error: RazorpayErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct RazorpayErrorDetail {
    pub code: String,
    pub description: String,
    pub source: Option<String>,
    pub step: Option<String>,
    pub reason: Option<String>,
}

/// Webhook event envelope. `event` is a free-form tag ("payment.captured",
/// "payment.failed", ...); payload fields are optional so unknown event
/// shapes still deserialize.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub entity: String,
    #[serde(default)]
    pub account_id: Option<String>,
    pub event: String,
    #[serde(default)]
    pub contains: Vec<String>,
    #[serde(default)]
    pub payload: WebhookPayload,
    #[serde(default)]
    pub created_at: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment: Option<WebhookPaymentEntity>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPaymentEntity {
    pub entity: PaymentEntity,
}

/// Razorpay payment entity carried in webhook payloads.
#[derive(Debug, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    pub entity: String,
    /// Amount in the smallest currency unit.
    pub amount: u64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    /// Order notes echoed back by the gateway; carries the correlation
    /// `userId` set at order-creation time.
    #[serde(default)]
    pub notes: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<u64>,
    #[serde(default)]
    pub captured: Option<bool>,
}

impl PaymentEntity {
    /// Recover the paying user from the echoed order notes.
    ///
    /// Notes are untyped (Razorpay serializes empty notes as an array), so
    /// this tolerates any shape and returns None when no `userId` exists.
    pub fn correlated_user_id(&self) -> Option<&str> {
        self.notes
            .as_ref()
            .and_then(|notes| notes.get("userId"))
            .and_then(|value| value.as_str())
    }
}

impl RazorpayClient {
    pub fn new(config: RazorpayConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Check if Razorpay credentials are set.
    pub fn is_configured(&self) -> bool {
        !self.config.key_id.is_empty() && !self.config.key_secret.expose_secret().is_empty()
    }

    /// Create a new order in Razorpay.
    ///
    /// # Arguments
    /// * `amount` - Amount in smallest currency unit (paise for INR)
    /// * `currency` - Currency code (e.g., "INR")
    /// * `receipt` - Optional receipt ID for tracking
    /// * `notes` - Optional notes; must carry `userId` so webhooks can be
    ///   correlated back to the paying user
    pub async fn create_order(
        &self,
        amount: u64,
        currency: &str,
        receipt: Option<String>,
        notes: Option<serde_json::Value>,
    ) -> Result<RazorpayOrder, AppError> {
        if !self.is_configured() {
            return Err(AppError::InternalError(anyhow!(
                "Razorpay credentials not configured"
            )));
        }

        let request = CreateOrderRequest {
            amount,
            currency: currency.to_string(),
            receipt,
            notes,
        };

        let url = format!("{}/orders", self.config.api_base_url);

        let response = self
            .client
            .post(&url)
            .timeout(GATEWAY_TIMEOUT)
            .basic_auth(
                &self.config.key_id,
                Some(self.config.key_secret.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Razorpay order request failed");
                AppError::GatewayError("Payment gateway unavailable".to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::InternalError(e.into()))?;

        tracing::debug!(status = %status, "Razorpay create_order response");

        if status.is_success() {
            let order: RazorpayOrder =
                serde_json::from_str(&body).map_err(|e| AppError::InternalError(e.into()))?;
            tracing::info!(
                order_id = %order.id,
                amount = order.amount,
                currency = %order.currency,
                "Razorpay order created"
            );
            Ok(order)
        } else {
            let error: RazorpayError =
                serde_json::from_str(&body).unwrap_or_else(|_| RazorpayError {
                    error: RazorpayErrorDetail {
                        code: "UNKNOWN".to_string(),
                        description: "Payment gateway rejected the order".to_string(),
                        source: None,
                        step: None,
                        reason: None,
                    },
                });
            tracing::error!(
                code = %error.error.code,
                description = %error.error.description,
                "Razorpay order creation failed"
            );
            Err(AppError::GatewayError(error.error.description))
        }
    }

    /// Verify a webhook signature over the exact raw request body.
    ///
    /// The MAC is `HMAC-SHA256(raw_body, webhook_secret)`, hex-encoded, and
    /// is compared in constant time. Callers must pass the body bytes as
    /// received, before any structured parsing.
    pub fn verify_webhook_signature(
        &self,
        body: &[u8],
        signature_header: &str,
    ) -> Result<bool, AppError> {
        signature::verify_signature(
            self.config.webhook_secret.expose_secret(),
            body,
            signature_header,
        )
        .map_err(AppError::InternalError)
    }

    /// Parse a webhook event from the (already verified) request body.
    pub fn parse_webhook_event(&self, body: &[u8]) -> Result<WebhookEvent, AppError> {
        serde_json::from_slice(body).map_err(|e| {
            tracing::warn!(error = %e, "malformed webhook payload");
            AppError::BadRequest(anyhow!("Invalid webhook payload"))
        })
    }
}
