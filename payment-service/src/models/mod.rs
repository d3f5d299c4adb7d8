use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One attempted payment in the ledger.
///
/// A record is created in `Created` state at order time, or directly in a
/// terminal state by the reconciler when a webhook outruns the order write.
/// `event_id` and `gateway_payment_id` are `None` until a webhook touches the
/// record; both carry unique sparse indexes, so they must be absent (not
/// null) while unset.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PaymentRecord {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub gateway_order_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_payment_id: Option<String>,
    pub user_id: String,
    /// Amount in major units (rupees for INR).
    pub amount: f64,
    pub currency: String,
    pub status: PaymentStatus,
    /// Webhook event id that last mutated this record; the idempotency key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// `Success` and `Failed` are terminal; no code path leaves them.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Created,
    Success,
    Failed,
}

/// Fragment of the user document owned by the auth module. Only
/// `subscription` is mutated here; profile fields pass through untouched.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Subscription>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Subscription {
    pub plan: String,
    pub status: String,
    pub expires_at: DateTime,
}
