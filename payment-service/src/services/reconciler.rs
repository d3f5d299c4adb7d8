//! The payment state machine.
//!
//! Applies gateway webhook events to the ledger. Deliveries are at-least-once
//! and unordered: the same event may arrive twice (concurrently), and a
//! capture may arrive before the order-creation write has landed. Correctness
//! rests on the ledger's uniqueness constraints, not on delivery order.

use crate::models::{PaymentRecord, PaymentStatus};
use crate::services::razorpay::{PaymentEntity, WebhookEvent};
use crate::services::repository::{CaptureDetails, LedgerWrite, PaymentRepository};
use crate::services::subscription::SubscriptionService;
use anyhow::anyhow;
use mongodb::bson::DateTime;
use service_core::error::AppError;
use uuid::Uuid;

/// Explicit result of applying one webhook event.
///
/// `AlreadyProcessed` and `Ignored` are not failures: both must still be
/// acknowledged with a 2xx upstream, otherwise the gateway retries forever.
#[derive(Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied,
    AlreadyProcessed,
    Ignored,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Applied => "applied",
            ReconcileOutcome::AlreadyProcessed => "already_processed",
            ReconcileOutcome::Ignored => "ignored",
        }
    }
}

#[derive(Clone)]
pub struct PaymentReconciler {
    repository: PaymentRepository,
    subscriptions: SubscriptionService,
}

impl PaymentReconciler {
    pub fn new(repository: PaymentRepository, subscriptions: SubscriptionService) -> Self {
        Self {
            repository,
            subscriptions,
        }
    }

    /// Apply one authenticated webhook event to the ledger.
    ///
    /// `event_id` is the gateway's delivery identifier (from the
    /// `X-Razorpay-Event-Id` header). Deliveries without one are processed
    /// but cannot be deduplicated.
    pub async fn apply(
        &self,
        event: &WebhookEvent,
        event_id: Option<&str>,
    ) -> Result<ReconcileOutcome, AppError> {
        // Fast-path dedup. The unique index on event_id remains the
        // authoritative guard for deliveries that race past this lookup.
        if let Some(id) = event_id {
            if self
                .repository
                .find_by_event_id(id)
                .await
                .map_err(AppError::DatabaseError)?
                .is_some()
            {
                tracing::info!(event_id = %id, "webhook event already applied");
                return Ok(ReconcileOutcome::AlreadyProcessed);
            }
        }

        match event.event.as_str() {
            "payment.captured" => self.apply_captured(event, event_id).await,
            "payment.failed" => self.apply_failed(event, event_id).await,
            other => {
                tracing::debug!(event_type = %other, "unhandled webhook event type");
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }

    async fn apply_captured(
        &self,
        event: &WebhookEvent,
        event_id: Option<&str>,
    ) -> Result<ReconcileOutcome, AppError> {
        let payment = required_payment(event)?;
        let order_id = payment
            .order_id
            .as_deref()
            .ok_or_else(|| AppError::BadRequest(anyhow!("Invalid webhook payload")))?;
        let user_id = correlated_user(payment)?;

        let write = self
            .repository
            .mark_captured(CaptureDetails {
                order_id,
                payment_id: &payment.id,
                event_id,
                user_id,
                amount: minor_to_major(payment.amount),
                currency: &payment.currency,
            })
            .await
            .map_err(AppError::DatabaseError)?;

        match write {
            LedgerWrite::Applied => {
                tracing::info!(
                    order_id = %order_id,
                    payment_id = %payment.id,
                    "payment captured, ledger record settled"
                );
                self.subscriptions.activate(user_id).await?;
                Ok(ReconcileOutcome::Applied)
            }
            LedgerWrite::Duplicate => {
                tracing::info!(
                    order_id = %order_id,
                    payment_id = %payment.id,
                    "duplicate capture delivery, ledger unchanged"
                );
                Ok(ReconcileOutcome::AlreadyProcessed)
            }
        }
    }

    /// Failure events always append a fresh FAILED record; an existing
    /// CREATED record for the order is left untouched. Each failed attempt
    /// is a distinct ledger entry.
    async fn apply_failed(
        &self,
        event: &WebhookEvent,
        event_id: Option<&str>,
    ) -> Result<ReconcileOutcome, AppError> {
        let payment = required_payment(event)?;
        let order_id = payment
            .order_id
            .as_deref()
            .ok_or_else(|| AppError::BadRequest(anyhow!("Invalid webhook payload")))?;
        let user_id = correlated_user(payment)?;

        let now = DateTime::now();
        let record = PaymentRecord {
            id: Uuid::new_v4(),
            gateway_order_id: order_id.to_string(),
            gateway_payment_id: Some(payment.id.clone()),
            user_id: user_id.to_string(),
            amount: minor_to_major(payment.amount),
            currency: payment.currency.clone(),
            status: PaymentStatus::Failed,
            event_id: event_id.map(str::to_string),
            created_at: now,
            updated_at: now,
        };

        match self
            .repository
            .insert_attempt(record)
            .await
            .map_err(AppError::DatabaseError)?
        {
            LedgerWrite::Applied => {
                tracing::warn!(
                    order_id = %order_id,
                    payment_id = %payment.id,
                    "payment failed, attempt recorded"
                );
                Ok(ReconcileOutcome::Applied)
            }
            LedgerWrite::Duplicate => Ok(ReconcileOutcome::AlreadyProcessed),
        }
    }
}

fn required_payment(event: &WebhookEvent) -> Result<&PaymentEntity, AppError> {
    event
        .payload
        .payment
        .as_ref()
        .map(|wrapper| &wrapper.entity)
        .ok_or_else(|| AppError::BadRequest(anyhow!("Invalid webhook payload")))
}

/// The webhook path has no session context; the order notes are the only way
/// to recover the paying user. An event without them indicates an upstream
/// data-integrity problem.
fn correlated_user(payment: &PaymentEntity) -> Result<&str, AppError> {
    payment.correlated_user_id().ok_or_else(|| {
        tracing::error!(
            payment_id = %payment.id,
            order_id = ?payment.order_id,
            "webhook payment entity carries no user correlation"
        );
        AppError::BadRequest(anyhow!("Missing user correlation"))
    })
}

fn minor_to_major(amount: u64) -> f64 {
    amount as f64 / 100.0
}
