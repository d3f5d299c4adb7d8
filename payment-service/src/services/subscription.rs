//! Subscription activation on successful payment capture.

use crate::models::Subscription;
use crate::services::repository::PaymentRepository;
use anyhow::anyhow;
use chrono::{Months, Utc};
use mongodb::bson::DateTime;
use service_core::error::AppError;

pub const PLAN_PRO: &str = "PRO";
pub const STATUS_ACTIVE: &str = "ACTIVE";

#[derive(Clone)]
pub struct SubscriptionService {
    repository: PaymentRepository,
}

impl SubscriptionService {
    pub fn new(repository: PaymentRepository) -> Self {
        Self { repository }
    }

    /// Grant the PRO subscription to a user after a captured payment.
    ///
    /// Every successful payment resets the window to one month from now; a
    /// renewal does not extend a still-active window. A missing user is a
    /// local data anomaly, logged and swallowed so the webhook is still
    /// acknowledged and the gateway does not retry an unrecoverable event.
    pub async fn activate(&self, user_id: &str) -> Result<(), AppError> {
        let user = self
            .repository
            .find_user(user_id)
            .await
            .map_err(AppError::DatabaseError)?;

        let Some(user) = user else {
            tracing::warn!(
                user_id = %user_id,
                "subscription target user not found, skipping activation"
            );
            return Ok(());
        };

        let expires_at = Utc::now()
            .checked_add_months(Months::new(1))
            .ok_or_else(|| AppError::InternalError(anyhow!("subscription expiry out of range")))?;

        let subscription = Subscription {
            plan: PLAN_PRO.to_string(),
            status: STATUS_ACTIVE.to_string(),
            expires_at: DateTime::from_chrono(expires_at),
        };

        self.repository
            .set_subscription(&user.id, &subscription)
            .await
            .map_err(AppError::DatabaseError)?;

        tracing::info!(
            user_id = %user.id,
            plan = %subscription.plan,
            expires_at = %subscription.expires_at,
            "subscription activated"
        );

        Ok(())
    }
}
