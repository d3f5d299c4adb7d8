use crate::models::{PaymentRecord, PaymentStatus, Subscription, User};
use anyhow::Result;
use mongodb::bson::{doc, to_bson, DateTime};
use mongodb::options::{IndexOptions, UpdateOptions};
use mongodb::{Collection, Database, IndexModel};
use uuid::Uuid;

/// Outcome of a ledger write that races against duplicate webhook deliveries.
///
/// `Duplicate` means the store's uniqueness constraints rejected the write
/// (the event was applied by a concurrent or earlier delivery). Callers must
/// treat it as an idempotent no-op, never as a failure.
#[derive(Debug, PartialEq, Eq)]
pub enum LedgerWrite {
    Applied,
    Duplicate,
}

/// Fields extracted from a `payment.captured` event, applied in one
/// conditional upsert.
pub struct CaptureDetails<'a> {
    pub order_id: &'a str,
    pub payment_id: &'a str,
    pub event_id: Option<&'a str>,
    pub user_id: &'a str,
    /// Amount in major units, as stored on the ledger.
    pub amount: f64,
    pub currency: &'a str,
}

#[derive(Clone)]
pub struct PaymentRepository {
    payments: Collection<PaymentRecord>,
    users: Collection<User>,
}

impl PaymentRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            payments: db.collection("payments"),
            users: db.collection("users"),
        }
    }

    /// Initialize ledger indexes.
    ///
    /// The unique sparse indexes on `event_id` and `gateway_payment_id` are
    /// the authoritative guard against re-applying a re-delivered webhook;
    /// every lookup-based dedup check is an optimization on top of them.
    pub async fn init_indexes(&self) -> Result<()> {
        let event_id_index = IndexModel::builder()
            .keys(doc! { "event_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("unique_event_idx".to_string())
                    .unique(true)
                    .sparse(true)
                    .build(),
            )
            .build();

        let payment_id_index = IndexModel::builder()
            .keys(doc! { "gateway_payment_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("unique_gateway_payment_idx".to_string())
                    .unique(true)
                    .sparse(true)
                    .build(),
            )
            .build();

        let order_id_index = IndexModel::builder()
            .keys(doc! { "gateway_order_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("gateway_order_idx".to_string())
                    .build(),
            )
            .build();

        self.payments
            .create_indexes([event_id_index, payment_id_index, order_id_index], None)
            .await?;

        tracing::info!("Payment ledger indexes initialized");
        Ok(())
    }

    /// Insert a fresh ledger record (order creation).
    pub async fn create_payment(&self, record: PaymentRecord) -> Result<()> {
        self.payments.insert_one(record, None).await?;
        Ok(())
    }

    /// Insert a ledger record that may collide with a concurrent delivery of
    /// the same event (failure records).
    pub async fn insert_attempt(&self, record: PaymentRecord) -> Result<LedgerWrite> {
        match self.payments.insert_one(record, None).await {
            Ok(_) => Ok(LedgerWrite::Applied),
            Err(err) if is_duplicate_key_error(&err) => Ok(LedgerWrite::Duplicate),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn find_by_order_id(&self, order_id: &str) -> Result<Option<PaymentRecord>> {
        let filter = doc! { "gateway_order_id": order_id };
        let record = self.payments.find_one(filter, None).await?;
        Ok(record)
    }

    pub async fn find_by_event_id(&self, event_id: &str) -> Result<Option<PaymentRecord>> {
        let filter = doc! { "event_id": event_id };
        let record = self.payments.find_one(filter, None).await?;
        Ok(record)
    }

    /// Apply a successful capture in a single atomic write.
    ///
    /// Matches only a still-`CREATED` record for the order; when none exists
    /// (the webhook outran the order-creation write, or another delivery got
    /// there first) the upsert inserts a complete `SUCCESS` record instead.
    /// A duplicate delivery that loses the race lands on the `event_id` or
    /// `gateway_payment_id` uniqueness constraint and reports `Duplicate`.
    pub async fn mark_captured(&self, details: CaptureDetails<'_>) -> Result<LedgerWrite> {
        let now = DateTime::now();

        let mut set = doc! {
            "status": to_bson(&PaymentStatus::Success)?,
            "gateway_payment_id": details.payment_id,
            "updated_at": now,
        };
        if let Some(event_id) = details.event_id {
            set.insert("event_id", event_id);
        }

        let filter = doc! {
            "gateway_order_id": details.order_id,
            "status": to_bson(&PaymentStatus::Created)?,
        };
        let update = doc! {
            "$set": set,
            "$setOnInsert": {
                "_id": Uuid::new_v4().to_string(),
                "user_id": details.user_id,
                "amount": details.amount,
                "currency": details.currency,
                "created_at": now,
            },
        };
        let options = UpdateOptions::builder().upsert(true).build();

        match self.payments.update_one(filter, update, options).await {
            Ok(result) => {
                if result.matched_count > 0 || result.upserted_id.is_some() {
                    Ok(LedgerWrite::Applied)
                } else {
                    Ok(LedgerWrite::Duplicate)
                }
            }
            Err(err) if is_duplicate_key_error(&err) => Ok(LedgerWrite::Duplicate),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn find_user(&self, user_id: &str) -> Result<Option<User>> {
        let filter = doc! { "_id": user_id };
        let user = self.users.find_one(filter, None).await?;
        Ok(user)
    }

    pub async fn set_subscription(&self, user_id: &str, subscription: &Subscription) -> Result<()> {
        let filter = doc! { "_id": user_id };
        let update = doc! {
            "$set": { "subscription": to_bson(subscription)? }
        };
        self.users.update_one(filter, update, None).await?;
        Ok(())
    }
}

/// E11000: a uniqueness constraint rejected the write.
fn is_duplicate_key_error(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        ErrorKind::Command(command_error) => command_error.code == 11000,
        _ => false,
    }
}
