use mongodb::bson::doc;
use payment_service::config::{Config, DatabaseConfig, RazorpayConfig, ServerConfig};
use payment_service::models::{PaymentRecord, PaymentStatus, User};
use payment_service::Application;
use secrecy::Secret;
use service_core::utils::signature::compute_signature;
use wiremock::MockServer;

pub const TEST_WEBHOOK_SECRET: &str = "test_webhook_secret";
pub const TEST_USER_ID: &str = "user-1";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub db: mongodb::Database,
    pub db_name: String,
    pub gateway: MockServer,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let db_name = format!("payment_test_{}", uuid::Uuid::new_v4());

        // Wiremock stands in for the Razorpay API.
        let gateway = MockServer::start().await;

        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Random port
            },
            database: DatabaseConfig {
                url: Secret::new(
                    std::env::var("TEST_MONGODB_URI")
                        .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
                ),
                db_name: db_name.clone(),
            },
            razorpay: RazorpayConfig {
                key_id: "rzp_test_key".to_string(),
                key_secret: Secret::new("test_key_secret".to_string()),
                webhook_secret: Secret::new(TEST_WEBHOOK_SECRET.to_string()),
                api_base_url: gateway.uri(),
            },
            service_name: "payment-service-test".to_string(),
        };

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let db = app.db().clone();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to accept connections.
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            db,
            db_name,
            gateway,
            client,
        }
    }

    pub fn sign(&self, body: &[u8]) -> String {
        compute_signature(TEST_WEBHOOK_SECRET, body).expect("failed to sign body")
    }

    pub async fn post_order(
        &self,
        body: serde_json::Value,
        user_id: Option<&str>,
    ) -> reqwest::Response {
        let mut request = self
            .client
            .post(format!("{}/payments/orders", self.address))
            .json(&body);
        if let Some(user_id) = user_id {
            request = request.header("X-User-ID", user_id);
        }
        request.send().await.expect("order request failed")
    }

    pub async fn get_order(&self, order_id: &str, user_id: &str) -> reqwest::Response {
        self.client
            .get(format!("{}/payments/orders/{}", self.address, order_id))
            .header("X-User-ID", user_id)
            .send()
            .await
            .expect("order lookup failed")
    }

    /// Post a webhook body with full control over headers, for signature and
    /// tampering scenarios.
    pub async fn post_webhook_raw(
        &self,
        body: &str,
        signature: Option<&str>,
        event_id: Option<&str>,
    ) -> reqwest::Response {
        let mut request = self
            .client
            .post(format!("{}/webhooks/razorpay", self.address))
            .header("content-type", "application/json")
            .body(body.to_string());
        if let Some(signature) = signature {
            request = request.header("X-Razorpay-Signature", signature);
        }
        if let Some(event_id) = event_id {
            request = request.header("X-Razorpay-Event-Id", event_id);
        }
        request.send().await.expect("webhook request failed")
    }

    /// Post a correctly signed webhook event.
    pub async fn post_event(
        &self,
        event: &serde_json::Value,
        event_id: &str,
    ) -> reqwest::Response {
        let body = event.to_string();
        let signature = self.sign(body.as_bytes());
        self.post_webhook_raw(&body, Some(&signature), Some(event_id))
            .await
    }

    pub async fn seed_user(&self, user_id: &str) {
        self.db
            .collection::<User>("users")
            .insert_one(
                User {
                    id: user_id.to_string(),
                    name: Some("Test User".to_string()),
                    email: Some("test@example.com".to_string()),
                    subscription: None,
                },
                None,
            )
            .await
            .expect("failed to seed user");
    }

    pub async fn seed_created_record(&self, order_id: &str, user_id: &str, amount: f64) {
        let now = mongodb::bson::DateTime::now();
        self.db
            .collection::<PaymentRecord>("payments")
            .insert_one(
                PaymentRecord {
                    id: uuid::Uuid::new_v4(),
                    gateway_order_id: order_id.to_string(),
                    gateway_payment_id: None,
                    user_id: user_id.to_string(),
                    amount,
                    currency: "INR".to_string(),
                    status: PaymentStatus::Created,
                    event_id: None,
                    created_at: now,
                    updated_at: now,
                },
                None,
            )
            .await
            .expect("failed to seed payment record");
    }

    pub async fn payments_for_order(&self, order_id: &str) -> Vec<PaymentRecord> {
        use futures::TryStreamExt;
        self.db
            .collection::<PaymentRecord>("payments")
            .find(doc! { "gateway_order_id": order_id }, None)
            .await
            .expect("failed to query payments")
            .try_collect()
            .await
            .expect("failed to collect payments")
    }

    pub async fn payment_count(&self) -> u64 {
        self.db
            .collection::<PaymentRecord>("payments")
            .count_documents(None, None)
            .await
            .expect("failed to count payments")
    }

    pub async fn find_user(&self, user_id: &str) -> Option<User> {
        self.db
            .collection::<User>("users")
            .find_one(doc! { "_id": user_id }, None)
            .await
            .expect("failed to query user")
    }

    /// Cleanup test database after test completes.
    pub async fn cleanup(&self) {
        self.db
            .drop(None)
            .await
            .expect("Failed to drop test database");
    }
}

pub fn captured_event(
    order_id: &str,
    payment_id: &str,
    user_id: Option<&str>,
    amount_minor: u64,
) -> serde_json::Value {
    let notes = match user_id {
        Some(user_id) => serde_json::json!({ "userId": user_id }),
        None => serde_json::json!({}),
    };
    serde_json::json!({
        "entity": "event",
        "account_id": "acc_test",
        "event": "payment.captured",
        "contains": ["payment"],
        "payload": {
            "payment": {
                "entity": {
                    "id": payment_id,
                    "entity": "payment",
                    "amount": amount_minor,
                    "currency": "INR",
                    "status": "captured",
                    "order_id": order_id,
                    "method": "upi",
                    "notes": notes,
                    "created_at": 1700000000,
                    "captured": true
                }
            }
        },
        "created_at": 1700000000
    })
}

pub fn failed_event(
    order_id: &str,
    payment_id: &str,
    user_id: &str,
    amount_minor: u64,
) -> serde_json::Value {
    serde_json::json!({
        "entity": "event",
        "account_id": "acc_test",
        "event": "payment.failed",
        "contains": ["payment"],
        "payload": {
            "payment": {
                "entity": {
                    "id": payment_id,
                    "entity": "payment",
                    "amount": amount_minor,
                    "currency": "INR",
                    "status": "failed",
                    "order_id": order_id,
                    "method": "upi",
                    "notes": { "userId": user_id },
                    "created_at": 1700000000,
                    "captured": false
                }
            }
        },
        "created_at": 1700000000
    })
}
