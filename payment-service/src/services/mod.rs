pub mod metrics;
pub mod razorpay;
pub mod reconciler;
pub mod repository;
pub mod subscription;

pub use metrics::{get_metrics, init_metrics};
pub use razorpay::RazorpayClient;
pub use reconciler::PaymentReconciler;
pub use repository::PaymentRepository;
pub use subscription::SubscriptionService;
