pub mod backoff;
pub mod registry;
pub mod types;
pub mod ws;

pub use backoff::{BackoffStep, ExponentialBackoff, ReconnectPolicy};
pub use registry::{Subscription, SubscriptionKey};
pub use ws::{ConnectionState, DerivWsClient, LOG_CAPACITY};
