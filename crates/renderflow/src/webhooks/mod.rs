pub mod delivery;
pub mod signature;
pub mod subscriptions;

pub use delivery::WebhookDeliverer;
pub use signature::{Signer, DEFAULT_TOLERANCE_MS};
pub use subscriptions::{SubscriptionsRepo, WebhookSubscription};
