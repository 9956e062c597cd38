//! Messaging backend: capability traits, the error taxonomy, and the NATS
//! JetStream implementation with the bounded-retry acquisition logic.

pub mod acquire;
pub mod error;
pub mod jetstream;
pub mod traits;

pub use acquire::{acquire_with, AcquireConfig};
pub use error::StreamError;
pub use jetstream::{JetStreamPublisher, JetStreamSubscription, SubscriptionConfig};
pub use traits::{AlertPublisher, InboundMessage, Subscription};
